//! Per-turn frame consumer.
//!
//! One frame per line; a line that fails to parse is logged and skipped so
//! a single corrupt chunk never kills the read loop. Only the first
//! terminal frame finalizes the message; the continuity token always
//! overwrites whatever came before it.

use {
    portier_assistant::partial,
    portier_protocol::{ProtocolFrame, StructuredAnswer},
};

/// UI-visible event produced by feeding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// In-progress answer text reconstructed from the delta buffer.
    Progress(String),
    /// The full structured answer from the first terminal frame.
    Finalized(StructuredAnswer),
    /// Continuity token to persist for the next turn.
    Completed(String),
    /// Terminal failure for this turn.
    Failed(String),
    /// Non-fatal condition the user should see (e.g. token not persisted).
    Warning(String),
}

#[derive(Debug, Default)]
pub struct TurnConsumer {
    buffer: String,
    finalized: bool,
    failed: bool,
}

impl TurnConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport line. Returns the updates it produced, in order.
    pub fn feed_line(&mut self, line: &str) -> Vec<TurnUpdate> {
        if self.failed || line.trim().is_empty() {
            return Vec::new();
        }
        let frame = match ProtocolFrame::from_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("skipping malformed frame line: {e}");
                return Vec::new();
            },
        };
        match frame {
            ProtocolFrame::Delta { text } => {
                if self.finalized {
                    // The answer is already final; late fragments cannot
                    // regress the display.
                    return Vec::new();
                }
                self.buffer.push_str(&text);
                match partial::complete_prefix(&self.buffer) {
                    Some(value) if value.is_object() => {
                        let text = value
                            .get("answerText")
                            .and_then(|t| t.as_str())
                            .unwrap_or_default();
                        vec![TurnUpdate::Progress(text.to_string())]
                    },
                    _ => Vec::new(),
                }
            },
            ProtocolFrame::PartialFinal { text } | ProtocolFrame::Final { text } => {
                if self.finalized {
                    return Vec::new();
                }
                self.finalized = true;
                let answer = StructuredAnswer::from_text(&text).unwrap_or_else(|e| {
                    // By the terminal frame the text should be well-formed;
                    // fall back to showing it verbatim rather than nothing.
                    tracing::warn!("terminal frame is not a structured answer: {e}");
                    StructuredAnswer {
                        answer_text: text,
                        ..Default::default()
                    }
                });
                vec![TurnUpdate::Finalized(answer)]
            },
            ProtocolFrame::Completion { continuity_token } => {
                vec![TurnUpdate::Completed(continuity_token)]
            },
            ProtocolFrame::Error { message } => {
                self.failed = true;
                vec![TurnUpdate::Failed(message)]
            },
        }
    }
}
