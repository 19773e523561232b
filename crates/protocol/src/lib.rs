//! Guest-assistant wire protocol definitions.
//!
//! The gateway streams one turn's answer to the client as newline-delimited
//! JSON: one [`ProtocolFrame`] per line, blank lines ignored. The final
//! answer text itself carries a JSON-encoded [`StructuredAnswer`].
//!
//! Frame kinds:
//! - `delta`        — incremental fragment of the answer text
//! - `partialFinal` — complete answer text arriving via the alternate
//!   upstream signal (content-part finished before output-text finished)
//! - `final`        — complete answer text, end of generation content
//! - `completion`   — opaque continuity token for the next turn
//! - `error`        — terminal failure for this turn

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// Upper bound for one serialized frame line on the wire.
pub const MAX_FRAME_BYTES: usize = 524_288; // 512 KB

/// Upstream contract caps answer images at 15. Documented, not enforced here.
pub const MAX_ANSWER_IMAGES: usize = 15;

// ── Frames ───────────────────────────────────────────────────────────────────

/// One normalized unit of the downstream wire protocol.
///
/// At most one of `partialFinal`/`final` is "the" answer per turn, but
/// either, both, or neither may appear on the wire. Consumers treat the
/// first one observed as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolFrame {
    #[serde(rename = "delta")]
    Delta { text: String },
    #[serde(rename = "partialFinal")]
    PartialFinal { text: String },
    #[serde(rename = "final")]
    Final { text: String },
    #[serde(rename = "completion")]
    Completion {
        #[serde(rename = "continuityToken")]
        continuity_token: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ProtocolFrame {
    /// Answer text carried by a terminal frame, if this is one.
    pub fn terminal_text(&self) -> Option<&str> {
        match self {
            Self::PartialFinal { text } | Self::Final { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_text().is_some()
    }

    /// Serialize to one wire line, newline included.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            // Frame variants contain only strings; serialization cannot fail.
            String::from(r#"{"type":"error","message":"frame encoding failed"}"#)
        });
        line.push('\n');
        line
    }

    /// Parse one wire line. The caller strips blank lines.
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(line.trim()).map_err(DecodeError::Malformed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame line: {0}")]
    Malformed(#[source] serde_json::Error),
}

// ── Structured answer ────────────────────────────────────────────────────────

/// The fixed-shape business payload embedded as JSON text in the model's
/// final output.
///
/// Every field is defaulted so a terminal payload that is itself partial
/// (missing `sources`, say) still materializes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredAnswer {
    pub answer_text: String,
    pub sources: Vec<String>,
    pub images: Vec<String>,
    pub needs_operator: bool,
    /// Empty unless `needs_operator` is true.
    pub operator_summary: String,
}

impl StructuredAnswer {
    /// Materialize from the text carried by a terminal frame. The text must
    /// be a well-formed JSON object; absent fields default.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
