//! Per-turn stream transformer.
//!
//! Drives one upstream event stream, classifies each event, and emits the
//! normalized frame sequence for the client. Owns all per-turn state: the
//! accumulated answer text, the finalization marker, and the notification
//! dedup flag. Nothing here survives the turn.
//!
//! State machine: `Streaming` → `Finalizing` (first terminal text) →
//! `Completed` (completion event or iterator exhaustion) or `Failed`
//! (upstream error). A completion event is tolerated in any state except
//! `Failed`; the two upstream terminal-text signals are not mutually
//! exclusive, and the first one observed wins.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use {
    portier_notify::OperatorNotifier,
    portier_protocol::{ProtocolFrame, StructuredAnswer},
};

use crate::{
    dispatch::{self, DispatchState, TurnContext},
    error::Result,
    mapper::{self, MappedFrame},
    partial,
    upstream::UpstreamEvent,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum TurnState {
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

pub struct StreamTransformer {
    notifier: Arc<dyn OperatorNotifier>,
    context: TurnContext,
}

impl StreamTransformer {
    pub fn new(notifier: Arc<dyn OperatorNotifier>, context: TurnContext) -> Self {
        Self { notifier, context }
    }

    /// Consume the upstream events and produce the downstream frame stream.
    ///
    /// Exactly one notification dispatch attempt happens per run, no matter
    /// how many terminal-shaped events the upstream emits.
    pub fn run<S>(self, events: S) -> impl Stream<Item = ProtocolFrame> + Send
    where
        S: Stream<Item = Result<UpstreamEvent>> + Send + 'static,
    {
        let Self { notifier, context } = self;

        async_stream::stream! {
            let mut state = TurnState::Streaming;
            let mut dispatch_state = DispatchState::default();
            let mut finalized = false;
            let mut accumulated = String::new();

            futures::pin_mut!(events);
            while let Some(next) = events.next().await {
                let event = match next {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!("upstream stream failed: {e}");
                        yield ProtocolFrame::Error {
                            message: e.to_string(),
                        };
                        state = TurnState::Failed;
                        break;
                    },
                };

                match mapper::map_event(&event) {
                    MappedFrame::Delta(text) => {
                        if state == TurnState::Streaming {
                            accumulated.push_str(&text);
                        }
                        yield ProtocolFrame::Delta { text };
                    },
                    MappedFrame::PartialFinal(text) => {
                        if !finalized {
                            finalized = true;
                            handle_answer(&text, &mut dispatch_state, &context, &notifier);
                            if state == TurnState::Streaming {
                                state = TurnState::Finalizing;
                            }
                        }
                        // A repeat terminal is still forwarded so the client
                        // is not starved of data; it is never re-processed.
                        yield ProtocolFrame::PartialFinal { text };
                    },
                    MappedFrame::Final(text) => {
                        if !finalized {
                            finalized = true;
                            handle_answer(&text, &mut dispatch_state, &context, &notifier);
                            if state == TurnState::Streaming {
                                state = TurnState::Finalizing;
                            }
                        }
                        yield ProtocolFrame::Final { text };
                    },
                    MappedFrame::Completion(token) => {
                        yield ProtocolFrame::Completion {
                            continuity_token: token,
                        };
                        if state != TurnState::Failed {
                            state = TurnState::Completed;
                        }
                    },
                    MappedFrame::Error(message) => {
                        tracing::error!("upstream reported error: {message}");
                        yield ProtocolFrame::Error { message };
                        state = TurnState::Failed;
                        break;
                    },
                    MappedFrame::Ignore => {},
                }
            }

            if state != TurnState::Failed {
                // Exhaustion without an explicit terminal is a valid,
                // contentless turn; no synthetic answer is emitted.
                state = TurnState::Completed;
            }
            tracing::debug!(
                ?state,
                finalized,
                accumulated_bytes = accumulated.len(),
                dispatched = dispatch_state.fired(),
                "turn finished"
            );
        }
    }
}

/// Materialize the structured answer from the first terminal text and run
/// the notification decision. A terminal payload that is itself partial
/// still materializes with defaulted fields; unusable text skips dispatch.
fn handle_answer(
    text: &str,
    dispatch_state: &mut DispatchState,
    context: &TurnContext,
    notifier: &Arc<dyn OperatorNotifier>,
) {
    let answer = partial::complete_prefix(text)
        .and_then(|value| serde_json::from_value::<StructuredAnswer>(value).ok());
    match answer {
        Some(answer) => {
            dispatch::maybe_dispatch(&answer, dispatch_state, context, notifier);
        },
        None => {
            tracing::warn!("terminal text is not a structured answer, skipping dispatch");
        },
    }
}
