//! Terminal-side consumer of the gateway's frame stream.
//!
//! Reads one turn's newline-delimited frames, reconstructs the in-progress
//! answer for progressive display, and carries the continuity token across
//! turns through the local store.

pub mod consumer;
pub mod continuity;
pub mod transport;

use futures::StreamExt;

pub use {
    consumer::{TurnConsumer, TurnUpdate},
    continuity::{ContinuityStore, SaveOutcome},
    transport::{ChatRequest, GatewayClient},
};

/// Outcome of one consumed turn.
#[derive(Debug, Default)]
pub struct TurnSummary {
    pub answer: Option<portier_protocol::StructuredAnswer>,
    pub continuity_token: Option<String>,
    pub failure: Option<String>,
}

/// Run one turn end to end: load the stored continuity token, open the
/// stream, feed every line through the consumer, and persist the token from
/// the completion frame. `on_update` sees every UI-visible event in arrival
/// order.
pub async fn run_turn<F>(
    client: &GatewayClient,
    store: &ContinuityStore,
    mut request: ChatRequest,
    mut on_update: F,
) -> transport::Result<TurnSummary>
where
    F: FnMut(&TurnUpdate),
{
    if request.previous_continuity_token.is_none() {
        request.previous_continuity_token = store.load();
    }

    let lines = client.open_turn(&request).await?;
    futures::pin_mut!(lines);

    let mut consumer = TurnConsumer::new();
    let mut summary = TurnSummary::default();

    while let Some(line) = lines.next().await {
        let line = line?;
        for update in consumer.feed_line(&line) {
            match &update {
                TurnUpdate::Finalized(answer) => summary.answer = Some(answer.clone()),
                TurnUpdate::Completed(token) => {
                    summary.continuity_token = Some(token.clone());
                    if store.save(token) == SaveOutcome::Unavailable {
                        let warning = TurnUpdate::Warning(
                            "conversation context could not be saved; the next turn will start fresh"
                                .to_string(),
                        );
                        on_update(&warning);
                    }
                },
                TurnUpdate::Failed(message) => summary.failure = Some(message.clone()),
                _ => {},
            }
            on_update(&update);
        }
    }
    Ok(summary)
}
