//! At-most-once operator alert dispatch per turn.
//!
//! Two different upstream events can both carry the terminal answer, so the
//! transformer may see a qualifying answer twice in one turn. The dedup flag
//! is per-turn state threaded through the transformer run, not a module
//! global, so nothing leaks across requests.

use std::sync::Arc;

use chrono::Utc;

use {
    portier_notify::{OperatorAlert, OperatorNotifier},
    portier_protocol::StructuredAnswer,
};

/// Per-turn dedup flag. Lifetime is bounded to one transformer run; never
/// persisted, never shared across turns.
#[derive(Debug, Default)]
pub struct DispatchState {
    fired: bool,
}

impl DispatchState {
    pub fn fired(&self) -> bool {
        self.fired
    }
}

/// What the alert needs from the incoming turn.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub room_id: String,
    pub user_message: String,
    pub location: Option<String>,
}

/// Fire the operator alert if the answer asks for one and this turn has not
/// fired yet. The channel call runs on a detached task; the caller's frame
/// loop never waits on it, and channel errors are logged and swallowed.
pub fn maybe_dispatch(
    answer: &StructuredAnswer,
    state: &mut DispatchState,
    context: &TurnContext,
    notifier: &Arc<dyn OperatorNotifier>,
) {
    if !answer.needs_operator || answer.operator_summary.is_empty() || state.fired {
        return;
    }
    // Flip before the async call settles: a second qualifying frame inside
    // the same event-processing tick must not double-fire.
    state.fired = true;

    let alert = OperatorAlert {
        room_id: context.room_id.clone(),
        user_message: context.user_message.clone(),
        summary: answer.operator_summary.clone(),
        location: context.location.clone(),
        timestamp: Utc::now(),
    };
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&alert).await {
            tracing::error!(room = %alert.room_id, "operator alert failed: {e}");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OperatorNotifier for CountingNotifier {
        async fn notify(&self, _alert: &OperatorAlert) -> portier_notify::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting() -> Arc<CountingNotifier> {
        Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        })
    }

    fn operator_answer() -> StructuredAnswer {
        StructuredAnswer {
            answer_text: "Transferring you to an operator.".into(),
            needs_operator: true,
            operator_summary: "Guest locked out of room 204.".into(),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn qualifying_answer_fires_once() {
        let counter = counting();
        let notifier: Arc<dyn OperatorNotifier> = counter.clone();
        let mut state = DispatchState::default();
        let ctx = TurnContext::default();

        maybe_dispatch(&operator_answer(), &mut state, &ctx, &notifier);
        assert!(state.fired());
        settle().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_qualifying_answer_is_deduped() {
        let counter = counting();
        let notifier: Arc<dyn OperatorNotifier> = counter.clone();
        let mut state = DispatchState::default();
        let ctx = TurnContext::default();

        maybe_dispatch(&operator_answer(), &mut state, &ctx, &notifier);
        maybe_dispatch(&operator_answer(), &mut state, &ctx, &notifier);
        settle().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_fire_when_operator_not_needed() {
        let counter = counting();
        let notifier: Arc<dyn OperatorNotifier> = counter.clone();
        let mut state = DispatchState::default();
        let ctx = TurnContext::default();

        let answer = StructuredAnswer {
            answer_text: "Wi-Fi is ROOM204".into(),
            ..Default::default()
        };
        maybe_dispatch(&answer, &mut state, &ctx, &notifier);
        settle().await;
        assert!(!state.fired());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_fire_on_empty_summary() {
        let counter = counting();
        let notifier: Arc<dyn OperatorNotifier> = counter.clone();
        let mut state = DispatchState::default();
        let ctx = TurnContext::default();

        let answer = StructuredAnswer {
            needs_operator: true,
            ..Default::default()
        };
        maybe_dispatch(&answer, &mut state, &ctx, &notifier);
        settle().await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn channel_failure_is_swallowed() {
        struct FailingNotifier;

        #[async_trait]
        impl OperatorNotifier for FailingNotifier {
            async fn notify(&self, _alert: &OperatorAlert) -> portier_notify::Result<()> {
                Err(portier_notify::Error::Status {
                    status: 500,
                    body: "boom".into(),
                })
            }
        }

        let notifier: Arc<dyn OperatorNotifier> = Arc::new(FailingNotifier);
        let mut state = DispatchState::default();
        maybe_dispatch(
            &operator_answer(),
            &mut state,
            &TurnContext::default(),
            &notifier,
        );
        settle().await;
        // The flag stays set; no retry happens.
        assert!(state.fired());
    }
}
