//! Classification of upstream events into semantic frame kinds.
//!
//! The upstream API has two independent, non-exclusive "final answer" signals
//! (a finished output-text content part, and the output-text-done event);
//! both are mapped here and deduplicated later by the transformer.

use crate::upstream::UpstreamEvent;

/// Semantic kind of one upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedFrame {
    Delta(String),
    /// Complete answer text via the content-part signal.
    PartialFinal(String),
    /// Complete answer text via the output-text-done signal.
    Final(String),
    /// Continuity token for the next turn.
    Completion(String),
    Error(String),
    Ignore,
}

/// Map one upstream event. Total: malformed or unrecognized shapes come out
/// as `Ignore`, never an error.
pub fn map_event(event: &UpstreamEvent) -> MappedFrame {
    match event {
        UpstreamEvent::OutputTextDelta { delta: Some(delta) } => {
            MappedFrame::Delta(delta.clone())
        },
        UpstreamEvent::ContentPartDone { part: Some(part) } => {
            // An empty or non-text part must not become a terminal frame;
            // that would trigger finalization downstream with no answer.
            match (&part.kind, &part.text) {
                (Some(kind), Some(text)) if kind == "output_text" && !text.is_empty() => {
                    MappedFrame::PartialFinal(text.clone())
                },
                _ => MappedFrame::Ignore,
            }
        },
        UpstreamEvent::OutputTextDone { text: Some(text) } if !text.is_empty() => {
            MappedFrame::Final(text.clone())
        },
        UpstreamEvent::Completed { response: Some(response) } => match &response.id {
            Some(id) if !id.is_empty() => MappedFrame::Completion(id.clone()),
            _ => MappedFrame::Ignore,
        },
        UpstreamEvent::Error { message } => MappedFrame::Error(
            message
                .clone()
                .unwrap_or_else(|| "upstream error".to_string()),
        ),
        _ => MappedFrame::Ignore,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(json: &str) -> UpstreamEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn delta_maps_to_delta() {
        let mapped = map_event(&event(
            r#"{"type":"response.output_text.delta","delta":"Wi-Fi"}"#,
        ));
        assert_eq!(mapped, MappedFrame::Delta("Wi-Fi".into()));
    }

    #[test]
    fn output_text_part_maps_to_partial_final() {
        let mapped = map_event(&event(
            r#"{"type":"response.content_part.done","part":{"type":"output_text","text":"{\"answerText\":\"hi\"}"}}"#,
        ));
        assert_eq!(
            mapped,
            MappedFrame::PartialFinal(r#"{"answerText":"hi"}"#.into())
        );
    }

    #[test]
    fn non_text_part_is_ignored() {
        let mapped = map_event(&event(
            r#"{"type":"response.content_part.done","part":{"type":"refusal","refusal":"no"}}"#,
        ));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn empty_text_part_is_ignored() {
        let mapped = map_event(&event(
            r#"{"type":"response.content_part.done","part":{"type":"output_text","text":""}}"#,
        ));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn missing_part_is_ignored() {
        let mapped = map_event(&event(r#"{"type":"response.content_part.done"}"#));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn output_text_done_maps_to_final() {
        let mapped = map_event(&event(
            r#"{"type":"response.output_text.done","text":"{\"answerText\":\"done\"}"}"#,
        ));
        assert_eq!(mapped, MappedFrame::Final(r#"{"answerText":"done"}"#.into()));
    }

    #[test]
    fn empty_final_text_is_ignored() {
        let mapped = map_event(&event(r#"{"type":"response.output_text.done","text":""}"#));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn completed_with_id_maps_to_completion() {
        let mapped = map_event(&event(
            r#"{"type":"response.completed","response":{"id":"resp_1"}}"#,
        ));
        assert_eq!(mapped, MappedFrame::Completion("resp_1".into()));
    }

    #[test]
    fn completed_without_id_is_ignored() {
        let mapped = map_event(&event(r#"{"type":"response.completed","response":{}}"#));
        assert_eq!(mapped, MappedFrame::Ignore);
        let mapped = map_event(&event(r#"{"type":"response.completed"}"#));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn unknown_tag_is_ignored() {
        let mapped = map_event(&event(r#"{"type":"response.in_progress"}"#));
        assert_eq!(mapped, MappedFrame::Ignore);
    }

    #[test]
    fn error_event_maps_to_error() {
        let mapped = map_event(&event(r#"{"type":"error","message":"rate limited"}"#));
        assert_eq!(mapped, MappedFrame::Error("rate limited".into()));
        let mapped = map_event(&event(r#"{"type":"error"}"#));
        assert_eq!(mapped, MappedFrame::Error("upstream error".into()));
    }
}
