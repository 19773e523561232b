//! The streaming chat endpoint.
//!
//! One request is one turn: the handler opens the upstream stream, hands it
//! to a fresh transformer, and streams the normalized frames back as they
//! are produced. An upstream failure after the response has started is
//! delivered in-band as an `error` frame, since the status line is already
//! on the wire.

use std::convert::Infallible;

use {
    axum::{
        Json,
        body::Body,
        extract::State,
        http::{StatusCode, header},
        response::{IntoResponse, Response},
    },
    futures::StreamExt,
    serde::{Deserialize, Serialize},
    tracing::info,
};

use portier_assistant::{CompletionRequest, StreamTransformer, TurnContext};

use crate::server::AppState;

/// One turn's request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub previous_continuity_token: Option<String>,
    pub room_id: Option<String>,
    pub approved: Option<bool>,
    pub current_location: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "message is required".to_string(),
            }),
        )
            .into_response();
    }

    let turn_id = uuid::Uuid::new_v4();
    info!(
        %turn_id,
        room = request.room_id.as_deref().unwrap_or("-"),
        approved = request.approved.unwrap_or(false),
        continuing = request.previous_continuity_token.is_some(),
        "chat turn started"
    );

    let completion = CompletionRequest {
        message: request.message.clone(),
        instructions: state.instructions.clone(),
        previous_continuity_token: request.previous_continuity_token,
    };
    let context = TurnContext {
        room_id: request.room_id.unwrap_or_default(),
        user_message: request.message,
        location: request.current_location,
    };

    let frames = match state.completions.stream_events(&completion).await {
        Ok(events) => {
            let transformer = StreamTransformer::new(state.notifier.clone(), context);
            transformer.run(events).left_stream()
        },
        Err(e) => {
            // The turn dies before any upstream event: one terminal error
            // frame is the whole stream.
            tracing::error!(%turn_id, "failed to open upstream stream: {e}");
            futures::stream::once(async move {
                portier_protocol::ProtocolFrame::Error {
                    message: "upstream request failed".to_string(),
                }
            })
            .right_stream()
        },
    };

    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(frame.to_line())));
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response()
}
