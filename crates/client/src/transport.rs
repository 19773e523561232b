//! Chat stream transport.
//!
//! Opens one turn against the gateway and yields the response body line by
//! line. Dropping the returned stream aborts the underlying request; no
//! partially buffered line is flushed on cancellation.

use {
    futures::{Stream, StreamExt},
    serde::Serialize,
    tokio_util::{
        codec::{FramedRead, LinesCodec},
        io::StreamReader,
    },
};

use portier_protocol::MAX_FRAME_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("gateway returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream read failed: {0}")]
    Read(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One turn's request body, as the gateway expects it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_continuity_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// POST the turn and stream back the response body lines.
    pub async fn open_turn(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<String>> + Send + 'static> {
        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));
        let lines = FramedRead::new(
            StreamReader::new(bytes),
            LinesCodec::new_with_max_length(MAX_FRAME_BYTES),
        );
        Ok(lines.map(|item| item.map_err(|e| Error::Read(e.to_string()))))
    }
}
