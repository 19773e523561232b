//! Upstream completion API: request construction and the SSE event stream.
//!
//! The upstream service speaks server-sent events; each `data:` line carries
//! one JSON event tagged by `type`. Only a fixed subset of tags is
//! meaningful downstream; everything else deserializes into
//! [`UpstreamEvent::Unknown`] and is ignored, never an error.

use {
    futures::{Stream, StreamExt},
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tokio_util::{
        codec::{FramedRead, LinesCodec},
        io::StreamReader,
    },
};

use portier_protocol::MAX_FRAME_BYTES;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

// ── Events ───────────────────────────────────────────────────────────────────

/// One upstream streaming event. Unknown tags land in `Unknown`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: Option<String> },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone { part: Option<ContentPart> },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone { text: Option<String> },
    #[serde(rename = "response.completed")]
    Completed { response: Option<CompletedResponse> },
    #[serde(rename = "error")]
    Error { message: Option<String> },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedResponse {
    pub id: Option<String>,
}

// ── Request ──────────────────────────────────────────────────────────────────

/// One turn's input to the completion API.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub message: String,
    pub instructions: String,
    /// Continuity token from the previous turn, if the client carried one.
    pub previous_continuity_token: Option<String>,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<InputMessage<'a>>,
    tools: Vec<Value>,
    reasoning: Reasoning,
    parallel_tool_calls: bool,
    truncation: &'a str,
    stream: bool,
    text: TextOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Reasoning {
    effort: &'static str,
}

#[derive(Serialize)]
struct TextOptions {
    verbosity: &'static str,
    format: Value,
}

/// JSON schema for the structured answer, sent as the required output format.
fn answer_format() -> Value {
    json!({
        "type": "json_schema",
        "name": "assistant_response",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "answerText": {
                    "type": "string",
                    "description": "Clean assistant response text, without citation markers or metadata annotations."
                },
                "sources": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Sources referenced by the assistant. Empty array if none."
                },
                "images": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Absolute HTTPS image URLs relevant to the answer, at most 15. Empty array if none."
                },
                "needsOperator": {
                    "type": "boolean",
                    "description": "True only when the guest has confirmed they want a human operator."
                },
                "operatorSummary": {
                    "type": "string",
                    "description": "Concise inquiry summary for the operator. Empty string when needsOperator is false."
                }
            },
            "required": ["answerText", "sources", "images", "needsOperator", "operatorSummary"],
            "additionalProperties": false
        }
    })
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Thin client for the upstream streaming completion endpoint.
///
/// Deliberately sets no read timeout on the streaming request: a stalled
/// upstream blocks the turn rather than fabricating a terminal frame.
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    vector_store_id: Option<String>,
}

impl CompletionClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            model: DEFAULT_MODEL.into(),
            vector_store_id: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enables the retrieval tool against the given vector store.
    #[must_use]
    pub fn with_vector_store(mut self, id: Option<String>) -> Self {
        self.vector_store_id = id;
        self
    }

    fn tools(&self) -> Vec<Value> {
        let mut tools = Vec::new();
        if let Some(id) = &self.vector_store_id {
            tools.push(json!({
                "type": "file_search",
                "vector_store_ids": [id],
                "max_num_results": 10,
                "ranking_options": { "score_threshold": 0.2 }
            }));
        }
        tools.push(json!({
            "type": "web_search_preview",
            "search_context_size": "low"
        }));
        tools
    }

    /// Open the upstream stream for one turn. HTTP-level failures surface
    /// here; per-event problems are absorbed into `Unknown` items.
    pub async fn stream_events(
        &self,
        request: &CompletionRequest,
    ) -> Result<impl Stream<Item = Result<UpstreamEvent>> + Send + 'static> {
        let payload = ApiRequest {
            model: &self.model,
            instructions: &request.instructions,
            input: vec![InputMessage {
                role: "user",
                content: &request.message,
            }],
            tools: self.tools(),
            reasoning: Reasoning { effort: "low" },
            parallel_tool_calls: false,
            truncation: "auto",
            stream: true,
            text: TextOptions {
                verbosity: "low",
                format: answer_format(),
            },
            previous_response_id: request.previous_continuity_token.as_deref(),
        };

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes_stream().map(|r| r.map_err(std::io::Error::other));
        let mut lines = FramedRead::new(
            StreamReader::new(bytes),
            LinesCodec::new_with_max_length(MAX_FRAME_BYTES),
        );

        Ok(async_stream::stream! {
            while let Some(next) = lines.next().await {
                match next {
                    Ok(line) => {
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue; // event:/id:/comment lines and blanks
                        };
                        match serde_json::from_str::<UpstreamEvent>(data) {
                            Ok(event) => yield Ok(event),
                            Err(e) => {
                                tracing::warn!("unparseable upstream event, ignoring: {e}");
                                yield Ok(UpstreamEvent::Unknown);
                            },
                        }
                    },
                    Err(e) => {
                        yield Err(Error::message(format!("upstream stream failed: {e}")));
                        break;
                    },
                }
            }
        })
    }
}
