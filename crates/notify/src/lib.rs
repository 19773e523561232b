//! Operator notification channel.
//!
//! When a turn's structured answer asks for a human operator, the gateway
//! fires one alert through this channel. The call is fire-and-forget from
//! the caller's point of view: failures are logged by the dispatcher and
//! never reach the answer stream, and no retry happens here (the messaging
//! platform owns delivery retries).

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    secrecy::{ExposeSecret, SecretString},
};

const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("notification channel returned status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Alert payload ────────────────────────────────────────────────────────────

/// One operator alert, assembled from the turn context and the answer.
#[derive(Debug, Clone)]
pub struct OperatorAlert {
    pub room_id: String,
    pub user_message: String,
    pub summary: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ── Channel trait ────────────────────────────────────────────────────────────

#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, alert: &OperatorAlert) -> Result<()>;
}

/// Used when no channel is configured; logs the alert and succeeds.
pub struct NoopNotifier;

#[async_trait]
impl OperatorNotifier for NoopNotifier {
    async fn notify(&self, alert: &OperatorAlert) -> Result<()> {
        tracing::info!(
            room = %alert.room_id,
            "operator alert (no channel configured): {}",
            alert.summary
        );
        Ok(())
    }
}

// ── Telegram implementation ──────────────────────────────────────────────────

pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.telegram.org".into(),
            bot_token,
            chat_id: chat_id.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Markdown message body for the operator chat.
fn format_alert(alert: &OperatorAlert) -> String {
    let mut lines = vec![
        "🚨 *Operator assistance requested*".to_string(),
        String::new(),
        format!("*Room:* {}", alert.room_id),
        format!("*When:* {}", alert.timestamp.format("%Y-%m-%d %H:%M UTC")),
        String::new(),
        "*Inquiry summary:*".to_string(),
        alert.summary.clone(),
        String::new(),
        "*Guest's original message:*".to_string(),
        format!("\"{}\"", alert.user_message),
    ];
    if let Some(location) = &alert.location {
        lines.push(String::new());
        lines.push(format!("*Current location:* {location}"));
    }
    lines.join("\n")
}

#[async_trait]
impl OperatorNotifier for TelegramNotifier {
    async fn notify(&self, alert: &OperatorAlert) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );
        let text = format_alert(alert);
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text.as_str()),
            ("disable_web_page_preview", "true"),
            ("parse_mode", "Markdown"),
        ];
        let response = self
            .http
            .post(url)
            .timeout(SEND_TIMEOUT)
            .form(&form)
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
        tracing::info!(room = %alert.room_id, "operator alert delivered");
        Ok(())
    }
}
