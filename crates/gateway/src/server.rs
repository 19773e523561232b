use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::{info, warn},
};

use {
    portier_assistant::CompletionClient,
    portier_config::Config,
    portier_notify::{NoopNotifier, OperatorNotifier, TelegramNotifier},
};

use crate::chat;

const DEFAULT_INSTRUCTIONS: &str =
    "You are the guest assistant for this property. Answer concisely and always \
     return the structured response format.";

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub completions: Arc<CompletionClient>,
    pub notifier: Arc<dyn OperatorNotifier>,
    pub instructions: String,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat::chat_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the gateway from loaded config.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let api_key = config
        .upstream
        .api_key
        .ok_or_else(|| anyhow::anyhow!("no upstream API key configured (OPENAI_API_KEY)"))?;

    let mut completions = CompletionClient::new(api_key)
        .with_vector_store(config.upstream.vector_store_id.clone());
    if let Some(base_url) = &config.upstream.base_url {
        completions = completions.with_base_url(base_url);
    }
    if let Some(model) = &config.upstream.model {
        completions = completions.with_model(model);
    }

    let notifier: Arc<dyn OperatorNotifier> = match (
        config.notify.telegram_bot_token,
        config.notify.telegram_chat_id,
    ) {
        (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id)),
        _ => {
            warn!("telegram not configured, operator notifications disabled");
            Arc::new(NoopNotifier)
        },
    };

    let state = AppState {
        completions: Arc::new(completions),
        notifier,
        instructions: config
            .upstream
            .instructions
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
    };
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "portier gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}
