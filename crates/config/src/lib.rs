//! Gateway configuration.
//!
//! Discovery order: `portier.toml` in the working directory, then the user
//! config directory. Environment variables override file values. A missing
//! or unreadable file is not an error; the gateway starts with defaults and
//! whatever the environment provides.

use std::path::{Path, PathBuf};

use {secrecy::SecretString, serde::Deserialize};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8484;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub vector_store_id: Option<String>,
    /// Natural-language instructions sent with every turn. Their content is
    /// an operator concern; the gateway only forwards them.
    pub instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    pub fn from_toml_str(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    fn from_file(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match Self::from_toml_str(&data) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                Some(config)
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring malformed config: {e}");
                None
            },
        }
    }

    /// Overlay environment variables on top of file values. `lookup` is
    /// injected so tests don't have to mutate the process environment.
    pub fn apply_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("PORTIER_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("PORTIER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.upstream.api_key = Some(SecretString::from(v));
        }
        if let Some(v) = lookup("PORTIER_UPSTREAM_BASE_URL") {
            self.upstream.base_url = Some(v);
        }
        if let Some(v) = lookup("PORTIER_MODEL") {
            self.upstream.model = Some(v);
        }
        if let Some(v) = lookup("OPENAI_VECTOR_STORE_ID") {
            self.upstream.vector_store_id = Some(v);
        }
        if let Some(v) = lookup("TELEGRAM_BOT_TOKEN") {
            self.notify.telegram_bot_token = Some(SecretString::from(v));
        }
        if let Some(v) = lookup("TELEGRAM_CHAT_ID") {
            self.notify.telegram_chat_id = Some(v);
        }
        self
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("portier.toml")];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "portier") {
        paths.push(dirs.config_dir().join("portier.toml"));
    }
    paths
}

/// Load config from the first discoverable file, then apply env overrides.
pub fn discover_and_load() -> Config {
    let config = candidate_paths()
        .iter()
        .find_map(|p| Config::from_file(p))
        .unwrap_or_default();
    config.apply_env_overrides(|name| std::env::var(name).ok())
}
