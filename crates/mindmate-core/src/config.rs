//! Application configuration, loaded once at startup and passed explicitly to the
//! connection cache, the entry store and the AI gateway.
//!
//! | Source | Precedence |
//! |--------|------------|
//! | Built-in defaults | lowest |
//! | Plain `PORT` / `NODE_ENV` / `OPENROUTER_API_KEY` | |
//! | `MINDMATE_CONFIG` file (default `config/mindmate.toml`, optional) | |
//! | `MINDMATE_*` env (`__` separates nested keys, e.g. `MINDMATE_STORE__URI`) | highest |

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/mindmate";
const ENV_PREFIX: &str = "MINDMATE";

/// Frontend origin of the hosted deployment; also sent as the upstream `HTTP-Referer`.
pub const FRONTEND_ORIGIN: &str = "https://mind-mate-frontend-lime.vercel.app";

/// Operating mode. Production strips diagnostic detail from error responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    /// Accepts `production`/`prod` and `development`/`dev` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Backing-store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `sled://<path>`, a bare path, or `mem://` for a throwaway database.
    pub uri: String,
    /// Budget for a single connection attempt.
    pub connect_timeout_ms: u64,
    /// Budget for a single store operation on an established connection.
    pub socket_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "sled://./data/mindmate".to_string(),
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 45_000,
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

/// Upstream chat-completion provider settings (OpenRouter-compatible).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub referer: String,
    pub title: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            timeout_ms: 30_000,
            referer: FRONTEND_ORIGIN.to_string(),
            title: "MindMate".to_string(),
        }
    }
}

// Manual Debug so the credential never ends up in logs.
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.credential().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .finish()
    }
}

impl AiConfig {
    /// The bearer credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-client request budget for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests a single client may make per window.
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients by the first `X-Forwarded-For` address instead of the peer.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 15 * 60,
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        FRONTEND_ORIGIN.to_string(),
    ]
}

/// Everything the process needs from its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub mode: RunMode,
    pub store: StoreConfig,
    pub ai: AiConfig,
    pub rate_limit: RateLimitConfig,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            mode: RunMode::default(),
            store: StoreConfig::default(),
            ai: AiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl AppConfig {
    /// Load from `MINDMATE_CONFIG` (or `config/mindmate.{toml}`) plus the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("MINDMATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from an explicit file path (missing file is not an error) plus the environment.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("port", 5000_i64)?
            .set_default("mode", RunMode::default().as_str())?;

        // Conventional unprefixed variables only replace built-in defaults.
        if let Some(port) = env_opt_string("PORT") {
            builder = builder.set_default("port", port)?;
        }
        if let Some(mode) = env_opt_string("NODE_ENV").and_then(|m| RunMode::parse(&m)) {
            builder = builder.set_default("mode", mode.as_str())?;
        }
        if let Some(key) = env_opt_string("OPENROUTER_API_KEY") {
            builder = builder.set_default("ai.api_key", key)?;
        }

        builder
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
