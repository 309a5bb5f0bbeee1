//! Closed failure taxonomy shared by the store, the AI gateway and the HTTP layer.
//!
//! Failures are classified where the raw failure is observed and passed through
//! unchanged. `Display` is the diagnostic text (development mode only);
//! [`Error::public_message`] is what every caller may see.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Client-correctable input problem. The message is safe to show as-is.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Named entity (e.g. "Entry") does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Operator-correctable misconfiguration. Never carries secrets.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upstream request exceeded its {}ms budget", .budget.as_millis())]
    Timeout { budget: Duration },

    #[error("upstream rate limit exceeded: {detail}")]
    RateLimited {
        retry_after: Option<u64>,
        detail: String,
    },

    /// `status` is set when the upstream answered with an error status, unset when
    /// it could not be reached at all.
    #[error("upstream unavailable: {detail}")]
    UpstreamUnavailable { status: Option<u16>, detail: String },

    #[error("upstream returned an unusable payload: {0}")]
    UpstreamProtocol(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn store(detail: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(detail.to_string())
    }

    /// HTTP status the router answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::Configuration(_) => 500,
            Self::Timeout { .. } => 504,
            Self::RateLimited { .. } => 429,
            Self::UpstreamUnavailable { status: Some(_), .. } => 502,
            Self::UpstreamUnavailable { status: None, .. } => 503,
            Self::UpstreamProtocol(_) => 500,
            Self::StoreUnavailable(_) => 503,
        }
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Configuration(_) => "configuration",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamProtocol(_) => "upstream_protocol",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Message safe to return in production mode.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::NotFound(entity) => format!("{} not found", entity),
            Self::Configuration(_) => "AI service configuration error".to_string(),
            Self::Timeout { .. } => "AI service timed out. Please try again later.".to_string(),
            Self::RateLimited { .. } => "Rate limit exceeded. Please try again later.".to_string(),
            Self::UpstreamUnavailable { .. } => {
                "AI service is currently unavailable. Please try again later.".to_string()
            }
            Self::UpstreamProtocol(_) => "Invalid response from AI service".to_string(),
            Self::StoreUnavailable(_) => "Database temporarily unavailable".to_string(),
        }
    }

    /// Seconds the client should wait before retrying, when known.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
