#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("authentication rejected by {provider}")]
    Unauthorized { provider: &'static str },

    #[error("{provider} API request failed (status {status})")]
    Api {
        provider: &'static str,
        status: u16,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether retrying the same request later could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited | Self::Timeout | Self::SseParse(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
