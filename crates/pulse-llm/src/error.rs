use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, LlmError>;
