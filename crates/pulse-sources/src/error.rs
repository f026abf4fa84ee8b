use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source kind '{0}' is not registered")]
    UnknownKind(String),

    #[error("invalid source parameters for '{name}': {reason}")]
    InvalidParams { name: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    FeedParse(String),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error("response mapping error: {0}")]
    Mapping(String),

    #[error("fetch deadline exceeded")]
    DeadlineExceeded,

    #[error("fetch cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SourceError>;
