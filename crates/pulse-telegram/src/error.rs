use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram API error: {0}")]
    Api(String),

    #[error("username resolution failed for @{0}")]
    UnknownUsername(String),
}

pub type Result<T> = std::result::Result<T, TelegramError>;
