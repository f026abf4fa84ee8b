use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("send timed out")]
    Timeout,
}

/// Narrow outbound capability the Coordinator and CommandSurface need from
/// the chat backend. Username resolution and command intake are part of
/// the same external collaborator but are driven from `pulse-telegram`'s
/// dispatcher rather than polled from here.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), MessengerError>;

    /// Resolve an `@username` to a numeric user id, if known. `None` means
    /// the lookup failed or the user has never interacted with the bot.
    async fn resolve_username(&self, name: &str) -> Option<i64>;
}
