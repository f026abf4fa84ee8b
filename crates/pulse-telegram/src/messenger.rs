use std::time::Duration;

use async_trait::async_trait;
use pulse_coordinator::{Messenger, MessengerError};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

/// Maximum characters per Telegram message (limit is 4096; 4090 for safety).
const CHUNK_MAX: usize = 4090;

/// Outbound side of the command surface: sends chunked messages and
/// resolves `@username` entries to numeric chat ids. Resolution only
/// happens at startup authorization-set construction, never on the
/// command hot path.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
        for (i, chunk) in split_chunks(text).into_iter().enumerate() {
            let sent = self
                .bot
                .send_message(ChatId(chat_id), &chunk)
                .parse_mode(ParseMode::MarkdownV2)
                .await;

            if let Err(e) = sent {
                warn!(error = %e, "telegram: MarkdownV2 send rejected, retrying as plain text");
                self.bot
                    .send_message(ChatId(chat_id), strip_markup(&chunk))
                    .await
                    .map_err(|e| MessengerError::SendFailed(e.to_string()))?;
            }

            if i > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
        Ok(())
    }

    async fn resolve_username(&self, name: &str) -> Option<i64> {
        match self.bot.get_chat(format!("@{name}")).await {
            Ok(chat) => Some(chat.id.0),
            Err(e) => {
                warn!(username = %name, error = %e, "telegram: username resolution failed");
                None
            }
        }
    }
}

/// Reporter output already fits `max_message_chars` per segment; this is
/// a re-split in case a segment still exceeds Telegram's hard 4096-char
/// wire limit.
fn split_chunks(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut remaining = text;
    while remaining.len() > CHUNK_MAX {
        let split_at = remaining[..CHUNK_MAX]
            .rfind('\n')
            .unwrap_or(CHUNK_MAX);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
    }
    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

/// Best-effort removal of MarkdownV2 escape backslashes for the plain-text
/// fallback path.
fn strip_markup(text: &str) -> String {
    text.replace('\\', "")
}
