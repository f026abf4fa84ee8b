pub mod auth;
pub mod commands;
pub mod error;
pub mod escape;
pub mod messenger;
pub mod rate_limit;

pub use auth::AuthorizationSet;
pub use commands::CommandSurface;
pub use error::{Result, TelegramError};
pub use escape::TelegramMarkdownV2;
pub use messenger::TelegramMessenger;
pub use rate_limit::RateLimiter;

use std::sync::Arc;

use pulse_core::types::{ChatContext, ChatKind};
use teloxide::prelude::*;
use tracing::{info, warn};

/// Drives the teloxide long-polling dispatcher for the command surface.
///
/// Handles inbound command dispatch only; there is no separate outbound
/// delivery task here since the Coordinator sends reports directly via
/// the shared `TelegramMessenger`.
pub struct TelegramAdapter {
    bot: Bot,
    surface: Arc<CommandSurface>,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, surface: Arc<CommandSurface>) -> Self {
        Self { bot, surface }
    }

    /// Connect to Telegram and drive the long-polling loop. Never returns
    /// under normal operation.
    pub async fn run(self) {
        info!("pulse-telegram: starting long-polling dispatcher");
        let surface = Arc::clone(&self.surface);
        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![surface])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    surface: Arc<CommandSurface>,
) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let from = match msg.from.as_ref() {
        Some(u) => u,
        None => return Ok(()),
    };
    let text = match msg.text() {
        Some(t) if t.starts_with('/') => t,
        _ => return Ok(()),
    };

    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    };

    let ctx = ChatContext {
        user_id: from.id.0 as i64,
        username: from.username.clone(),
        chat_id: msg.chat.id.0,
        chat_kind,
    };

    let (command, args) = match text.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest),
        None => (text, ""),
    };
    let command = command.split('@').next().unwrap_or(command);

    let reply = surface.handle(&ctx, command, args).await;
    if let Err(e) = bot.send_message(msg.chat.id, &reply).await {
        warn!(error = %e, "pulse-telegram: failed to send command reply");
    }
    Ok(())
}
