use std::sync::Arc;

use chrono::Utc;
use pulse_core::types::{ChatContext, SnapshotOrigin};
use pulse_coordinator::{Coordinator, CoordinatorError};
use pulse_market::MarketSnapshotProvider;
use tracing::info;

use crate::auth::AuthorizationSet;
use crate::rate_limit::{CommandDecision, RateLimiter, RunDecision};

const HELP_TEXT: &str = "\
Commands:
/run - trigger an on-demand analysis run
/market - current market snapshot
/status - active runs and last completion
/tokens - LLM token usage this session
/help - this message
/start - welcome message";

/// Receives `(ChatContext, command, args)` from the messenger dispatcher,
/// authorizes, rate-limits, and dispatches to the Coordinator. Every
/// authorization decision is logged with the chat id and outcome,
/// regardless of whether it was allowed.
pub struct CommandSurface {
    coordinator: Arc<Coordinator>,
    market: Arc<MarketSnapshotProvider>,
    auth: AuthorizationSet,
    rate_limiter: RateLimiter,
}

impl CommandSurface {
    pub fn new(
        coordinator: Arc<Coordinator>,
        market: Arc<MarketSnapshotProvider>,
        auth: AuthorizationSet,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            coordinator,
            market,
            auth,
            rate_limiter,
        }
    }

    /// Handle one inbound command, returning the reply text to send back
    /// to `ctx.chat_id`.
    pub async fn handle(&self, ctx: &ChatContext, command: &str, args: &str) -> String {
        if !self.auth.is_authorized(ctx.user_id) {
            log_authorization(ctx, command, "denied", Some("not in allow-list"));
            return "You are not authorized to use this bot.".to_string();
        }

        if matches!(
            self.rate_limiter.check_command(ctx.user_id),
            CommandDecision::RateLimited
        ) {
            log_authorization(ctx, command, "denied", Some("rate limited"));
            return "Rate limit exceeded. Try again later.".to_string();
        }

        log_authorization(ctx, command, "allowed", None);

        match command {
            "/run" => self.handle_run(ctx).await,
            "/market" => self.handle_market().await,
            "/status" => self.handle_status(),
            "/tokens" => self.handle_tokens(),
            "/help" => HELP_TEXT.to_string(),
            "/start" => "Pulsewatch is online. Send /help for the command list.".to_string(),
            other => {
                let _ = args;
                format!("Unknown command: {other}")
            }
        }
    }

    async fn handle_run(&self, ctx: &ChatContext) -> String {
        if matches!(
            self.rate_limiter.check_run_cooldown(ctx.user_id),
            RunDecision::Cooldown
        ) {
            return "A run was triggered too recently. Please wait before retrying.".to_string();
        }

        match self.coordinator.trigger_manual(ctx.user_id, ctx.chat_id) {
            Ok(run_id) => {
                self.rate_limiter.record_run(ctx.user_id);
                format!("Run triggered ({run_id}). Report will follow when it completes.")
            }
            Err(CoordinatorError::Busy { run_id }) => {
                format!("Another run ({run_id}) is already in progress. Try again later.")
            }
            Err(e) => format!("Failed to trigger run: {e}"),
        }
    }

    async fn handle_market(&self) -> String {
        let snapshot = self.market.get(Utc::now()).await;
        if !snapshot.valid {
            return "Market snapshot is currently unavailable.".to_string();
        }
        let origin = match snapshot.origin {
            SnapshotOrigin::Live => "live",
            SnapshotOrigin::Cached => "cached",
            SnapshotOrigin::Fallback => "fallback",
        };
        format!("{}\n\n(source: {origin})", snapshot.text)
    }

    fn handle_status(&self) -> String {
        let active = self.coordinator.active_runs();
        let mut out = String::new();
        if active.is_empty() {
            out.push_str("No active runs.\n");
        } else {
            out.push_str("Active runs:\n");
            for handle in &active {
                out.push_str(&format!(
                    "- {} ({}) stage={} started_at={}\n",
                    handle.run_id, handle.trigger, handle.stage, handle.started_at
                ));
            }
        }
        match self.coordinator.last_completed_at() {
            Some(at) => out.push_str(&format!("Last completed run: {at}")),
            None => out.push_str("No run has completed yet."),
        }
        out
    }

    fn handle_tokens(&self) -> String {
        let usage = self.coordinator.token_usage();
        format!(
            "Tokens this session — in: {}, out: {}",
            usage.tokens_in, usage.tokens_out
        )
    }
}

fn log_authorization(ctx: &ChatContext, command: &str, decision: &str, reason: Option<&str>) {
    info!(
        command,
        user_id = ctx.user_id,
        username = ctx.username.as_deref().unwrap_or(""),
        chat_kind = %ctx.chat_kind,
        chat_id = ctx.chat_id,
        decision,
        reason,
        "command surface authorization decision"
    );
}
