use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pulse_analysis::Analyzer;
use pulse_coordinator::{Coordinator, CoordinatorConfig};
use pulse_core::config::PulseConfig;
use pulse_core::error::PulseError;
use pulse_llm::anthropic::AnthropicClient;
use pulse_market::MarketSnapshotProvider;
use pulse_report::Reporter;
use pulse_sources::rest::RestFetcher;
use pulse_sources::rss::RssFetcher;
use pulse_sources::x::XFetcher;
use pulse_sources::SourceRegistry;
use pulse_store::Store;
use pulse_telegram::{AuthorizationSet, CommandSurface, RateLimiter, TelegramAdapter, TelegramMarkdownV2, TelegramMessenger};
use teloxide::Bot;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pulse-gateway")]
struct Args {
    /// Path to the TOML config file. Falls back to PULSE_CONFIG, then
    /// `pulse.toml` in the working directory.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_gateway=info".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("PULSE_CONFIG").ok());

    let config = match PulseConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration invalid, exiting");
            std::process::exit(PulseError::Config(e.to_string()).exit_code());
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal error, exiting");
        std::process::exit(e.exit_code());
    }
}

async fn run(config: PulseConfig) -> Result<(), PulseError> {
    let store = Arc::new(
        Store::open(&config.storage.backing_path, config.storage.dedup_window_days)
            .map_err(|e| PulseError::Store(e.to_string()))?,
    );

    let mut registry = SourceRegistry::new();
    registry.register(Box::new(RssFetcher::new(60)));
    registry.register(Box::new(RestFetcher::new(60)));
    registry.register(Box::new(XFetcher::new(
        config.x_params.tool_command.clone(),
        config.x_params.page_hour_unit,
        config.x_params.max_pages_limit as i64,
        config.x_params.default_fetch_hours,
        config.x_params.tool_timeout_seconds,
    )));
    let registry = Arc::new(registry);

    let snapshot_llm = Box::new(AnthropicClient::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    let market = Arc::new(MarketSnapshotProvider::new(
        snapshot_llm,
        config.llm.snapshot_model.clone(),
        config.llm.snapshot_ttl_minutes,
        config.llm.snapshot_timeout_seconds,
    ));

    let analysis_llm = Box::new(AnthropicClient::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    let analyzer = Arc::new(Analyzer::new(
        analysis_llm,
        config.llm.analysis_model.clone(),
        config.llm.analysis_timeout_seconds,
        config.llm.analysis_max_retries,
    ));

    let reporter = Arc::new(Reporter::new(pulse_core::config::DEFAULT_REPORT_TIMEZONE_OFFSET_HOURS));
    let escape_rules = Arc::new(TelegramMarkdownV2);

    let bot = Bot::new(&config.command_surface.bot_token);
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));

    let coordinator_cfg = CoordinatorConfig {
        sources: config.sources.clone(),
        time_window_hours: config.time_window_hours,
        sent_cache_ttl_hours: config.storage.sent_cache_ttl_hours,
        sent_summary_max_chars: config.storage.sent_summary_max_chars,
        max_message_chars: pulse_core::config::DEFAULT_MAX_MESSAGE_CHARS,
        max_fetch_parallelism: config.sources.len().clamp(1, pulse_core::config::DEFAULT_MAX_FETCH_PARALLELISM),
        max_concurrent_runs: config.command_surface.max_concurrent_runs,
        run_timeout_seconds: config.command_surface.run_timeout_seconds,
        broadcast_chat_id: config.broadcast_chat_id,
    };

    let coordinator = Coordinator::new(
        store,
        registry,
        market.clone(),
        analyzer,
        reporter,
        messenger.clone(),
        escape_rules,
        coordinator_cfg,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_coordinator = Arc::clone(&coordinator);
    let scheduler_handle = tokio::spawn(
        scheduler_coordinator.run_scheduler(config.execution_interval_seconds, shutdown_rx),
    );

    if config.command_surface.enabled {
        let authorized_users = std::env::var("AUTHORIZED_USERS").unwrap_or_default();
        let entries = pulse_core::config::parse_authorized_users(&authorized_users);
        let auth = AuthorizationSet::build(&entries, messenger.as_ref()).await;
        let rate_limiter = RateLimiter::new(
            Duration::from_secs(3600),
            config.command_surface.max_commands_per_window,
            Duration::from_secs(config.command_surface.cooldown_seconds),
        );
        let surface = Arc::new(CommandSurface::new(
            Arc::clone(&coordinator),
            market,
            auth,
            rate_limiter,
        ));
        let adapter = TelegramAdapter::new(bot, surface);
        tokio::spawn(adapter.run());
    } else {
        info!("command surface disabled, running scheduler only");
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(PulseError::Io)?;
    info!("shutdown signal received, stopping scheduler and active runs");

    let _ = shutdown_tx.send(true);
    coordinator.cancel_all();

    let grace = Duration::from_secs(pulse_core::config::DEFAULT_SHUTDOWN_GRACE_SECS);
    if tokio::time::timeout(grace, scheduler_handle).await.is_err() {
        warn!("scheduler did not shut down within the grace period");
    }

    Ok(())
}
