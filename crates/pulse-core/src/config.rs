use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

pub const DEFAULT_EXECUTION_INTERVAL_SECS: u64 = 6 * 3600;
pub const DEFAULT_TIME_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_DEDUP_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_SENT_CACHE_TTL_HOURS: i64 = 24;
pub const DEFAULT_SENT_SUMMARY_MAX_CHARS: usize = 8 * 1024;
pub const DEFAULT_MAX_PAGES_LIMIT: u32 = 3;
pub const DEFAULT_PAGE_HOUR_UNIT: i64 = 6;
pub const DEFAULT_FETCH_HOURS: i64 = 24;
pub const DEFAULT_X_TOOL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SNAPSHOT_TTL_MINUTES: i64 = 30;
pub const DEFAULT_SNAPSHOT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_ANALYSIS_MAX_RETRIES: u32 = 2;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4096;
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 1;
pub const DEFAULT_MAX_COMMANDS_PER_WINDOW: u32 = 120;
pub const DEFAULT_COOLDOWN_SECS: u64 = 5 * 60;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
pub const DEFAULT_MAX_FETCH_PARALLELISM: usize = 16;
pub const DEFAULT_REPORT_TIMEZONE_OFFSET_HOURS: i32 = 8;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Top-level config (`pulse.toml` + `PULSE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default = "default_execution_interval_secs")]
    pub execution_interval_seconds: u64,
    #[serde(default = "default_time_window_hours")]
    pub time_window_hours: i64,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub x_params: XParamsConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub command_surface: CommandSurfaceConfig,
    /// Opaque broadcast channel id (Telegram chat id for scheduled reports).
    pub broadcast_chat_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_dedup_window_days")]
    pub dedup_window_days: i64,
    #[serde(default = "default_sent_cache_ttl_hours")]
    pub sent_cache_ttl_hours: i64,
    pub backing_path: String,
    #[serde(default = "default_sent_summary_max_chars")]
    pub sent_summary_max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: crate::types::SourceKind,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XParamsConfig {
    #[serde(default = "default_max_pages_limit")]
    pub max_pages_limit: u32,
    #[serde(default = "default_page_hour_unit")]
    pub page_hour_unit: i64,
    #[serde(default = "default_fetch_hours")]
    pub default_fetch_hours: i64,
    #[serde(default = "default_x_tool_timeout_secs")]
    pub tool_timeout_seconds: u64,
    /// Path or name of the external X/Twitter CLI tool.
    #[serde(default = "default_x_tool_command")]
    pub tool_command: String,
}

impl Default for XParamsConfig {
    fn default() -> Self {
        Self {
            max_pages_limit: default_max_pages_limit(),
            page_hour_unit: default_page_hour_unit(),
            default_fetch_hours: default_fetch_hours(),
            tool_timeout_seconds: default_x_tool_timeout_secs(),
            tool_command: default_x_tool_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub analysis_model: String,
    pub snapshot_model: String,
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_seconds: u64,
    #[serde(default = "default_analysis_max_retries")]
    pub analysis_max_retries: u32,
    #[serde(default = "default_snapshot_ttl_minutes")]
    pub snapshot_ttl_minutes: i64,
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_seconds: u64,
    /// API key for whichever provider `analysis_model`/`snapshot_model`
    /// resolve to (single-provider deployments only).
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSurfaceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_max_commands_per_window")]
    pub max_commands_per_window: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_seconds: u64,
    pub bot_token: String,
}

impl Default for CommandSurfaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_commands_per_window: default_max_commands_per_window(),
            cooldown_seconds: default_cooldown_secs(),
            max_concurrent_runs: default_max_concurrent_runs(),
            run_timeout_seconds: default_run_timeout_secs(),
            bot_token: String::new(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_execution_interval_secs() -> u64 {
    DEFAULT_EXECUTION_INTERVAL_SECS
}
fn default_time_window_hours() -> i64 {
    DEFAULT_TIME_WINDOW_HOURS
}
fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}
fn default_dedup_window_days() -> i64 {
    DEFAULT_DEDUP_WINDOW_DAYS
}
fn default_sent_cache_ttl_hours() -> i64 {
    DEFAULT_SENT_CACHE_TTL_HOURS
}
fn default_sent_summary_max_chars() -> usize {
    DEFAULT_SENT_SUMMARY_MAX_CHARS
}
fn default_max_pages_limit() -> u32 {
    DEFAULT_MAX_PAGES_LIMIT
}
fn default_page_hour_unit() -> i64 {
    DEFAULT_PAGE_HOUR_UNIT
}
fn default_fetch_hours() -> i64 {
    DEFAULT_FETCH_HOURS
}
fn default_x_tool_timeout_secs() -> u64 {
    DEFAULT_X_TOOL_TIMEOUT_SECS
}
fn default_x_tool_command() -> String {
    "xfetcher".to_string()
}
fn default_analysis_timeout_secs() -> u64 {
    DEFAULT_ANALYSIS_TIMEOUT_SECS
}
fn default_analysis_max_retries() -> u32 {
    DEFAULT_ANALYSIS_MAX_RETRIES
}
fn default_snapshot_ttl_minutes() -> i64 {
    DEFAULT_SNAPSHOT_TTL_MINUTES
}
fn default_snapshot_timeout_secs() -> u64 {
    DEFAULT_SNAPSHOT_TIMEOUT_SECS
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_max_commands_per_window() -> u32 {
    DEFAULT_MAX_COMMANDS_PER_WINDOW
}
fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}
fn default_max_concurrent_runs() -> usize {
    DEFAULT_MAX_CONCURRENT_RUNS
}
fn default_run_timeout_secs() -> u64 {
    DEFAULT_RUN_TIMEOUT_SECS
}

/// A single entry in `AUTHORIZED_USERS`: either a numeric Telegram user id
/// or an `@username` token to be resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEntry {
    Numeric(i64),
    Username(String),
}

/// Parse the `AUTHORIZED_USERS` env value: comma-separated ids and/or
/// `@username`s.
pub fn parse_authorized_users(raw: &str) -> Vec<AuthEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if let Some(name) = s.strip_prefix('@') {
                Some(AuthEntry::Username(name.to_string()))
            } else {
                s.parse::<i64>().ok().map(AuthEntry::Numeric)
            }
        })
        .collect()
}

impl PulseConfig {
    /// Load config from TOML with `PULSE_*` env var overrides, matching
    /// `skynet_core::config::SkynetConfig::load`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| "pulse.toml".to_string());

        let config: PulseConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PULSE_").split("_"))
            .extract()
            .map_err(|e| PulseError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Fatal-at-startup numeric validation: pinpoint the offending field
    /// rather than failing generically.
    pub fn validate(&self) -> Result<()> {
        if self.execution_interval_seconds == 0 {
            return Err(PulseError::Config(
                "execution_interval_seconds must be > 0".into(),
            ));
        }
        if self.time_window_hours <= 0 {
            return Err(PulseError::Config("time_window_hours must be > 0".into()));
        }
        if self.storage.retention_days <= 0 {
            return Err(PulseError::Config(
                "storage.retention_days must be > 0".into(),
            ));
        }
        if self.storage.dedup_window_days <= 0 {
            return Err(PulseError::Config(
                "storage.dedup_window_days must be > 0".into(),
            ));
        }
        if self.storage.backing_path.trim().is_empty() {
            return Err(PulseError::Config(
                "storage.backing_path must not be empty".into(),
            ));
        }
        if self.x_params.max_pages_limit == 0 {
            return Err(PulseError::Config(
                "x_params.max_pages_limit must be > 0".into(),
            ));
        }
        if self.x_params.page_hour_unit <= 0 {
            return Err(PulseError::Config(
                "x_params.page_hour_unit must be > 0".into(),
            ));
        }
        if self.llm.analysis_model.trim().is_empty() {
            return Err(PulseError::Config("llm.analysis_model must be set".into()));
        }
        if self.llm.snapshot_model.trim().is_empty() {
            return Err(PulseError::Config("llm.snapshot_model must be set".into()));
        }
        if self.command_surface.enabled && self.command_surface.bot_token.trim().is_empty() {
            return Err(PulseError::Config(
                "command_surface.bot_token must be set when command_surface.enabled".into(),
            ));
        }
        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            let key = (source.name.clone(), source.kind);
            if !names.insert(key) {
                return Err(PulseError::Config(format!(
                    "duplicate source name '{}' for kind {:?}",
                    source.name, source.kind
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_authorized_users() {
        let entries = parse_authorized_users("123, @alice , 456,@bob");
        assert_eq!(
            entries,
            vec![
                AuthEntry::Numeric(123),
                AuthEntry::Username("alice".into()),
                AuthEntry::Numeric(456),
                AuthEntry::Username("bob".into()),
            ]
        );
    }

    #[test]
    fn empty_authorized_users_yields_empty_set() {
        assert!(parse_authorized_users("").is_empty());
        assert!(parse_authorized_users("   ").is_empty());
    }
}
