use chrono::{DateTime, Utc};
use async_trait::async_trait;
use pulse_core::types::{CrawlResult, CrawlStatus, RawItem, SourceKind};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::context::FetchContext;
use crate::error::{Result, SourceError};
use crate::fetcher::{filter_window, Fetcher};

#[derive(Debug, Deserialize)]
struct XParams {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct XRecord {
    text: String,
    url: String,
    published_at: DateTime<Utc>,
}

/// Delegates to an external X/Twitter command-line tool, invoked as a
/// subprocess. Computes an adaptive page depth from the source's watermark
/// so a source that hasn't been polled recently pulls deeper than one
/// polled a minute ago. A non-zero exit or unparseable stdout maps to a
/// `CrawlResult` error rather than propagating a hard failure.
pub struct XFetcher {
    command: String,
    page_hour_unit: i64,
    max_pages_limit: i64,
    default_fetch_hours: i64,
    tool_timeout: std::time::Duration,
}

impl XFetcher {
    pub fn new(
        command: String,
        page_hour_unit: i64,
        max_pages_limit: i64,
        default_fetch_hours: i64,
        tool_timeout_seconds: u64,
    ) -> Self {
        Self {
            command,
            page_hour_unit,
            max_pages_limit,
            default_fetch_hours,
            tool_timeout: std::time::Duration::from_secs(tool_timeout_seconds),
        }
    }

    /// `pages = min(ceil(hours_since_latest / page_hour_unit), max_pages_limit)`,
    /// defaulting `hours_since_latest` to `default_fetch_hours` when no
    /// watermark exists.
    pub fn compute_pages(&self, now: DateTime<Utc>, watermark: Option<DateTime<Utc>>) -> i64 {
        let hours_since_latest = match watermark {
            Some(wm) => (now - wm).num_hours().max(0),
            None => self.default_fetch_hours,
        };
        let pages = (hours_since_latest + self.page_hour_unit - 1) / self.page_hour_unit;
        pages.max(1).min(self.max_pages_limit)
    }
}

#[async_trait]
impl Fetcher for XFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::X
    }

    fn validate(&self, params: &serde_json::Value) -> Result<()> {
        let parsed: XParams = serde_json::from_value(params.clone())
            .map_err(|e| SourceError::InvalidParams { name: "x".into(), reason: e.to_string() })?;
        if parsed.handle.trim().is_empty() {
            return Err(SourceError::InvalidParams {
                name: "x".into(),
                reason: "handle must not be empty".into(),
            });
        }
        Ok(())
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source_name: &str,
        params: &serde_json::Value,
        window_hours: i64,
        watermark: Option<DateTime<Utc>>,
    ) -> (Vec<RawItem>, CrawlResult) {
        let parsed: XParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => return error_result(source_name, format!("invalid params: {e}")),
        };

        if ctx.check().is_err() {
            return error_result(source_name, "fetch cancelled or past deadline".into());
        }

        let now = Utc::now();
        let pages = self.compute_pages(now, watermark);

        debug!(source = source_name, pages, "invoking x fetcher tool");

        let mut cmd = Command::new(&self.command);
        cmd.arg("--handle")
            .arg(&parsed.handle)
            .arg("--pages")
            .arg(pages.to_string())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let output = match tokio::time::timeout(self.tool_timeout, cmd.output()).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return error_result(source_name, format!("x fetcher tool '{}' not found", self.command));
            }
            Ok(Err(e)) => return error_result(source_name, format!("failed to spawn x fetcher: {e}")),
            Err(_) => return error_result(source_name, "x fetcher tool timed out".into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return error_result(
                source_name,
                format!("x fetcher exited with {}: {stderr}", output.status),
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records: Vec<XRecord> = match serde_json::from_str(&stdout) {
            Ok(r) => r,
            Err(e) => {
                warn!(source = source_name, error = %e, "unparseable x fetcher output");
                return error_result(source_name, format!("unparseable x fetcher output: {e}"));
            }
        };

        let items: Vec<RawItem> = records
            .into_iter()
            .map(|r| RawItem {
                title: truncate_title(&r.text),
                body: r.text,
                url: r.url,
                published_at: r.published_at,
                source_name: source_name.to_string(),
                source_kind: SourceKind::X,
            })
            .collect();

        let windowed = filter_window(items, now, window_hours);
        let count = windowed.len();

        (
            windowed,
            CrawlResult {
                source_name: source_name.to_string(),
                kind: SourceKind::X,
                status: CrawlStatus::Ok,
                item_count: count,
                error_message: None,
            },
        )
    }
}

fn truncate_title(text: &str) -> String {
    const MAX: usize = 96;
    if text.len() <= MAX {
        text.to_string()
    } else {
        format!("{}…", &text[..MAX])
    }
}

fn error_result(source_name: &str, message: String) -> (Vec<RawItem>, CrawlResult) {
    (
        Vec::new(),
        CrawlResult {
            source_name: source_name.to_string(),
            kind: SourceKind::X,
            status: CrawlStatus::Error,
            item_count: 0,
            error_message: Some(message),
        },
    )
}
