use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::types::{CrawlResult, CrawlStatus, RawItem, SourceKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::context::FetchContext;
use crate::error::{SourceError, Result};
use crate::fetcher::{filter_window, Fetcher};
use crate::retry::{with_backoff, AttemptError};

#[derive(Debug, Deserialize)]
struct RssParams {
    url: String,
}

/// Retrieves an RSS 2.0 or Atom feed and extracts title/body/url/published_at.
/// Entries missing a url or publish time are dropped.
pub struct RssFetcher {
    client: Client,
    timeout: Duration,
}

impl RssFetcher {
    pub fn new(timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    fn validate(&self, params: &serde_json::Value) -> Result<()> {
        let parsed: RssParams = serde_json::from_value(params.clone())
            .map_err(|e| SourceError::InvalidParams { name: "rss".into(), reason: e.to_string() })?;
        url::Url::parse(&parsed.url)
            .map_err(|e| SourceError::InvalidParams { name: "rss".into(), reason: e.to_string() })?;
        Ok(())
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source_name: &str,
        params: &serde_json::Value,
        window_hours: i64,
        _watermark: Option<DateTime<Utc>>,
    ) -> (Vec<RawItem>, CrawlResult) {
        let parsed: RssParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => return error_result(source_name, format!("invalid params: {e}")),
        };

        if ctx.check().is_err() {
            return error_result(source_name, "fetch cancelled or past deadline".into());
        }

        let fetch_result = with_backoff(source_name, || async {
            match self.client.get(&parsed.url).send().await {
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    Err(AttemptError::RateLimited {
                        retry_after,
                        source: format!("rate limited fetching {}", parsed.url),
                    })
                }
                Ok(resp) if resp.status().is_success() => resp
                    .bytes()
                    .await
                    .map_err(|e| AttemptError::Transient(e.to_string())),
                Ok(resp) => Err(AttemptError::Transient(format!(
                    "{} -> HTTP {}",
                    parsed.url,
                    resp.status()
                ))),
                Err(e) => Err(AttemptError::Transient(e.to_string())),
            }
        })
        .await;

        let bytes = match fetch_result {
            Ok(b) => b,
            Err(e) => return error_result(source_name, e),
        };

        let feed = match feed_rs::parser::parse(Cursor::new(bytes)) {
            Ok(f) => f,
            Err(e) => return error_result(source_name, format!("feed parse error: {e}")),
        };

        let now = Utc::now();
        let mut items = Vec::new();
        for entry in feed.entries {
            let Some(link) = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().unwrap_or("alternate") == "alternate")
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone())
            else {
                continue;
            };
            let Some(published_at) = entry.published.or(entry.updated) else {
                continue;
            };
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "[untitled]".to_string());
            let body = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            items.push(RawItem {
                title,
                body,
                url: link,
                published_at,
                source_name: source_name.to_string(),
                source_kind: SourceKind::Rss,
            });
        }

        let windowed = filter_window(items, now, window_hours);
        if windowed.is_empty() {
            warn!(source = source_name, "rss fetch returned zero in-window entries");
        }

        let count = windowed.len();
        (
            windowed,
            CrawlResult {
                source_name: source_name.to_string(),
                kind: SourceKind::Rss,
                status: CrawlStatus::Ok,
                item_count: count,
                error_message: None,
            },
        )
    }
}

fn error_result(source_name: &str, message: String) -> (Vec<RawItem>, CrawlResult) {
    (
        Vec::new(),
        CrawlResult {
            source_name: source_name.to_string(),
            kind: SourceKind::Rss,
            status: CrawlStatus::Error,
            item_count: 0,
            error_message: Some(message),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_malformed_url() {
        let fetcher = RssFetcher::new(30);
        let params = serde_json::json!({ "url": "not a url" });
        assert!(fetcher.validate(&params).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_url() {
        let fetcher = RssFetcher::new(30);
        let params = serde_json::json!({ "url": "https://example.com/feed.xml" });
        assert!(fetcher.validate(&params).is_ok());
    }
}
