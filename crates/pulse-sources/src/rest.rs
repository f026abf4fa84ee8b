use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::types::{CrawlResult, CrawlStatus, RawItem, SourceKind};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;

use crate::context::FetchContext;
use crate::error::{Result, SourceError};
use crate::fetcher::{filter_window, Fetcher};
use crate::retry::{with_backoff, AttemptError};

/// How to locate the item array and map its fields. `array_field` is
/// `None` when the response body is itself the top-level array.
#[derive(Debug, Deserialize, Clone)]
pub struct ResponseMapping {
    #[serde(default)]
    pub array_field: Option<String>,
    pub title_field: String,
    pub body_field: String,
    pub url_field: String,
    pub published_at_field: String,
}

#[derive(Debug, Deserialize)]
struct RestParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    response_mapping: ResponseMapping,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Issues a single HTTP call per source and maps the response into
/// `RawItem`s via a configured field mapping.
pub struct RestFetcher {
    client: Client,
}

impl RestFetcher {
    pub fn new(timeout_seconds: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("reqwest client builds with static config");
        Self { client }
    }
}

#[async_trait]
impl Fetcher for RestFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Rest
    }

    fn validate(&self, params: &serde_json::Value) -> Result<()> {
        let parsed: RestParams = serde_json::from_value(params.clone())
            .map_err(|e| SourceError::InvalidParams { name: "rest".into(), reason: e.to_string() })?;
        url::Url::parse(&parsed.url)
            .map_err(|e| SourceError::InvalidParams { name: "rest".into(), reason: e.to_string() })?;
        Method::from_bytes(parsed.method.as_bytes())
            .map_err(|e| SourceError::InvalidParams { name: "rest".into(), reason: e.to_string() })?;
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
        let parsed: RestParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => return error_result(source_name, format!("invalid params: {e}")),
        };

        if ctx.check().is_err() {
            return error_result(source_name, "fetch cancelled or past deadline".into());
        }

        let method = match Method::from_bytes(parsed.method.as_bytes()) {
            Ok(m) => m,
            Err(e) => return error_result(source_name, format!("invalid method: {e}")),
        };

        let fetch_result = with_backoff(source_name, || async {
            let mut req = self.client.request(method.clone(), &parsed.url);
            for (k, v) in &parsed.headers {
                req = req.header(k, v);
            }
            match req.send().await {
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
                    .json::<Value>()
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

        let body = match fetch_result {
            Ok(b) => b,
            Err(e) => return error_result(source_name, e),
        };

        let array = match &parsed.response_mapping.array_field {
            Some(field) => body.get(field).cloned().unwrap_or(Value::Null),
            None => body,
        };

        let Value::Array(entries) = array else {
            return error_result(source_name, "response is not a top-level or nested array".into());
        };

        let now = Utc::now();
        let mut items = Vec::new();
        for entry in entries {
            match map_entry(&entry, &parsed.response_mapping, source_name) {
                Some(item) => items.push(item),
                None => continue,
            }
        }

        let windowed = filter_window(items, now, window_hours);
        let count = windowed.len();

        (
            windowed,
            CrawlResult {
                source_name: source_name.to_string(),
                kind: SourceKind::Rest,
                status: CrawlStatus::Ok,
                item_count: count,
                error_message: None,
            },
        )
    }
}

fn map_entry(entry: &Value, mapping: &ResponseMapping, source_name: &str) -> Option<RawItem> {
    let title = entry.get(&mapping.title_field)?.as_str()?.to_string();
    let body = entry
        .get(&mapping.body_field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let url = entry.get(&mapping.url_field)?.as_str()?.to_string();
    let published_raw = entry.get(&mapping.published_at_field)?.as_str()?;
    let published_at = DateTime::parse_from_rfc3339(published_raw)
        .ok()?
        .with_timezone(&Utc);

    Some(RawItem {
        title,
        body,
        url,
        published_at,
        source_name: source_name.to_string(),
        source_kind: SourceKind::Rest,
    })
}

fn error_result(source_name: &str, message: String) -> (Vec<RawItem>, CrawlResult) {
    (
        Vec::new(),
        CrawlResult {
            source_name: source_name.to_string(),
            kind: SourceKind::Rest,
            status: CrawlStatus::Error,
            item_count: 0,
            error_message: Some(message),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ResponseMapping {
        ResponseMapping {
            array_field: Some("data".to_string()),
            title_field: "headline".to_string(),
            body_field: "summary".to_string(),
            url_field: "link".to_string(),
            published_at_field: "published".to_string(),
        }
    }

    #[test]
    fn maps_entry_fields() {
        let entry = serde_json::json!({
            "headline": "BTC rallies",
            "summary": "Price moved up",
            "link": "https://example.com/a",
            "published": "2026-07-30T00:00:00Z",
        });
        let item = map_entry(&entry, &mapping(), "coingape").unwrap();
        assert_eq!(item.title, "BTC rallies");
        assert_eq!(item.source_name, "coingape");
    }

    #[test]
    fn drops_entry_missing_required_field() {
        let entry = serde_json::json!({ "headline": "BTC rallies" });
        assert!(map_entry(&entry, &mapping(), "coingape").is_none());
    }
}
