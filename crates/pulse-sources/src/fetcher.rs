use std::collections::HashMap;

use async_trait::async_trait;
use pulse_core::types::{CrawlResult, RawItem, SourceKind};

use crate::context::FetchContext;
use crate::error::Result;

/// Uniform contract every ingestion source implements.
///
/// A fetcher never raises on a source-level failure — it reports the
/// outcome through the returned [`CrawlResult`] and an empty item vec,
/// so one broken source never aborts a run.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stable lowercase identifier matching [`SourceKind`]'s wire form.
    fn kind(&self) -> SourceKind;

    /// Reject malformed source parameters before a run ever starts.
    fn validate(&self, params: &serde_json::Value) -> Result<()>;

    /// Fetch items for `source_name` within `[now-window_hours, now]`.
    /// `watermark` is the latest `published_at` previously seen for this
    /// source, used by adaptive fetchers (the X fetcher) to size the pull.
    async fn fetch(
        &self,
        ctx: &FetchContext,
        source_name: &str,
        params: &serde_json::Value,
        window_hours: i64,
        watermark: Option<chrono::DateTime<chrono::Utc>>,
    ) -> (Vec<RawItem>, CrawlResult);
}

/// Maps a [`SourceKind`] to its registered [`Fetcher`] implementation.
///
/// New kinds are added by registering an implementation; the registry
/// itself has no knowledge of concrete fetcher types.
#[derive(Default)]
pub struct SourceRegistry {
    fetchers: HashMap<SourceKind, Box<dyn Fetcher>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            fetchers: HashMap::new(),
        }
    }

    pub fn register(&mut self, fetcher: Box<dyn Fetcher>) {
        self.fetchers.insert(fetcher.kind(), fetcher);
    }

    pub fn get(&self, kind: SourceKind) -> Option<&dyn Fetcher> {
        self.fetchers.get(&kind).map(|b| b.as_ref())
    }
}

/// Drop items outside `[now-window_hours, now]`. Applied by every
/// concrete fetcher before returning.
pub fn filter_window(
    items: Vec<RawItem>,
    now: chrono::DateTime<chrono::Utc>,
    window_hours: i64,
) -> Vec<RawItem> {
    let floor = now - chrono::Duration::hours(window_hours);
    items
        .into_iter()
        .filter(|i| i.published_at >= floor && i.published_at <= now)
        .collect()
}
