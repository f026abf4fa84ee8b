use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use pulse_analysis::Analyzer;
use pulse_core::config::SourceConfig;
use pulse_core::types::{
    CrawlResult, CrawlStatus, ExecutionHandle, RunReport, RunStage, RunTrigger,
};
use pulse_market::MarketSnapshotProvider;
use pulse_report::{EscapeRules, Reporter};
use pulse_sources::{FetchContext, SourceRegistry};
use pulse_store::Store;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{CoordinatorError, Result};
use crate::messenger::Messenger;
use crate::stats::{RunStats, RunStatsSnapshot, TokenCounters, TokenUsageSnapshot};

struct RunSlot {
    handle: ExecutionHandle,
    cancel: CancellationToken,
}

/// Coordinator-relevant slice of the process configuration.
pub struct CoordinatorConfig {
    pub sources: Vec<SourceConfig>,
    pub time_window_hours: i64,
    pub sent_cache_ttl_hours: i64,
    pub sent_summary_max_chars: usize,
    pub max_message_chars: usize,
    pub max_fetch_parallelism: usize,
    pub max_concurrent_runs: usize,
    pub run_timeout_seconds: u64,
    pub broadcast_chat_id: i64,
}

/// Owns the full run state machine: gates concurrent runs, drives
/// fetch → analyze → report → send, and tracks run/token statistics for
/// the command surface.
pub struct Coordinator {
    store: Arc<Store>,
    registry: Arc<SourceRegistry>,
    market: Arc<MarketSnapshotProvider>,
    analyzer: Arc<Analyzer>,
    reporter: Arc<Reporter>,
    messenger: Arc<dyn Messenger>,
    escape_rules: Arc<dyn EscapeRules>,
    cfg: CoordinatorConfig,
    run_timeout: StdDuration,
    semaphore: Arc<Semaphore>,
    handles: Mutex<HashMap<Uuid, RunSlot>>,
    last_completed_at: Mutex<Option<chrono::DateTime<Utc>>>,
    stats: RunStats,
    tokens: TokenCounters,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        registry: Arc<SourceRegistry>,
        market: Arc<MarketSnapshotProvider>,
        analyzer: Arc<Analyzer>,
        reporter: Arc<Reporter>,
        messenger: Arc<dyn Messenger>,
        escape_rules: Arc<dyn EscapeRules>,
        cfg: CoordinatorConfig,
    ) -> Arc<Self> {
        let run_timeout = StdDuration::from_secs(cfg.run_timeout_seconds);
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent_runs));
        Arc::new(Self {
            store,
            registry,
            market,
            analyzer,
            reporter,
            messenger,
            escape_rules,
            cfg,
            run_timeout,
            semaphore,
            handles: Mutex::new(HashMap::new()),
            last_completed_at: Mutex::new(None),
            stats: RunStats::default(),
            tokens: TokenCounters::default(),
        })
    }

    pub fn trigger_scheduled(self: &Arc<Self>) -> Result<Uuid> {
        self.trigger(RunTrigger::Scheduled, None, None)
    }

    pub fn trigger_manual(self: &Arc<Self>, triggered_by: i64, target_chat: i64) -> Result<Uuid> {
        self.trigger(RunTrigger::Manual, Some(triggered_by), Some(target_chat))
    }

    fn trigger(
        self: &Arc<Self>,
        trigger: RunTrigger,
        triggered_by: Option<i64>,
        target_chat: Option<i64>,
    ) -> Result<Uuid> {
        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                let active = self.handles.lock().unwrap();
                let run_id = active.keys().next().copied().unwrap_or_else(Uuid::nil);
                return Err(CoordinatorError::Busy { run_id: run_id.to_string() });
            }
        };

        let handle = ExecutionHandle::new(trigger, triggered_by, target_chat);
        let run_id = handle.run_id;
        let cancel = CancellationToken::new();
        self.handles
            .lock()
            .unwrap()
            .insert(run_id, RunSlot { handle, cancel: cancel.clone() });
        self.stats.record_started();

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(run_id, cancel).await;
            drop(permit);
        });

        Ok(run_id)
    }

    /// Active runs as `{run_id, trigger, stage, started_at}` snapshots.
    pub fn active_runs(&self) -> Vec<ExecutionHandle> {
        self.handles.lock().unwrap().values().map(|s| s.handle.clone()).collect()
    }

    pub fn last_completed_at(&self) -> Option<chrono::DateTime<Utc>> {
        *self.last_completed_at.lock().unwrap()
    }

    pub fn token_usage(&self) -> TokenUsageSnapshot {
        self.tokens.snapshot()
    }

    pub fn run_stats(&self) -> RunStatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal every active run's cancellation token. Used by the gateway
    /// during graceful shutdown.
    pub fn cancel_all(&self) {
        for slot in self.handles.lock().unwrap().values() {
            slot.cancel.cancel();
        }
    }

    /// Periodic trigger loop. A tick that collides with an active run is
    /// dropped, not queued.
    pub async fn run_scheduler(self: Arc<Self>, interval_seconds: u64, mut shutdown: watch::Receiver<bool>) {
        info!(interval_seconds, "coordinator scheduler started");
        let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_seconds));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.trigger_scheduled() {
                        Ok(run_id) => info!(%run_id, "scheduled run triggered"),
                        Err(CoordinatorError::Busy { .. }) => {
                            warn!("scheduled trigger collided with an active run, dropped");
                        }
                        Err(e) => error!(error = %e, "failed to trigger scheduled run"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("coordinator scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn set_stage(&self, run_id: Uuid, stage: RunStage) {
        if let Some(slot) = self.handles.lock().unwrap().get_mut(&run_id) {
            slot.handle.stage = stage;
        }
    }

    fn target_chat_for(&self, run_id: Uuid) -> Option<i64> {
        self.handles.lock().unwrap().get(&run_id).and_then(|s| s.handle.target_chat)
    }

    fn finish(&self, run_id: Uuid, stage: RunStage, fail_reason: Option<String>) {
        let mut handles = self.handles.lock().unwrap();
        if let Some(mut slot) = handles.remove(&run_id) {
            slot.handle.stage = stage;
            slot.handle.ended_at = Some(Utc::now());
            slot.handle.fail_reason = fail_reason.clone();
            drop(handles);

            *self.last_completed_at.lock().unwrap() = Some(Utc::now());
            match stage {
                RunStage::Done => self.stats.record_succeeded(),
                RunStage::Failed if fail_reason.as_deref() == Some("cancelled") => {
                    self.stats.record_cancelled()
                }
                RunStage::Failed => self.stats.record_failed(),
                _ => {}
            }
        }
    }

    async fn execute(self: Arc<Self>, run_id: Uuid, cancel: CancellationToken) {
        let now = Utc::now();
        self.set_stage(run_id, RunStage::Fetching);
        let deadline = Instant::now() + self.run_timeout;
        let ctx = FetchContext::new(cancel.clone(), deadline);

        let fan_out = self.cfg.max_fetch_parallelism.max(1);
        let fetch_results: Vec<_> = stream::iter(self.cfg.sources.iter().cloned())
            .map(|src| {
                let ctx = ctx.clone();
                let registry = Arc::clone(&self.registry);
                let store = Arc::clone(&self.store);
                let window_hours = self.cfg.time_window_hours;
                async move {
                    match registry.get(src.kind) {
                        Some(fetcher) => {
                            let watermark = store.latest_time(&src.name, src.kind).ok().flatten();
                            fetcher
                                .fetch(&ctx, &src.name, &src.params, window_hours, watermark)
                                .await
                        }
                        None => (
                            Vec::new(),
                            CrawlResult {
                                source_name: src.name.clone(),
                                kind: src.kind,
                                status: CrawlStatus::Error,
                                item_count: 0,
                                error_message: Some(format!(
                                    "no fetcher registered for kind {}",
                                    src.kind
                                )),
                            },
                        ),
                    }
                }
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;

        let mut all_items = Vec::new();
        let mut crawl_results = Vec::with_capacity(fetch_results.len());
        for (items, crawl) in fetch_results {
            all_items.extend(items);
            crawl_results.push(crawl);
        }

        if let Err(e) = self.store.insert(all_items) {
            error!(%run_id, error = %e, "store insert failed, failing run");
            self.finish(run_id, RunStage::Failed, Some(format!("store error: {e}")));
            return;
        }

        if cancel.is_cancelled() {
            self.finish(run_id, RunStage::Failed, Some("cancelled".to_string()));
            return;
        }

        self.set_stage(run_id, RunStage::Analyzing);
        let windowed = match self.store.query_window(now, self.cfg.time_window_hours) {
            Ok(v) => v,
            Err(e) => {
                error!(%run_id, error = %e, "store query failed, failing run");
                self.finish(run_id, RunStage::Failed, Some(format!("store error: {e}")));
                return;
            }
        };

        let (analysis_results, analysis_error) = if windowed.is_empty() {
            (Vec::new(), None)
        } else {
            let snapshot = self.market.get(now).await;
            let sent_summary = self
                .store
                .sent_summary(now, self.cfg.sent_cache_ttl_hours, self.cfg.sent_summary_max_chars)
                .unwrap_or_default();
            let outcome = self.analyzer.run(&snapshot.text, &sent_summary, &windowed).await;
            self.tokens.record(outcome.tokens_in, outcome.tokens_out);
            (outcome.results, outcome.error)
        };
        if let Some(reason) = &analysis_error {
            warn!(%run_id, reason, "analyzer reported a non-fatal error, report will be crawl-status-only for empty categories");
        }

        if cancel.is_cancelled() {
            self.finish(run_id, RunStage::Failed, Some("cancelled".to_string()));
            return;
        }

        self.set_stage(run_id, RunStage::Reporting);
        let mut categories_present = Vec::new();
        for r in &analysis_results {
            if !categories_present.contains(&r.category) {
                categories_present.push(r.category.clone());
            }
        }
        let report = RunReport {
            window_start: now - ChronoDuration::hours(self.cfg.time_window_hours),
            window_end: now,
            generated_at: now,
            crawl_results,
            analysis_results: analysis_results.clone(),
            categories_present,
        };
        let segments = self.reporter.render(&report, self.escape_rules.as_ref(), self.cfg.max_message_chars);

        self.set_stage(run_id, RunStage::Sending);
        let target_chat = self.target_chat_for(run_id).unwrap_or(self.cfg.broadcast_chat_id);

        let mut sent_count = 0usize;
        for segment in &segments {
            match self.messenger.send(target_chat, segment).await {
                Ok(()) => sent_count += 1,
                Err(e) => {
                    warn!(%run_id, error = %e, segment_index = sent_count, "messenger send failed");
                    break;
                }
            }
        }

        if sent_count == segments.len() {
            let item_ids: Vec<String> = analysis_results.into_iter().filter_map(|r| r.item_id).collect();
            if !item_ids.is_empty() {
                if let Err(e) = self.store.mark_sent(&item_ids, Utc::now()) {
                    warn!(%run_id, error = %e, "failed to mark items sent after successful send");
                }
            }
            self.finish(run_id, RunStage::Done, None);
        } else {
            warn!(%run_id, sent = sent_count, total = segments.len(), "partial send failure, run marked failed");
            self.finish(run_id, RunStage::Failed, Some("partial send failure".to_string()));
        }
    }
}
