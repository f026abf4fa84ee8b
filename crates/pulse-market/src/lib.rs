use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulse_core::types::{MarketSnapshot, SnapshotOrigin};
use pulse_llm::LlmClient;
use tracing::warn;

const MARKET_SUMMARY_SYSTEM_PROMPT: &str = "You are a crypto-market analyst. \
Summarize the current state of crypto markets (majors, dominant narratives, \
notable volatility) in 2-4 sentences of plain text. No markdown, no preamble.";

/// Caches a market-context snapshot with a TTL.
pub struct MarketSnapshotProvider {
    llm: Box<dyn LlmClient>,
    model: String,
    ttl: chrono::Duration,
    timeout: Duration,
    cached: Mutex<Option<MarketSnapshot>>,
}

impl MarketSnapshotProvider {
    pub fn new(llm: Box<dyn LlmClient>, model: String, ttl_minutes: i64, timeout_seconds: u64) -> Self {
        Self {
            llm,
            model,
            ttl: chrono::Duration::minutes(ttl_minutes),
            timeout: Duration::from_secs(timeout_seconds),
            cached: Mutex::new(None),
        }
    }

    /// Step 1: return a fresh cached snapshot. Step 2: on miss, call the
    /// LLM and cache on success. Step 3: any failure or timeout yields an
    /// invalid fallback snapshot rather than failing the run.
    pub async fn get(&self, now: DateTime<Utc>) -> MarketSnapshot {
        if let Some(hit) = self.cached_if_fresh(now) {
            return hit;
        }

        let completion = tokio::time::timeout(
            self.timeout,
            self.llm.complete(&self.model, MARKET_SUMMARY_SYSTEM_PROMPT, "Summarize current crypto market conditions.", None),
        )
        .await;

        match completion {
            Ok(Ok(text)) => {
                let snapshot = MarketSnapshot {
                    text,
                    fetched_at: now,
                    origin: SnapshotOrigin::Live,
                    valid: true,
                };
                *self.cached.lock().unwrap() = Some(snapshot.clone());
                snapshot
            }
            Ok(Err(e)) => {
                warn!(error = %e, "market snapshot fetch failed");
                fallback()
            }
            Err(_) => {
                warn!("market snapshot fetch timed out");
                fallback()
            }
        }
    }

    fn cached_if_fresh(&self, now: DateTime<Utc>) -> Option<MarketSnapshot> {
        let guard = self.cached.lock().unwrap();
        let snapshot = guard.as_ref()?;
        if now - snapshot.fetched_at < self.ttl {
            Some(MarketSnapshot {
                origin: SnapshotOrigin::Cached,
                ..snapshot.clone()
            })
        } else {
            None
        }
    }
}

fn fallback() -> MarketSnapshot {
    MarketSnapshot {
        text: String::new(),
        fetched_at: Utc::now(),
        origin: SnapshotOrigin::Fallback,
        valid: false,
    }
}
