use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative run counters for this process, supplementing `/status`'s
/// picture of active runs with a session-lifetime rollup.
#[derive(Default)]
pub struct RunStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunStatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl RunStats {
    pub fn record_started(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Cumulative LLM token usage for this process session, backing `/tokens`.
#[derive(Default)]
pub struct TokenCounters {
    tokens_in: AtomicU64,
    tokens_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsageSnapshot {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl TokenCounters {
    pub fn record(&self, tokens_in: u32, tokens_out: u32) {
        self.tokens_in.fetch_add(tokens_in as u64, Ordering::Relaxed);
        self.tokens_out.fetch_add(tokens_out as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TokenUsageSnapshot {
        TokenUsageSnapshot {
            tokens_in: self.tokens_in.load(Ordering::Relaxed),
            tokens_out: self.tokens_out.load(Ordering::Relaxed),
        }
    }
}
