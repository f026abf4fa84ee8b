use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SourceError};

/// Per-run fetch context threaded through every `Fetcher::fetch` call.
///
/// Carries cancellation (propagated from the Coordinator on run abort or
/// shutdown) and a hard wall-clock deadline each fetcher must respect.
#[derive(Clone)]
pub struct FetchContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl FetchContext {
    pub fn new(cancel: CancellationToken, deadline: Instant) -> Self {
        Self { cancel, deadline }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn time_remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns an error if the context has already been cancelled or its
    /// deadline has already elapsed. Call before starting expensive work.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(SourceError::DeadlineExceeded);
        }
        Ok(())
    }
}
