use std::time::Duration;

use tracing::warn;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const RATE_LIMIT_MULTIPLIER: u32 = 4;

/// Outcome an attempt reports back to `with_backoff`, distinguishing a
/// plain transient failure from a rate-limit response that may carry its
/// own retry-after hint.
pub enum AttemptError<E> {
    Transient(E),
    RateLimited { retry_after: Option<Duration>, source: E },
}

/// Retry `attempt` with exponential backoff (base 1s, factor 2, cap 30s,
/// max 3 attempts). A `RateLimited` failure honors its `retry_after` hint
/// when present, otherwise multiplies the current delay by 4.
pub async fn with_backoff<T, E, F, Fut>(label: &str, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AttemptError<E>>>,
{
    let mut delay = BASE_DELAY;

    for try_num in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Transient(e)) if try_num == MAX_ATTEMPTS => return Err(e),
            Err(AttemptError::RateLimited { source, .. }) if try_num == MAX_ATTEMPTS => {
                return Err(source)
            }
            Err(AttemptError::Transient(_)) => {
                warn!(label, try_num, delay_ms = delay.as_millis(), "retrying after transient error");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(AttemptError::RateLimited { retry_after, .. }) => {
                let wait = retry_after.unwrap_or(delay * RATE_LIMIT_MULTIPLIER).min(MAX_DELAY * RATE_LIMIT_MULTIPLIER);
                warn!(label, try_num, wait_ms = wait.as_millis(), "rate limited, backing off");
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    unreachable!("backoff loop exited without returning")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff("test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AttemptError::Transient("boom"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::Transient("boom"))
        })
        .await;
        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
