use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::pacing::RateLimiter;

#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("retry limit is not positive, operation was never attempted")]
    NoAttempts,
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
    #[error("cancelled before the operation succeeded")]
    Cancelled,
}

/// Fixed-interval retry for one remote operation.
///
/// Every attempt, the first included, first waits for a slot from the shared
/// [`RateLimiter`]. A failed attempt additionally sleeps for the fixed
/// interval before the next one, so a failure costs the pacing delay twice.
#[derive(Clone)]
pub struct RetryPolicy {
    limit: i64,
    interval: Duration,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl RetryPolicy {
    pub fn new(
        limit: i64,
        interval: Duration,
        limiter: Arc<RateLimiter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            limit,
            interval,
            limiter,
            cancel,
        }
    }

    pub async fn attempt<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.limit <= 0 {
            return Err(RetryError::NoAttempts);
        }

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = self.limiter.tick() => {}
            }
            attempts += 1;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if i64::from(attempts) >= self.limit {
                return Err(RetryError::Exhausted {
                    attempts,
                    source: err,
                });
            }

            warn!(
                "{label} failed (attempt {attempts}/{}), retrying: {err}",
                self.limit
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(limit: i64, millis: u64) -> RetryPolicy {
        let period = Duration::from_millis(millis);
        RetryPolicy::new(
            limit,
            period,
            Arc::new(RateLimiter::new(period)),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let value = policy(3, 100)
            .attempt("get", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, io::Error>(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Instant::now() - start < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let value = policy(5, 10)
            .attempt("put", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(io::Error::other("busy"))
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_limit_attempts_spaced_by_interval() {
        let stamps = std::sync::Mutex::new(Vec::new());

        let err = policy(3, 10)
            .attempt("put", || async {
                stamps.lock().unwrap().push(Instant::now());
                Err::<(), _>(io::Error::other("down"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(10));
        }
    }

    #[tokio::test]
    async fn non_positive_limit_never_calls_operation() {
        for limit in [0, -1] {
            let calls = AtomicU32::new(0);
            let err = policy(limit, 1)
                .attempt("get", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, io::Error>(())
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RetryError::NoAttempts));
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_attempts() {
        let cancel = CancellationToken::new();
        let period = Duration::from_millis(50);
        let policy = RetryPolicy::new(
            10,
            period,
            Arc::new(RateLimiter::new(period)),
            cancel.clone(),
        );
        let calls = AtomicU32::new(0);

        let err = policy
            .attempt("put", || {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err::<(), _>(io::Error::other("down")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
