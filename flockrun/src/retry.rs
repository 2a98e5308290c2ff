//! Retry policy with randomized inter-attempt pauses.
//!
//! One policy instance is built from configuration at startup and shared by
//! every pipeline; it holds no per-call state.

use crate::cancellation::CancellationToken;
use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Wraps a fallible async operation with bounded attempts and random pacing.
///
/// The operation is tried up to `attempts` times. Between attempts (never
/// after the last) the policy sleeps a uniform random duration drawn from
/// the configured pause range. On exhaustion the *last* attempt's error is
/// returned unchanged; callers treat it as a soft failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from configuration. Zero attempts is normalized to one.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let config = config.with_attempts(config.attempts);
        Self { config }
    }

    /// Returns the configured attempt bound.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.config.attempts
    }

    /// Runs `op` until it succeeds or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number for logging. Cancellation is
    /// observed between attempts and during inter-attempt sleeps: once the
    /// token fires, no further attempts are scheduled and the last error is
    /// returned immediately.
    pub async fn run<T, E, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.config.attempts;
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= attempts {
                        return Err(err);
                    }
                    if cancel.is_cancelled() {
                        debug!(attempt, error = %err, "Cancelled, not rescheduling attempt");
                        return Err(err);
                    }

                    let delay = self.sample_pause();
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after error"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return Err(err),
                    }
                    attempt += 1;
                }
            }
        }
    }

    // thread_rng handle must not live across an await point.
    fn sample_pause(&self) -> Duration {
        self.config.pause.sample(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PauseRange;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(attempts: usize, pause: PauseRange) -> RetryPolicy {
        RetryPolicy::new(RetryConfig::new().with_attempts(attempts).with_pause(pause))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let policy = policy(3, PauseRange::none());
        let cancel = CancellationToken::new();
        let calls = AtomicUsize::new(0);

        let result: Result<i32, String> = policy
            .run(&cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let policy = policy(5, PauseRange::none());
        let cancel = CancellationToken::new();

        let result: Result<&str, String> = policy
            .run(&cancel, |attempt| async move {
                if attempt < 3 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        // attempts=3, always fails: three invocations, last error returned.
        let policy = policy(3, PauseRange::none());
        let cancel = CancellationToken::new();
        let calls = AtomicUsize::new(0);

        let result: Result<(), String> = policy
            .run(&cancel, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err("failure 3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_never_after_last() {
        // 3 attempts means exactly 2 sleeps. With a fixed
        // 1s pause and a paused clock, total elapsed time is exactly 2s.
        let policy = policy(3, PauseRange::new(1_000, 1_000));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let result: Result<(), &str> = policy
            .run(&cancel, |_attempt| async { Err("nope") })
            .await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = policy(0, PauseRange::none());
        assert_eq!(policy.attempts(), 1);
        let cancel = CancellationToken::new();
        let calls = AtomicUsize::new(0);

        let result: Result<(), &str> = policy
            .run(&cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fail") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_rescheduling() {
        let policy = policy(5, PauseRange::new(10, 10));
        let cancel = CancellationToken::new();
        cancel.cancel("shutdown");
        let calls = AtomicUsize::new(0);

        let result: Result<(), &str> = policy
            .run(&cancel, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fail") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_during_sleep_cuts_pause_short() {
        let policy = policy(2, PauseRange::new(60_000, 60_000));
        let cancel = Arc::new(CancellationToken::new());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel("stop");
        });

        let start = std::time::Instant::now();
        let result: Result<(), &str> = policy
            .run(&cancel, |_attempt| async { Err("fail") })
            .await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_policy_is_shareable_across_tasks() {
        let policy = Arc::new(policy(2, PauseRange::none()));
        let cancel = Arc::new(CancellationToken::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let policy = policy.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                policy
                    .run(&cancel, |_attempt| async move { Ok::<usize, String>(i) })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }
}
