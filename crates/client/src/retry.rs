//! Generic retry-with-backoff.
//!
//! Errors classify themselves through [`Retryable`]: a retryable error
//! consumes one attempt and waits out the [`Backoff`] delay, anything else
//! ends the loop immediately. A [`CancellationToken`] is checked before every
//! attempt and raced against every delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Two-way error classification consumed by [`retry`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `base * 2^n` after the n-th failure (zero-based), capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the `failures`-th failed attempt (zero-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2_u32.saturating_pow(failures.min(16));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Why [`retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; carries the last one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error ended the loop early.
    Fatal { attempt: u32, error: E },
    /// The token was cancelled before or between attempts.
    Cancelled,
}

/// Run `op` up to `tries` times (at least once).
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    tries: u32, backoff: Backoff, cancel: &CancellationToken, mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tries = tries.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(RetryError::Fatal { attempt, error });
        }
        if attempt >= tries {
            return Err(RetryError::Exhausted { attempts: attempt, last: error });
        }

        let delay = backoff.delay(attempt - 1);
        tracing::debug!(attempt, tries, delay_ms = delay.as_millis() as u64, %error, "attempt failed, retrying");

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    const FAST: Backoff = Backoff::Fixed(Duration::from_millis(1));

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(7), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_progression_and_cap() {
        let backoff = Backoff::Exponential { base: Duration::from_secs(1), max: Duration::from_secs(30) };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(3, FAST, &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { if attempt < 3 { Err(TestError::Transient) } else { Ok(attempt) } }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(3, FAST, &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, last: TestError::Transient })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_zero_tries_means_one() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(0, FAST, &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_fatal_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(5, FAST, &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Fatal) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal { attempt: 1, error: TestError::Fatal })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), RetryError<TestError>> = retry(3, FAST, &cancel, |_| async { Ok(()) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_retry_cancelled_during_delay() {
        let cancel = CancellationToken::new();
        let slow = Backoff::Fixed(Duration::from_secs(60));
        let trigger = cancel.clone();
        let result: Result<(), _> = retry(3, slow, &cancel, |_| {
            trigger.cancel();
            async { Err(TestError::Transient) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
