//! Wait-for-result polling used by [`Client::search`](crate::Client::search).
//!
//! [`poll_until`] repeats an attempt until it yields a value, the time budget
//! runs out, a non-retryable error occurs, or the caller cancels.

use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default total time budget of a search.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default delay between two attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Lower bound applied to the poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timing and cancellation settings for a search.
///
/// # Examples
/// ```
/// use mailosaur_client::SearchOptions;
/// use std::time::Duration;
///
/// let options = SearchOptions::new()
///     .with_timeout(Duration::from_secs(30))
///     .with_poll_interval(Duration::from_millis(10));
/// // the interval never drops below 100ms
/// assert_eq!(options.poll_interval(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct SearchOptions {
    timeout: Duration,
    poll_interval: Duration,
    jitter: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            jitter: Duration::ZERO,
            cancel: None,
        }
    }
}

impl SearchOptions {
    /// Options with a 10s timeout, a 1s interval and no jitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time budget across all attempts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay between attempts, clamped to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Upper bound of a random delay added to each interval.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Cancel the search once the channel holds `true`.
    ///
    /// A dropped sender never cancels.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.poll_interval;
        }
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::rng().random_range(0..=max);
        self.poll_interval + Duration::from_millis(extra)
    }
}

/// Run `attempt` until it returns `Ok(Some(_))`.
///
/// `attempt` receives the 1-based attempt number. `Ok(None)` and retryable
/// errors (see [`Error::is_retryable`]) lead to another attempt after the
/// poll interval; any other error is returned as is.
///
/// An attempt still in flight when the budget runs out is dropped, so the
/// call never outlives `timeout`.
///
/// When the budget runs out the result is [`Error::SearchTimeout`], unless
/// the last attempt failed with a retryable error, which is then returned
/// instead. Cancellation is checked before each attempt, while an attempt is
/// in flight and while sleeping, and always yields [`Error::Cancelled`].
///
/// # Examples
/// ```
/// use mailosaur_client::{poll_until, SearchOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), mailosaur_client::Error> {
/// let value = poll_until(&SearchOptions::new(), |attempt| async move {
///     Ok((attempt == 1).then_some("ready"))
/// })
/// .await?;
/// assert_eq!(value, "ready");
/// # Ok(())
/// # }
/// ```
pub async fn poll_until<T, F, Fut>(options: &SearchOptions, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut cancel = options.cancel.clone();
    let start = Instant::now();
    let deadline = start + options.timeout;
    let mut attempts = 0u32;
    let mut last_error: Option<Error> = None;

    loop {
        if is_cancelled(&cancel) {
            return Err(Error::Cancelled { attempts });
        }

        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(Error::Cancelled { attempts }),
            outcome = tokio::time::timeout_at(deadline, attempt(attempts)) => match outcome {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(attempt = attempts, "attempt still running at deadline");
                    return Err(exhausted(last_error, attempts, start.elapsed()));
                }
            },
        };

        last_error = match outcome {
            Ok(Some(value)) => {
                debug!(attempts, elapsed = ?start.elapsed(), "poll succeeded");
                return Ok(value);
            }
            Ok(None) => {
                debug!(attempt = attempts, elapsed = ?start.elapsed(), "nothing yet");
                None
            }
            Err(err) if err.is_retryable() => {
                warn!(attempt = attempts, error = %err, "retryable failure");
                Some(err)
            }
            Err(err) => return Err(err),
        };

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(exhausted(last_error, attempts, elapsed));
        }

        let delay = options.next_delay().min(options.timeout - elapsed);
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(Error::Cancelled { attempts }),
            _ = tokio::time::sleep(delay) => {}
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(exhausted(last_error, attempts, elapsed));
        }
    }
}

fn exhausted(last_error: Option<Error>, attempts: u32, elapsed: Duration) -> Error {
    match last_error {
        Some(err) => err,
        None => Error::SearchTimeout { attempts, elapsed },
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once cancellation is requested; pending forever otherwise.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel {
        let closed = rx.wait_for(|stop| *stop).await.is_err();
        if !closed {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn options(timeout_ms: u64, interval_ms: u64) -> SearchOptions {
        SearchOptions::new()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(interval_ms))
    }

    fn unavailable() -> Error {
        Error::Unavailable {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "busy".into(),
        }
    }

    #[test]
    fn defaults_and_clamping() {
        let opts = SearchOptions::default();
        assert_eq!(opts.timeout(), Duration::from_secs(10));
        assert_eq!(opts.poll_interval(), Duration::from_secs(1));
        assert_eq!(opts.jitter(), Duration::ZERO);
        assert_eq!(
            SearchOptions::new()
                .with_poll_interval(Duration::ZERO)
                .poll_interval(),
            MIN_POLL_INTERVAL
        );
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let opts = options(10_000, 1_000).with_jitter(Duration::from_millis(250));
        for _ in 0..100 {
            let delay = opts.next_delay();
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(1_250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_match_returns_without_sleeping() {
        let start = Instant::now();
        let value = poll_until(&options(10_000, 1_000), |_| async { Ok(Some(7)) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn match_on_third_poll_arrives_after_two_intervals() {
        let start = Instant::now();
        let subject = poll_until(&options(10_000, 1_000), |attempt| async move {
            Ok((attempt == 3).then_some("Welcome"))
        })
        .await
        .unwrap();
        assert_eq!(subject, "Welcome");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2_100));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until::<(), _, _>(&options(3_000, 1_000), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap_err();

        match err {
            Error::SearchTimeout { attempts, elapsed } => {
                assert_eq!(attempts, 3);
                assert!(elapsed >= Duration::from_secs(3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_is_cut_at_deadline() {
        let start = Instant::now();
        let err = poll_until::<(), _, _>(&options(1_000, 100), |_| {
            std::future::pending::<Result<Option<()>>>()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SearchTimeout { attempts: 1, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_match_after_deadline_is_a_timeout() {
        let start = Instant::now();
        let err = poll_until(&options(1_000, 100), |_| async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(Some("late"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SearchTimeout { attempts: 1, .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_after_transport_failure_returns_that_failure() {
        let err = poll_until::<(), _, _>(&options(1_000, 100), |attempt| async move {
            if attempt == 1 {
                Err(unavailable())
            } else {
                std::future::pending().await
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_shorter_than_interval_polls_once() {
        let err = poll_until::<(), _, _>(&options(500, 1_000), |_| async { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchTimeout { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until::<(), _, _>(&options(10_000, 1_000), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Authentication {
                    status: StatusCode::UNAUTHORIZED,
                    body: String::new(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_is_retried() {
        let value = poll_until(&options(10_000, 1_000), |attempt| async move {
            if attempt == 1 {
                Err(unavailable())
            } else {
                Ok(Some(attempt))
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transport_failure_surfaces_last_error() {
        let err = poll_until::<(), _, _>(&options(2_000, 1_000), |_| async {
            Err(unavailable())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_poll() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until::<(), _, _>(&options(10_000, 1_000).with_cancel(rx), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { attempts: 0 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_in_flight_attempt() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = tx.send(true);
        });
        let err = poll_until::<(), _, _>(&options(10_000, 1_000).with_cancel(rx), |_| {
            std::future::pending::<Result<Option<()>>>()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { attempts: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            let _ = tx.send(true);
        });
        let start = Instant::now();
        let err = poll_until::<(), _, _>(&options(10_000, 1_000).with_cancel(rx), |_| async {
            Ok(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { attempts: 2 }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let value = poll_until(&options(10_000, 1_000).with_cancel(rx), |attempt| async move {
            Ok((attempt == 2).then_some(()))
        })
        .await;
        assert!(value.is_ok());
    }
}
