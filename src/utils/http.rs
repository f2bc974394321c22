//! HTTP utilities with retry logic and quota tracking
//!
//! Provides exponential backoff and a shared view of the server-reported
//! request quota.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::QuotaSnapshot;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Request quota shared by every concurrent call of one client
///
/// Cloning yields another handle to the same counter; all updates go
/// through one mutex.
#[derive(Clone, Default)]
pub struct QuotaTracker {
    state: Arc<Mutex<QuotaSnapshot>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the quota headers of one response
    pub async fn record(&self, headers: &HeaderMap) {
        let (limit, remaining, reset_at) = parse_quota_headers(headers);
        self.record_values(limit, remaining, reset_at).await;
    }

    /// Record one response's quota values
    ///
    /// Within one reset window the remaining count only decreases, so a
    /// late response from a concurrent call cannot raise it again. A
    /// response from an older window is ignored. Without any known window
    /// the latest reported count wins.
    pub async fn record_values(
        &self,
        limit: Option<u32>,
        remaining: Option<u32>,
        reset_at: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state.lock().await;
        state.requests_made += 1;

        if limit.is_some() {
            state.limit = limit;
        }

        match (reset_at, state.reset_at) {
            (Some(new), Some(current)) if new < current => {
                debug!("Ignoring quota from an older window ({} < {})", new, current);
            }
            (Some(new), Some(current)) if new == current => {
                state.remaining = min_known(state.remaining, remaining);
            }
            (Some(new), _) => {
                state.reset_at = Some(new);
                state.remaining = remaining.or(state.remaining);
            }
            (None, Some(_)) => {
                state.remaining = min_known(state.remaining, remaining);
            }
            (None, None) => {
                state.remaining = remaining.or(state.remaining);
            }
        }
    }

    pub async fn snapshot(&self) -> QuotaSnapshot {
        self.state.lock().await.clone()
    }

    /// Suspend until the quota resets if it is known to be exhausted
    ///
    /// # Arguments
    /// * `max_wait` - Upper bound on the suspension
    pub async fn wait_for_quota(&self, max_wait: Duration) {
        let (remaining, reset_at) = {
            let state = self.state.lock().await;
            (state.remaining, state.reset_at)
        };

        if remaining != Some(0) {
            return;
        }

        if let Some(reset_at) = reset_at {
            let wait = until(reset_at, Utc::now()).min(max_wait);
            if !wait.is_zero() {
                debug!("Quota exhausted, waiting {:?} for reset", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

fn min_known(current: Option<u32>, new: Option<u32>) -> Option<u32> {
    match (current, new) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn until(instant: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (instant - now).to_std().unwrap_or(Duration::ZERO)
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Extract `(limit, remaining, reset)` from rate-limit headers
pub fn parse_quota_headers(
    headers: &HeaderMap,
) -> (Option<u32>, Option<u32>, Option<DateTime<Utc>>) {
    let limit = header_number(headers, HEADER_LIMIT);
    let remaining = header_number(headers, HEADER_REMAINING);
    let reset_at = header_number::<i64>(headers, HEADER_RESET)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    (limit, remaining, reset_at)
}

/// How long to suspend after a rate-limit response
///
/// # Arguments
/// * `reset_at` - Reset time reported by the server, if any
/// * `now` - Current time
/// * `default_wait` - Used when the server gives no reset time
/// * `max_wait` - Upper bound on the wait
pub fn rate_limit_wait(
    reset_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    default_wait: Duration,
    max_wait: Duration,
) -> Duration {
    match reset_at {
        Some(reset_at) => until(reset_at, now).min(max_wait),
        None => default_wait.min(max_wait),
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier (exponential factor)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Calculate backoff duration for a given attempt
    ///
    /// # Arguments
    /// * `attempt` - The attempt number (0-indexed)
    ///
    /// # Returns
    /// Duration to wait before next retry
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        backoff.min(self.max_backoff)
    }
}

/// Execute an async function with exponential backoff retry
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Used in log messages
/// * `operation` - The async operation to retry
/// * `should_retry` - Function to determine if error is retryable
///
/// Returns the last error once retries are exhausted or the error is not
/// retryable.
pub async fn with_retry<T, E, F, Fut, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                let backoff = config.backoff_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}): {}. Retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_retry_config_backoff() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(30));
        assert_eq!(config.max_attempts(), 3);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry(
            &fast_retry(),
            "flaky",
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("status: 503".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
            |e| e.contains("503"),
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_ceiling() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &fast_retry(),
            "down",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("status: 500".to_string()) }
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &fast_retry(),
            "bad",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("parse failed".to_string()) }
            },
            |e| e.starts_with("status"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_quota_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_LIMIT, HeaderValue::from_static("5000"));
        headers.insert(HEADER_REMAINING, HeaderValue::from_static(" 4998 "));
        headers.insert(HEADER_RESET, HeaderValue::from_static("1700000000"));

        let (limit, remaining, reset) = parse_quota_headers(&headers);
        assert_eq!(limit, Some(5000));
        assert_eq!(remaining, Some(4998));
        assert_eq!(reset.map(|r| r.timestamp()), Some(1_700_000_000));

        let (limit, remaining, reset) = parse_quota_headers(&HeaderMap::new());
        assert!(limit.is_none() && remaining.is_none() && reset.is_none());
    }

    #[test]
    fn test_rate_limit_wait() {
        let now = Utc::now();
        let default = Duration::from_secs(5);
        let max = Duration::from_secs(60);

        assert_eq!(rate_limit_wait(None, now, default, max), default);
        assert_eq!(
            rate_limit_wait(Some(now + chrono::Duration::seconds(10)), now, default, max),
            Duration::from_secs(10)
        );
        assert_eq!(
            rate_limit_wait(Some(now + chrono::Duration::hours(3)), now, default, max),
            max
        );
        assert_eq!(
            rate_limit_wait(Some(now - chrono::Duration::seconds(10)), now, default, max),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn test_quota_only_decreases_within_window() {
        let tracker = QuotaTracker::new();
        let reset = Utc::now() + chrono::Duration::hours(1);

        tracker.record_values(Some(100), Some(90), Some(reset)).await;
        // A slower concurrent response reports an older, higher count
        tracker.record_values(Some(100), Some(95), Some(reset)).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.remaining, Some(90));
        assert_eq!(snapshot.limit, Some(100));
        assert_eq!(snapshot.requests_made, 2);
    }

    #[tokio::test]
    async fn test_quota_new_window_replaces_state() {
        let tracker = QuotaTracker::new();
        let first = Utc::now() + chrono::Duration::minutes(1);
        let second = first + chrono::Duration::hours(24);

        tracker.record_values(None, Some(0), Some(first)).await;
        tracker.record_values(None, Some(4999), Some(second)).await;
        tracker.record_values(None, Some(3), Some(first)).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.remaining, Some(4999));
        assert_eq!(snapshot.reset_at, Some(second));
    }

    #[tokio::test]
    async fn test_quota_without_window_takes_latest_count() {
        let tracker = QuotaTracker::new();

        tracker.record_values(Some(5000), Some(0), None).await;
        tracker.record_values(Some(5000), Some(4999), None).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.remaining, Some(4999));
        assert_eq!(snapshot.reset_at, None);
        assert_eq!(snapshot.requests_made, 2);
    }

    #[tokio::test]
    async fn test_quota_shared_between_clones() {
        let tracker = QuotaTracker::new();
        let clone = tracker.clone();
        clone.record_values(None, Some(7), None).await;
        assert_eq!(tracker.snapshot().await.remaining, Some(7));
    }

    #[tokio::test]
    async fn test_wait_for_quota_returns_when_reset_passed() {
        let tracker = QuotaTracker::new();
        tracker
            .record_values(None, Some(0), Some(Utc::now() - chrono::Duration::seconds(5)))
            .await;

        let started = std::time::Instant::now();
        tracker.wait_for_quota(Duration::from_secs(60)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_for_quota_bounded_by_max_wait() {
        let tracker = QuotaTracker::new();
        tracker
            .record_values(None, Some(0), Some(Utc::now() + chrono::Duration::hours(1)))
            .await;

        let started = std::time::Instant::now();
        tracker.wait_for_quota(Duration::from_millis(20)).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(5));
    }
}
