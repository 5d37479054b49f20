//! Process-wide request quota for the registry API.
//!
//! This module provides the [`RateGovernor`] struct which counts requests
//! inside a fixed window and suspends callers once the window's cap is spent,
//! so a run never trips the registry's published quota (600 requests per
//! 5 minutes).
//!
//! # Overview
//!
//! There is exactly one governor per run. It is created once, wrapped in
//! `Arc`, and handed to every caller; metadata pages, document metadata and
//! document downloads for every entity all draw from the same window.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use dumpany_core::download::RateGovernor;
//!
//! # async fn example() {
//! let governor = Arc::new(RateGovernor::new(600, Duration::from_secs(300)));
//!
//! // Proceeds immediately while the window has room
//! governor.acquire().await;
//! assert_eq!(governor.total_requests(), 1);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::constants::{
    CUMULATIVE_DELAY_WARNING_THRESHOLD, DEFAULT_QUOTA_REQUESTS, DEFAULT_QUOTA_WINDOW,
    MAX_RETRY_AFTER,
};

/// Shared request budget for one run.
///
/// `acquire` holds an async mutex for as long as it waits, so callers are
/// admitted one at a time in arrival order and the counter is never raced.
///
/// # Thread Safety
///
/// `RateGovernor` is `Send + Sync`; share it with `Arc` across spawned tasks.
#[derive(Debug)]
pub struct RateGovernor {
    /// Requests allowed per window.
    cap: u32,

    /// Window length.
    window: Duration,

    /// Minimum spacing between consecutive requests (zero disables).
    min_interval: Duration,

    /// Window bookkeeping; the lock is held across quota sleeps.
    state: Mutex<WindowState>,

    /// Server-mandated pause (Retry-After). Kept outside `state` so it can be
    /// set without waiting for a caller that is asleep inside `acquire`.
    blocked_until: StdMutex<Option<Instant>>,

    /// Requests admitted over the governor's lifetime.
    total_requests: AtomicU64,

    /// Time callers spent suspended, in milliseconds.
    cumulative_wait_ms: AtomicU64,

    /// Set once the cumulative wait warning has been emitted.
    warned: AtomicBool,
}

#[derive(Debug, Default)]
struct WindowState {
    /// `None` until the first request.
    window_start: Option<Instant>,
    count: u32,
    last_request: Option<Instant>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_REQUESTS, DEFAULT_QUOTA_WINDOW)
    }
}

impl RateGovernor {
    /// Creates a governor admitting `cap` requests per `window`.
    ///
    /// A `cap` of zero is treated as one.
    #[must_use]
    #[instrument(skip_all, fields(cap, window_secs = window.as_secs()))]
    pub fn new(cap: u32, window: Duration) -> Self {
        debug!("creating rate governor");
        Self {
            cap: cap.max(1),
            window,
            min_interval: Duration::ZERO,
            state: Mutex::new(WindowState::default()),
            blocked_until: StdMutex::new(None),
            total_requests: AtomicU64::new(0),
            cumulative_wait_ms: AtomicU64::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// Adds a minimum spacing between consecutive requests.
    #[must_use]
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Returns the per-window request cap.
    #[must_use]
    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Returns the window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns how many requests have been admitted so far.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    /// Returns the total time callers have spent suspended.
    #[must_use]
    pub fn cumulative_wait(&self) -> Duration {
        Duration::from_millis(self.cumulative_wait_ms.load(Ordering::SeqCst))
    }

    /// Waits until one more request fits in the budget, then charges it.
    ///
    /// Never fails. When the window's cap is spent the caller sleeps until
    /// the window ends; the next window then starts from zero.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();

            if let Some(until) = self.pending_block(now) {
                info!(
                    wait_secs = until.duration_since(now).as_secs(),
                    "server asked us to slow down, pausing requests"
                );
                self.wait_until(until).await;
                continue;
            }

            let window_start = match state.window_start {
                Some(start) if now.duration_since(start) < self.window => start,
                _ => {
                    state.window_start = Some(now);
                    state.count = 0;
                    now
                }
            };

            if state.count < self.cap {
                break;
            }

            let reset_at = window_start + self.window;
            info!(
                cap = self.cap,
                wait_secs = reset_at.duration_since(now).as_secs(),
                "request quota spent, waiting for the window to reset"
            );
            self.wait_until(reset_at).await;
        }

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval - elapsed;
                debug!(delay_ms = delay.as_millis(), "spacing request");
                tokio::time::sleep(delay).await;
            }
        }

        state.count += 1;
        state.last_request = Some(Instant::now());
        let total = self.total_requests.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(window_count = state.count, total, "request admitted");
    }

    /// Blocks every caller for `delay` (capped at one hour).
    ///
    /// Used when the server answers 429 with a `Retry-After` header. A later
    /// deadline wins over an earlier one.
    #[instrument(skip(self), fields(delay_ms = delay.as_millis()))]
    pub fn defer(&self, delay: Duration) {
        let delay = delay.min(MAX_RETRY_AFTER);
        let until = Instant::now() + delay;
        let mut blocked = self
            .blocked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if blocked.is_none_or(|current| current < until) {
            *blocked = Some(until);
        }
        debug!("recorded server rate limit");
    }

    /// Returns the active server pause, clearing it once expired.
    fn pending_block(&self, now: Instant) -> Option<Instant> {
        let mut blocked = self
            .blocked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *blocked {
            Some(until) if until > now => Some(until),
            Some(_) => {
                *blocked = None;
                None
            }
            None => None,
        }
    }

    async fn wait_until(&self, deadline: Instant) {
        let delay = deadline.saturating_duration_since(Instant::now());
        self.add_cumulative_wait(delay);
        tokio::time::sleep_until(deadline).await;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_wait(&self, delay: Duration) {
        let delay_ms = delay.as_millis() as u64;
        let total_ms = self.cumulative_wait_ms.fetch_add(delay_ms, Ordering::SeqCst) + delay_ms;
        let total = Duration::from_millis(total_ms);

        if total >= CUMULATIVE_DELAY_WARNING_THRESHOLD && !self.warned.swap(true, Ordering::SeqCst)
        {
            warn!(
                cumulative_wait_secs = total.as_secs(),
                "excessive rate limiting - large runs will take a while"
            );
        }
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dumpany_core::download::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) if duration > MAX_RETRY_AFTER => {
            warn!(
                delay_secs = duration.as_secs(),
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "Retry-After date exceeds maximum, capping at 1 hour"
            );
            Some(MAX_RETRY_AFTER)
        }
        Ok(duration) => Some(duration),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    // ==================== RateGovernor Tests ====================

    #[test]
    fn test_governor_default_matches_published_quota() {
        let governor = RateGovernor::default();
        assert_eq!(governor.cap(), 600);
        assert_eq!(governor.window(), Duration::from_secs(300));
        assert_eq!(governor.total_requests(), 0);
    }

    #[test]
    fn test_governor_zero_cap_treated_as_one() {
        assert_eq!(RateGovernor::new(0, Duration::from_secs(1)).cap(), 1);
    }

    #[tokio::test]
    async fn test_governor_requests_under_cap_are_immediate() {
        tokio::time::pause();

        let governor = RateGovernor::new(5, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..5 {
            governor.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_millis(10));
        assert_eq!(governor.total_requests(), 5);
    }

    #[tokio::test]
    async fn test_governor_request_over_cap_waits_for_window_reset() {
        tokio::time::pause();

        let governor = RateGovernor::new(3, Duration::from_secs(10));
        let start = Instant::now();

        for _ in 0..3 {
            governor.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));

        governor.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_millis(10_100));
        assert_eq!(governor.total_requests(), 4, "the waiting request is still counted");
        assert_eq!(governor.cumulative_wait(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_governor_extra_acquire_is_pending_until_reset() {
        tokio::time::pause();

        let governor = RateGovernor::new(2, Duration::from_secs(30));
        governor.acquire().await;
        governor.acquire().await;

        let mut third = task::spawn(governor.acquire());
        assert_pending!(third.poll());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_pending!(third.poll());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_ready!(third.poll());
        assert_eq!(governor.total_requests(), 3);
    }

    #[tokio::test]
    async fn test_governor_window_resets_after_elapsed() {
        tokio::time::pause();

        let governor = RateGovernor::new(2, Duration::from_secs(10));
        governor.acquire().await;
        governor.acquire().await;

        tokio::time::advance(Duration::from_secs(11)).await;

        let start = Instant::now();
        governor.acquire().await;
        governor.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_governor_is_shared_across_tasks() {
        tokio::time::pause();

        let governor = Arc::new(RateGovernor::new(4, Duration::from_secs(60)));
        let start = Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let governor = Arc::clone(&governor);
                tokio::spawn(async move { governor.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(governor.total_requests(), 6);
        assert!(
            start.elapsed() >= Duration::from_secs(60),
            "two of six requests must land in the second window"
        );
    }

    #[tokio::test]
    async fn test_governor_min_interval_spaces_requests() {
        tokio::time::pause();

        let governor = RateGovernor::new(100, Duration::from_secs(300))
            .with_min_interval(Duration::from_millis(500));
        let start = Instant::now();

        governor.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        governor.acquire().await;
        governor.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test]
    async fn test_governor_defer_blocks_next_acquire() {
        tokio::time::pause();

        let governor = RateGovernor::new(100, Duration::from_secs(300));
        governor.acquire().await;

        governor.defer(Duration::from_secs(5));
        let start = Instant::now();
        governor.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_millis(5100));
    }

    #[tokio::test]
    async fn test_governor_defer_keeps_later_deadline() {
        tokio::time::pause();

        let governor = RateGovernor::new(100, Duration::from_secs(300));
        governor.defer(Duration::from_secs(8));
        governor.defer(Duration::from_secs(2));

        let start = Instant::now();
        governor.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_governor_defer_is_capped() {
        tokio::time::pause();

        let governor = RateGovernor::new(100, Duration::from_secs(300));
        governor.defer(Duration::from_secs(10_000));

        let start = Instant::now();
        governor.acquire().await;
        assert!(start.elapsed() >= MAX_RETRY_AFTER);
        assert!(start.elapsed() < MAX_RETRY_AFTER + Duration::from_secs(1));
    }

    // ==================== parse_retry_after Tests ====================

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("  120  "), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("invalid"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("7200"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_parse_retry_after_http_date_past() {
        let past_date = "Wed, 01 Jan 2020 00:00:00 GMT";
        assert_eq!(parse_retry_after(past_date), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_retry_after_http_date_future() {
        let future_time = std::time::SystemTime::now() + Duration::from_secs(60);
        let future_date = httpdate::fmt_http_date(future_time);

        let duration = parse_retry_after(&future_date).unwrap();
        assert!(
            duration >= Duration::from_secs(55) && duration <= Duration::from_secs(65),
            "Duration should be ~60s, got {duration:?}"
        );
    }
}
