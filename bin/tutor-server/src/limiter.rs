//! Fixed-window request limiter keyed by client.
//!
//! Each client key owns a counter and the instant its window opened.  A
//! request more than one window after that instant starts a fresh window.
//! Within a window the first `max_requests` requests pass and the rest are
//! rejected with the seconds remaining until the window closes.
//!
//! The table lives in this process only.  Several server processes behind one
//! load balancer each enforce their own limit, so a client can get
//! `max_requests × processes` requests through per window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_start: Instant,
}

impl RateLimitRecord {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `key` at the current instant.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Count a request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut records = self.lock();

        let Some(record) = records.get_mut(key) else {
            records.insert(key.to_owned(), RateLimitRecord::fresh(now));
            return Decision::Allow;
        };

        if now.saturating_duration_since(record.window_start) > self.window {
            *record = RateLimitRecord::fresh(now);
            return Decision::Allow;
        }

        if record.count >= self.max_requests {
            let remaining = (record.window_start + self.window).saturating_duration_since(now);
            return Decision::Reject {
                retry_after_secs: ceil_secs(remaining),
            };
        }

        record.count += 1;
        Decision::Allow
    }

    /// Drop every record whose window closed before `now`.
    ///
    /// Returns the number of records removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, r| now.saturating_duration_since(r.window_start) <= self.window);
        before - records.len()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Number of tracked client keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Run [`Self::sweep`] once per window until the returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let period = limiter.window;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(removed, remaining = limiter.len(), "rate-limit sweep");
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        // Plain counters: still usable after a poisoning panic.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds left, rounded up, never zero.
fn ceil_secs(remaining: Duration) -> u64 {
    let millis = remaining.as_millis();
    (millis.div_ceil(1000) as u64).max(1)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    const W: Duration = Duration::from_secs(60);

    #[test]
    fn first_n_allowed_then_rejected() {
        let limiter = RateLimiter::new(W, 30);
        let t0 = Instant::now();
        for i in 0..30 {
            let at = t0 + Duration::from_millis(i * 100);
            assert_eq!(limiter.check_at("1.2.3.4", at), Decision::Allow, "request {i}");
        }
        match limiter.check_at("1.2.3.4", t0 + Duration::from_secs(10)) {
            Decision::Reject { retry_after_secs } => assert_eq!(retry_after_secs, 50),
            Decision::Allow => panic!("31st request should be rejected"),
        }
    }

    #[test]
    fn retry_after_rounds_up() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        limiter.check_at("k", t0);
        let decision = limiter.check_at("k", t0 + Duration::from_millis(59_001));
        assert_eq!(decision, Decision::Reject { retry_after_secs: 1 });
        let decision = limiter.check_at("k", t0 + Duration::from_millis(100));
        assert_eq!(decision, Decision::Reject { retry_after_secs: 60 });
    }

    #[test]
    fn retry_after_is_never_zero_at_window_edge() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        limiter.check_at("k", t0);
        // Exactly one window later is still inside it (strictly greater resets).
        assert_eq!(
            limiter.check_at("k", t0 + W),
            Decision::Reject { retry_after_secs: 1 }
        );
    }

    #[test]
    fn window_elapse_resets_counter() {
        let limiter = RateLimiter::new(W, 2);
        let t0 = Instant::now();
        assert_eq!(limiter.check_at("k", t0), Decision::Allow);
        assert_eq!(limiter.check_at("k", t0), Decision::Allow);
        assert!(matches!(limiter.check_at("k", t0), Decision::Reject { .. }));

        let later = t0 + W + Duration::from_millis(1);
        assert_eq!(limiter.check_at("k", later), Decision::Allow);
        assert_eq!(limiter.check_at("k", later), Decision::Allow);
        assert!(matches!(limiter.check_at("k", later), Decision::Reject { .. }));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        assert_eq!(limiter.check_at("a", t0), Decision::Allow);
        assert!(matches!(limiter.check_at("a", t0), Decision::Reject { .. }));
        assert_eq!(limiter.check_at("b", t0), Decision::Allow);
    }

    #[test]
    fn sweep_removes_only_expired_records() {
        let limiter = RateLimiter::new(W, 5);
        let t0 = Instant::now();
        limiter.check_at("old", t0);
        limiter.check_at("new", t0 + Duration::from_secs(30));
        assert_eq!(limiter.len(), 2);

        let removed = limiter.sweep_at(t0 + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
        // The surviving record keeps its count.
        for _ in 0..4 {
            assert_eq!(limiter.check_at("new", t0 + Duration::from_secs(62)), Decision::Allow);
        }
        assert!(matches!(
            limiter.check_at("new", t0 + Duration::from_secs(62)),
            Decision::Reject { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_every_window() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50), 5));
        limiter.check_at("k", Instant::now() - Duration::from_secs(1));
        let handle = limiter.spawn_sweeper();
        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(limiter.len(), 0);
        handle.abort();
    }

    proptest! {
        #[test]
        fn burst_of_n_then_reject(n in 1u32..64, offsets in prop::collection::vec(0u64..59_000, 1..80)) {
            let limiter = RateLimiter::new(W, n);
            let t0 = Instant::now();
            let mut sorted = offsets.clone();
            sorted.sort_unstable();
            let mut allowed = 0u32;
            for (i, ms) in sorted.iter().enumerate() {
                let decision = limiter.check_at("k", t0 + Duration::from_millis(*ms));
                if (i as u32) < n {
                    prop_assert_eq!(decision, Decision::Allow);
                    allowed += 1;
                } else {
                    match decision {
                        Decision::Reject { retry_after_secs } => prop_assert!(retry_after_secs > 0),
                        Decision::Allow => prop_assert!(false, "request {} past the limit was allowed", i),
                    }
                }
            }
            prop_assert_eq!(allowed, n.min(sorted.len() as u32));
        }
    }
}
