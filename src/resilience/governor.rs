//! Fixed-interval admission gate for upstream calls.
//!
//! Commercial literature APIs enforce strict quotas (Scopus roughly one
//! call every 1-2 seconds), so the governor deliberately uses a fixed
//! minimum inter-call interval rather than a token bucket with burst
//! allowance. It never rejects a call, it only delays it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-provider admission gate.
///
/// One instance is shared by all concurrent callers of a provider; it is
/// the single point of quota truth. Admission reserves the next dispatch
/// slot inside one critical section and sleeps outside the lock, so
/// concurrent callers are serialized at the gate without serializing their
/// actual I/O. A reserved slot is consumed even if the caller is cancelled
/// before completing, which keeps the quota conservative.
#[derive(Debug)]
pub struct RateGovernor {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateGovernor {
    /// Build a governor for `calls_per_second`. A non-positive rate
    /// disables throttling entirely.
    pub fn new(calls_per_second: f64) -> Self {
        let min_interval = if calls_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self::with_interval(min_interval)
    }

    /// Build a governor with an explicit minimum inter-call interval.
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// The enforced minimum spacing between dispatches.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may dispatch an upstream call.
    ///
    /// Guarantees that any two admitted dispatches are separated by at
    /// least `min_interval` of wall-clock time, for any number of
    /// concurrent callers.
    pub async fn admit(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_spacing() {
        let governor = RateGovernor::with_interval(Duration::from_secs(1));
        let start = Instant::now();

        for _ in 0..4 {
            governor.admit().await;
        }

        // First call is immediate, the next three are spaced 1s apart
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let governor = Arc::new(RateGovernor::with_interval(Duration::from_secs(1)));
        let dispatch_times = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let governor = governor.clone();
            let dispatch_times = dispatch_times.clone();
            tasks.spawn(async move {
                governor.admit().await;
                dispatch_times.lock().unwrap().push(Instant::now());
            });
        }
        let start = Instant::now();
        while tasks.join_next().await.is_some() {}

        // 10 admissions at 1s interval take at least 9s in total
        assert!(start.elapsed() >= Duration::from_secs(9));

        let mut times = dispatch_times.lock().unwrap().clone();
        times.sort();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_does_not_throttle() {
        let governor = RateGovernor::new(0.0);
        let start = Instant::now();
        for _ in 0..100 {
            governor.admit().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_governor_admits_immediately() {
        let governor = RateGovernor::with_interval(Duration::from_secs(2));
        governor.admit().await;

        // After the interval has fully elapsed, admission costs nothing
        tokio::time::sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        governor.admit().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
