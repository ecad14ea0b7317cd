//! Sliding-window request ceilings per source.
//!
//! Each source keeps two windows of admission timestamps (one minute, one
//! hour). Windows are pruned lazily whenever a source is checked.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use chartfresh_config::ServiceConfig;

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const HOUR_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Request ceilings for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl From<&ServiceConfig> for RateLimit {
    fn from(service: &ServiceConfig) -> Self {
        Self {
            per_minute: service.per_minute,
            per_hour: service.per_hour,
        }
    }
}

#[derive(Debug, Default)]
pub struct RateWindow {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        prune_window(&mut self.minute, MINUTE_WINDOW, now);
        prune_window(&mut self.hour, HOUR_WINDOW, now);
    }

    fn can_admit(&mut self, limit: RateLimit, now: Instant) -> bool {
        self.prune(now);
        self.minute.len() < limit.per_minute as usize && self.hour.len() < limit.per_hour as usize
    }

    fn record(&mut self, now: Instant) {
        self.prune(now);
        self.minute.push_back(now);
        self.hour.push_back(now);
    }

    fn next_available_in(&mut self, limit: RateLimit, now: Instant) -> Duration {
        self.prune(now);
        let minute_wait = wait_for_slot(&self.minute, limit.per_minute, MINUTE_WINDOW, now);
        let hour_wait = wait_for_slot(&self.hour, limit.per_hour, HOUR_WINDOW, now);
        minute_wait.max(hour_wait)
    }

    pub fn minute_count(&self) -> usize {
        self.minute.len()
    }

    pub fn hour_count(&self) -> usize {
        self.hour.len()
    }
}

fn prune_window(window: &mut VecDeque<Instant>, size: Duration, now: Instant) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= size {
            window.pop_front();
        } else {
            break;
        }
    }
}

/// Time until the window drops below `limit` entries.
fn wait_for_slot(window: &VecDeque<Instant>, limit: u32, size: Duration, now: Instant) -> Duration {
    let limit = limit as usize;
    if window.len() < limit {
        return Duration::ZERO;
    }
    // The slot frees when the entry that pushes the count over the limit ages out.
    let blocking = window.len() - limit;
    window
        .get(blocking)
        .map(|&ts| (ts + size).saturating_duration_since(now))
        .unwrap_or(Duration::ZERO)
}

/// Per-source sliding-window admission control.
///
/// Sources with no configured ceiling are unlimited; callers that need to
/// reject unknown sources check [`RateLimiter::has_limit`] first.
#[derive(Debug, Default)]
pub struct RateLimiter {
    limits: HashMap<String, RateLimit>,
    windows: HashMap<String, RateWindow>,
}

impl RateLimiter {
    pub fn new(limits: HashMap<String, RateLimit>) -> Self {
        Self {
            limits,
            windows: HashMap::new(),
        }
    }

    pub fn from_services(services: &BTreeMap<String, ServiceConfig>) -> Self {
        Self::new(
            services
                .iter()
                .map(|(name, service)| (name.clone(), RateLimit::from(service)))
                .collect(),
        )
    }

    pub fn has_limit(&self, source: &str) -> bool {
        self.limits.contains_key(source)
    }

    pub fn limit(&self, source: &str) -> Option<RateLimit> {
        self.limits.get(source).copied()
    }

    pub fn can_admit(&mut self, source: &str) -> bool {
        self.can_admit_at(source, Instant::now())
    }

    pub fn can_admit_at(&mut self, source: &str, now: Instant) -> bool {
        let Some(limit) = self.limits.get(source).copied() else {
            return true;
        };
        self.windows
            .entry(source.to_string())
            .or_default()
            .can_admit(limit, now)
    }

    pub fn record_admission(&mut self, source: &str) {
        self.record_admission_at(source, Instant::now());
    }

    pub fn record_admission_at(&mut self, source: &str, now: Instant) {
        if !self.limits.contains_key(source) {
            return;
        }
        let window = self.windows.entry(source.to_string()).or_default();
        window.record(now);
        debug!(
            event = "core.ratelimit.admission_recorded",
            source = source,
            minute_count = window.minute_count(),
            hour_count = window.hour_count(),
        );
    }

    /// Zero when a request would be admitted now, otherwise the wait until
    /// the oldest blocking timestamp leaves its window.
    pub fn next_available_in(&mut self, source: &str) -> Duration {
        self.next_available_in_at(source, Instant::now())
    }

    pub fn next_available_in_at(&mut self, source: &str, now: Instant) -> Duration {
        let Some(limit) = self.limits.get(source).copied() else {
            return Duration::ZERO;
        };
        self.windows
            .entry(source.to_string())
            .or_default()
            .next_available_in(limit, now)
    }

    pub fn window(&self, source: &str) -> Option<&RateWindow> {
        self.windows.get(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, per_hour: u32) -> RateLimiter {
        let mut limits = HashMap::new();
        limits.insert(
            "svcA".to_string(),
            RateLimit {
                per_minute,
                per_hour,
            },
        );
        RateLimiter::new(limits)
    }

    fn admit(limiter: &mut RateLimiter, now: Instant) -> bool {
        if limiter.can_admit_at("svcA", now) {
            limiter.record_admission_at("svcA", now);
            true
        } else {
            false
        }
    }

    #[test]
    fn test_per_minute_ceiling() {
        let mut limiter = limiter(3, 100);
        let start = Instant::now();

        let admitted: Vec<bool> = (0..4)
            .map(|i| admit(&mut limiter, start + Duration::from_millis(i * 200)))
            .collect();
        assert_eq!(admitted, vec![true, true, true, false]);

        // Window slides once the first admission is 60s old.
        assert!(admit(&mut limiter, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_next_available_in() {
        let mut limiter = limiter(2, 100);
        let start = Instant::now();
        assert_eq!(limiter.next_available_in_at("svcA", start), Duration::ZERO);

        admit(&mut limiter, start);
        admit(&mut limiter, start + Duration::from_secs(10));

        let wait = limiter.next_available_in_at("svcA", start + Duration::from_secs(20));
        assert_eq!(wait, Duration::from_secs(40));
    }

    #[test]
    fn test_hour_ceiling_blocks_after_minute_clears() {
        let mut limiter = limiter(2, 3);
        let start = Instant::now();

        assert!(admit(&mut limiter, start));
        assert!(admit(&mut limiter, start));
        assert!(!admit(&mut limiter, start));

        let later = start + Duration::from_secs(61);
        assert!(admit(&mut limiter, later));
        assert!(!admit(&mut limiter, later + Duration::from_secs(61)));

        let wait = limiter.next_available_in_at("svcA", later + Duration::from_secs(61));
        assert_eq!(wait, HOUR_WINDOW - Duration::from_secs(122));
    }

    #[test]
    fn test_unknown_source_is_unlimited() {
        let mut limiter = limiter(1, 1);
        assert!(!limiter.has_limit("other"));
        for _ in 0..10 {
            assert!(limiter.can_admit("other"));
            limiter.record_admission("other");
        }
        assert!(limiter.window("other").is_none());
        assert_eq!(limiter.next_available_in("other"), Duration::ZERO);
    }

    #[test]
    fn test_window_counts_never_exceed_ceiling() {
        let mut limiter = limiter(5, 20);
        let start = Instant::now();
        for i in 0..200u64 {
            admit(&mut limiter, start + Duration::from_secs(i * 7));
            let window = limiter.window("svcA").unwrap();
            assert!(window.minute_count() <= 5);
            assert!(window.hour_count() <= 20);
        }
    }
}
