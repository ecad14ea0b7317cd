//! Built-in fallback values.

pub const MAX_CONCURRENT_REFRESH: usize = 3;
pub const SWEEP_INTERVAL_SECS: u64 = 300;
pub const FETCH_TIMEOUT_SECS: u64 = 30;
pub const POLL_INTERVAL_MS: u64 = 5_000;
pub const DEBOUNCE_MS: u64 = 1_000;

pub const WARNING_AGE_HOURS: f64 = 24.0;
pub const ERROR_AGE_HOURS: f64 = 48.0;

pub fn manual_refresh_allowed() -> bool {
    true
}

pub fn max_retries() -> u32 {
    3
}

/// Upper bound for every configured interval, timeout, and debounce.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
