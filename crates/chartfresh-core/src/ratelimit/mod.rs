//! Admission control: per-source sliding-window ceilings and the global
//! bounded-concurrency refresh queue.

pub mod queue;
pub mod window;

pub use queue::{Admission, Priority, RefreshQueue};
pub use window::{HOUR_WINDOW, MINUTE_WINDOW, RateLimit, RateLimiter, RateWindow};
