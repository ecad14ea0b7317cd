//! Freshness evaluation: status types, age classification, and refresh
//! capability derivation.

pub mod capability;
pub mod evaluator;
pub mod status;

pub use capability::{RefreshCapability, refresh_capability};
pub use evaluator::{age_hours, classify, evaluate_state, reevaluate};
pub use status::{DataSourceStatus, DataState, FreshnessStatus, LastUpdateSource};
