//! Pure freshness classification.
//!
//! No I/O and no hidden clock: every function takes `now` explicitly.

use chrono::{DateTime, Utc};

use crate::freshness::status::{DataSourceStatus, DataState, FreshnessStatus};
use chartfresh_config::FreshnessPolicy;

/// Hours elapsed between `last_updated_at` and `now`. Future timestamps
/// count as zero age.
pub fn age_hours(last_updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now
        .signed_duration_since(last_updated_at)
        .num_milliseconds()
        .max(0);
    millis as f64 / 3_600_000.0
}

/// Classify data age against a policy.
///
/// - no timestamp: `missing`
/// - `age <= warning`: `available`
/// - `warning < age <= error`: `stale`
/// - `age > error`: `error`
pub fn classify(
    last_updated_at: Option<DateTime<Utc>>,
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> FreshnessStatus {
    let Some(last) = last_updated_at else {
        return FreshnessStatus::Missing;
    };

    let age = age_hours(last, now);
    if age <= policy.warning_age_hours {
        FreshnessStatus::Available
    } else if age <= policy.error_age_hours {
        FreshnessStatus::Stale
    } else {
        FreshnessStatus::Error
    }
}

/// Re-age a state. `Failed` and `Missing` are left untouched.
pub fn evaluate_state(
    state: &DataState,
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> DataState {
    match state {
        DataState::Available { since }
        | DataState::Stale { since }
        | DataState::Expired { since } => match classify(Some(*since), policy, now) {
            FreshnessStatus::Available => DataState::Available { since: *since },
            FreshnessStatus::Stale => DataState::Stale { since: *since },
            FreshnessStatus::Error | FreshnessStatus::Missing => {
                DataState::Expired { since: *since }
            }
        },
        DataState::Failed { .. } | DataState::Missing => state.clone(),
    }
}

/// Recompute the derived fields of `status` in place.
///
/// Returns the `(before, after)` classification when it changed.
pub fn reevaluate(
    status: &mut DataSourceStatus,
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> Option<(FreshnessStatus, FreshnessStatus)> {
    let before = status.status();
    status.state = evaluate_state(&status.state, policy, now);
    status.age_hours = status.last_updated_at().map(|at| age_hours(at, now));
    let after = status.status();
    (before != after).then_some((before, after))
}
