//! Refresh orchestration: the dependency registry, the engine, and the
//! background sweep.

pub mod engine;
pub mod registry;
pub mod sweep;
pub mod types;

pub use engine::{RefreshEngine, RefreshEngineBuilder, RefreshSubscription};
pub use registry::{DependencyEntry, DependencyRegistry};
pub use sweep::{StatusTransition, SweepReport};
pub use types::{
    RefreshError, RefreshErrorCode, RefreshNotification, RefreshRequest, RefreshResult,
};
