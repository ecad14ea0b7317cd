use serde::{Deserialize, Serialize};

use chartfresh_config::{FreshnessPolicy, RefreshMethod, SourceDescriptor, SourceKind};

/// Whether and how a chart can be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCapability {
    pub can_refresh: bool,
    pub reason: String,
    pub estimated_duration_ms: u64,
    pub requires_auth: bool,
}

impl RefreshCapability {
    fn denied(reason: impl Into<String>) -> Self {
        Self {
            can_refresh: false,
            reason: reason.into(),
            estimated_duration_ms: 0,
            requires_auth: false,
        }
    }
}

const STATIC_REASON: &str = "Static data source cannot be refreshed";

/// Derive the refresh capability of a source under a policy.
pub fn refresh_capability(source: &SourceDescriptor, policy: &FreshnessPolicy) -> RefreshCapability {
    if source.kind == SourceKind::Static {
        return RefreshCapability::denied(STATIC_REASON);
    }
    if source.refresh_method == RefreshMethod::None {
        return RefreshCapability::denied(format!(
            "No refresh method configured for {} source '{}'",
            source.kind, source.location
        ));
    }
    if !policy.manual_refresh_allowed {
        return RefreshCapability::denied("Refresh is disabled by the freshness policy");
    }

    match source.kind {
        SourceKind::ManualFile => RefreshCapability {
            can_refresh: true,
            reason: format!("Re-read local file '{}'", source.location),
            estimated_duration_ms: 500,
            requires_auth: false,
        },
        SourceKind::ApiService => match &source.service_name {
            Some(service) => RefreshCapability {
                can_refresh: true,
                reason: format!("Fetch from API service '{}'", service),
                estimated_duration_ms: 5_000,
                requires_auth: true,
            },
            None => RefreshCapability::denied("API source has no service name"),
        },
        SourceKind::Hybrid => RefreshCapability {
            can_refresh: true,
            reason: format!(
                "Fetch from API with fallback to local file '{}'",
                source.location
            ),
            estimated_duration_ms: 3_000,
            requires_auth: source.service_name.is_some(),
        },
        SourceKind::Static => RefreshCapability::denied(STATIC_REASON),
    }
}
