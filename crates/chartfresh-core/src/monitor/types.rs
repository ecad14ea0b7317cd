use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier of a watched resource. For file-backed sources this is the
/// file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Observed state of a resource at one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub exists: bool,
    pub size: u64,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl ResourceSnapshot {
    pub fn present(size: u64, last_modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            exists: true,
            size,
            last_modified_at,
        }
    }

    pub fn absent() -> Self {
        Self {
            exists: false,
            size: 0,
            last_modified_at: None,
        }
    }

    /// `None` for a snapshot of a resource that does not exist.
    pub fn into_present(self) -> Option<Self> {
        self.exists.then_some(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Created => write!(f, "created"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Deleted => write!(f, "deleted"),
        }
    }
}

/// A settled change to a watched resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub resource_id: ResourceId,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
}

/// Classify the difference between two present-or-absent snapshots.
pub fn diff_snapshots(
    previous: Option<&ResourceSnapshot>,
    current: Option<&ResourceSnapshot>,
) -> Option<ChangeType> {
    match (previous, current) {
        (None, None) => None,
        (None, Some(_)) => Some(ChangeType::Created),
        (Some(_), None) => Some(ChangeType::Deleted),
        (Some(prev), Some(cur)) if prev != cur => Some(ChangeType::Modified),
        (Some(_), Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(size: u64) -> ResourceSnapshot {
        ResourceSnapshot::present(size, None)
    }

    #[test]
    fn test_diff_snapshots() {
        assert_eq!(diff_snapshots(None, None), None);
        assert_eq!(diff_snapshots(None, Some(&snap(1))), Some(ChangeType::Created));
        assert_eq!(diff_snapshots(Some(&snap(1)), None), Some(ChangeType::Deleted));
        assert_eq!(
            diff_snapshots(Some(&snap(1)), Some(&snap(2))),
            Some(ChangeType::Modified)
        );
        assert_eq!(diff_snapshots(Some(&snap(1)), Some(&snap(1))), None);
    }

    #[test]
    fn test_absent_snapshot_is_not_present() {
        assert!(ResourceSnapshot::absent().into_present().is_none());
        assert_eq!(snap(3).into_present(), Some(snap(3)));
    }

    #[test]
    fn test_change_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&ChangeType::Deleted).unwrap(),
            r#""deleted""#
        );
    }
}
