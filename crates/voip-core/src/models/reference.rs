//! Foreign references attached to a CDR
//!
//! Queue and agent references are enrichment: a lookup that finds nothing
//! yields [`Resolution::NotFound`] and the CDR is stored without it. The
//! recording reference is data and is always resolved to a row id once a
//! path was supplied.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a best-effort reference lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The referenced row exists
    Resolved(i64),
    /// No row matched; the reference stays null
    NotFound,
}

impl Resolution {
    /// Build a resolution from an optional lookup result
    pub fn from_lookup(id: Option<i64>) -> Self {
        id.map_or(Self::NotFound, Self::Resolved)
    }

    /// The resolved id, if any
    pub fn id(self) -> Option<i64> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::NotFound => None,
        }
    }

    /// Whether the lookup matched a row
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Foreign keys resolved for one CDR inside its transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRefs {
    pub queue_id: Option<i64>,
    pub agent_user_id: Option<i64>,
    pub recording_id: Option<i64>,
}

/// Where a recording file lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingBackend {
    /// Filesystem of the switch host
    #[default]
    Local,
}

impl RecordingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingBackend::Local => "local",
        }
    }
}

impl fmt::Display for RecordingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_from_lookup() {
        assert_eq!(Resolution::from_lookup(Some(7)), Resolution::Resolved(7));
        assert_eq!(Resolution::from_lookup(None), Resolution::NotFound);
    }

    #[test]
    fn test_resolution_id() {
        assert_eq!(Resolution::Resolved(42).id(), Some(42));
        assert_eq!(Resolution::NotFound.id(), None);
        assert!(Resolution::Resolved(1).is_resolved());
        assert!(!Resolution::NotFound.is_resolved());
    }

    #[test]
    fn test_recording_backend_str() {
        assert_eq!(RecordingBackend::Local.as_str(), "local");
        assert_eq!(RecordingBackend::default().to_string(), "local");
    }
}
