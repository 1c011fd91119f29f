//! Synchronization status enums.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a synchronized collection.
///
/// `Uninitialized -> Loading -> Ready`. `Ready` is re-entered after every
/// successful or degraded load; a failed load leaves the phase where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Whether the remote commerce feature is usable for an entity kind.
///
/// Moves only from `RemoteActive` to `LocalOnly` within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// The remote gateway is used for every operation.
    #[default]
    RemoteActive,
    /// The remote feature was observed to be absent; the persisted store is
    /// the only source of truth.
    LocalOnly,
}

impl Availability {
    /// Whether the remote gateway should be called.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::RemoteActive)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteActive => write!(f, "remote_active"),
            Self::LocalOnly => write!(f, "local_only"),
        }
    }
}
