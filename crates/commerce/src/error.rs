//! Errors surfaced by synchronizer mutations.
//!
//! Only two failures ever reach callers: the session is missing, or the remote
//! confirmation failed and the optimistic change was rolled back. Storage
//! failures are logged and swallowed; an unavailable remote feature is handled
//! by the local fallback.

use thiserror::Error;

use crate::gateway::{FailureClass, GatewayError};

/// Error returned by synchronizer mutations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No active session. The caller should prompt sign-in; nothing changed.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The remote feature is absent.
    ///
    /// Handled internally by switching to the persisted store; public
    /// operations never return it.
    #[error("Remote feature unavailable")]
    Unavailable,

    /// Network or server fault. The optimistic change was rolled back and the
    /// operation may be retried.
    #[error("Transient failure: {0}")]
    Transient(#[source] GatewayError),
}

impl SyncError {
    /// Map a classified gateway failure to the error surfaced to callers.
    #[must_use]
    pub fn from_gateway(err: GatewayError) -> Self {
        match err.class() {
            FailureClass::NotAuthenticated => Self::NotAuthenticated,
            FailureClass::Unavailable => Self::Unavailable,
            FailureClass::Transient => Self::Transient(err),
        }
    }

    /// Whether retrying the same call could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
