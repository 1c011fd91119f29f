//! Remote commerce gateway.
//!
//! The synchronizer talks to the backend through [`CommerceGateway`] and the
//! cart's [`CartGateway`] extension. Every mutating call returns the server's authoritative
//! collection, already normalized into canonical records.
//!
//! Failures are classified into three [`FailureClass`]es. The synchronizer
//! only ever looks at the class, never at the concrete error.

mod conversions;
mod http;

use core::num::NonZeroU32;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use atelier_core::{CartLine, CartLineKey, ProductId};

use crate::entity::{Cart, EntityKind};

pub use http::HttpGateway;

/// Errors that can occur when calling the commerce backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No credential, or the backend rejected it.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The backend does not offer this feature.
    #[error("Feature not available: {0}")]
    Unavailable(String),

    /// HTTP request failed.
    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status returned by the backend.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,
}

/// How the synchronizer reacts to a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Roll back and ask the caller to sign in.
    NotAuthenticated,
    /// Switch the entity kind to local-only mode.
    Unavailable,
    /// Roll back and report; retrying may succeed.
    Transient,
}

impl GatewayError {
    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::NotAuthenticated => FailureClass::NotAuthenticated,
            Self::Unavailable(_) => FailureClass::Unavailable,
            Self::Api { status, .. } => classify_status(*status),
            Self::Http(_) | Self::Parse(_) | Self::Timeout => FailureClass::Transient,
        }
    }
}

/// Map an HTTP status code to a failure class.
#[must_use]
pub const fn classify_status(status: u16) -> FailureClass {
    match status {
        401 | 403 => FailureClass::NotAuthenticated,
        404 | 501 => FailureClass::Unavailable,
        _ => FailureClass::Transient,
    }
}

/// Operations shared by every entity kind.
#[async_trait]
pub trait CommerceGateway<E: EntityKind>: Send + Sync {
    /// Fetch the full collection.
    async fn fetch_all(&self) -> Result<Vec<E::Record>, GatewayError>;

    /// Add a product, returning the resulting collection.
    async fn add(
        &self,
        id: &ProductId,
        attributes: &E::Attributes,
    ) -> Result<Vec<E::Record>, GatewayError>;

    /// Remove a record, returning the resulting collection.
    async fn remove(&self, key: &E::Key) -> Result<Vec<E::Record>, GatewayError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), GatewayError>;
}

/// Cart-only operations.
#[async_trait]
pub trait CartGateway: CommerceGateway<Cart> {
    /// Replace the quantity of a line, returning the resulting cart.
    async fn set_quantity(
        &self,
        key: &CartLineKey,
        quantity: NonZeroU32,
    ) -> Result<Vec<CartLine>, GatewayError>;
}

/// Gateways that carry a per-session credential.
///
/// The defaults do nothing, for backends that authenticate some other way.
pub trait SessionCredentials: Send + Sync {
    /// Use `token` for subsequent requests.
    fn set_credential(&self, token: SecretString) {
        let _ = token;
    }

    /// Forget the current credential.
    fn clear_credential(&self) {}
}
