//! Catalog item identifiers.
//!
//! The commerce backend hands out opaque string identifiers for catalog items.
//! Nothing at this layer interprets them; they are only compared, hashed and
//! sent back to the backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a catalog item.
///
/// This is the only identity concept the cart and wishlist know about. Two
/// records refer to the same product exactly when their `ProductId`s are equal.
///
/// # Example
///
/// ```rust
/// # use atelier_core::ProductId;
/// let id = ProductId::new("sku-1042");
/// assert_eq!(id.as_str(), "sku-1042");
/// assert_eq!(id.to_string(), "sku-1042");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a new ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether the identifier is empty (never valid on the wire).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
