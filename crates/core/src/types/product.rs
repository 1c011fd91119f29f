//! Denormalized product data captured alongside cart and wishlist records.

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Product fields captured at add time for offline display.
///
/// The snapshot is display data only. It never takes part in record identity
/// and may be stale relative to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Display name.
    pub name: Option<String>,
    /// Brand or designer.
    pub brand: Option<String>,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Unit price at add time.
    pub price: Option<Price>,
}

impl ProductSnapshot {
    /// Whether the snapshot carries no data at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.brand.is_none()
            && self.image_url.is_none()
            && self.price.is_none()
    }
}
