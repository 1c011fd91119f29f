//! Wishlist records.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::ProductSnapshot;

/// A wishlist entry.
///
/// Presence in the wishlist is the entire state: the collection is unique by
/// `product_id` and there is no quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    /// Saved product.
    pub product_id: ProductId,
    /// Display data, when the backend returned a populated product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSnapshot>,
}

impl WishlistItem {
    /// Create an entry with no display data.
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            product: None,
        }
    }
}
