//! Entity kinds: the per-collection behavior the synchronizer is generic over.
//!
//! The cart and the wishlist share the same optimistic-update machinery. What
//! differs is the record shape, how records are keyed, and how an add merges
//! into an existing record. [`EntityKind`] captures exactly that.

use core::fmt::{Debug, Display};
use core::hash::Hash;
use core::num::NonZeroU32;

use serde::Serialize;
use serde::de::DeserializeOwned;

use atelier_core::{CartLine, CartLineKey, ProductId, ProductSnapshot, WishlistItem};

/// Behavior of one synchronized entity collection.
pub trait EntityKind: Send + Sync + 'static {
    /// Name used for storage key namespacing, gateway routing and logs.
    const NAME: &'static str;

    /// Whether ending the session also drops the persisted collection cache.
    const CLEAR_CACHE_ON_SESSION_END: bool;

    /// Stored record.
    type Record: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Uniqueness key of a record within the collection.
    type Key: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static;

    /// Extra input accepted by `add`.
    type Attributes: Clone + Debug + Default + Send + Sync + 'static;

    /// Key of a record.
    fn key(record: &Self::Record) -> Self::Key;

    /// Product identifier a key refers to.
    fn identifier(key: &Self::Key) -> &ProductId;

    /// Product identifier of a record.
    fn record_identifier(record: &Self::Record) -> &ProductId;

    /// Build the record an `add` call inserts.
    fn build(id: ProductId, attributes: Self::Attributes) -> Self::Record;

    /// Merge an added record into an existing record with the same key.
    fn merge(existing: &mut Self::Record, incoming: Self::Record);

    /// Units held by a record.
    fn quantity(record: &Self::Record) -> u32;
}

/// The shopping cart.
#[derive(Debug, Clone, Copy)]
pub struct Cart;

/// The wishlist.
#[derive(Debug, Clone, Copy)]
pub struct Wishlist;

/// Input of a cart `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartAttributes {
    /// Units to add.
    pub quantity: NonZeroU32,
    /// Selected size.
    pub size: Option<String>,
    /// Selected color.
    pub color: Option<String>,
    /// Product data to keep for offline display.
    pub product: Option<ProductSnapshot>,
}

impl Default for CartAttributes {
    fn default() -> Self {
        Self {
            quantity: NonZeroU32::MIN,
            size: None,
            color: None,
            product: None,
        }
    }
}

impl CartAttributes {
    /// Attributes for `quantity` units without variant selection.
    #[must_use]
    pub fn with_quantity(quantity: NonZeroU32) -> Self {
        Self {
            quantity,
            ..Self::default()
        }
    }

    /// Composite key the added line will have.
    #[must_use]
    pub fn line_key(&self, product_id: ProductId) -> CartLineKey {
        CartLineKey::new(product_id, self.size.clone(), self.color.clone())
    }
}

impl EntityKind for Cart {
    const NAME: &'static str = "cart";
    const CLEAR_CACHE_ON_SESSION_END: bool = false;

    type Record = CartLine;
    type Key = CartLineKey;
    type Attributes = CartAttributes;

    fn key(record: &CartLine) -> CartLineKey {
        record.key()
    }

    fn identifier(key: &CartLineKey) -> &ProductId {
        &key.product_id
    }

    fn record_identifier(record: &CartLine) -> &ProductId {
        &record.product_id
    }

    fn build(id: ProductId, attributes: CartAttributes) -> CartLine {
        CartLine {
            product_id: id,
            quantity: attributes.quantity,
            size: attributes.size,
            color: attributes.color,
            product: attributes.product,
        }
    }

    fn merge(existing: &mut CartLine, incoming: CartLine) {
        existing.add_quantity(incoming.quantity);
        if existing.product.is_none() {
            existing.product = incoming.product;
        }
    }

    fn quantity(record: &CartLine) -> u32 {
        record.quantity.get()
    }
}

impl EntityKind for Wishlist {
    const NAME: &'static str = "wishlist";
    const CLEAR_CACHE_ON_SESSION_END: bool = true;

    type Record = WishlistItem;
    type Key = ProductId;
    type Attributes = ();

    fn key(record: &WishlistItem) -> ProductId {
        record.product_id.clone()
    }

    fn identifier(key: &ProductId) -> &ProductId {
        key
    }

    fn record_identifier(record: &WishlistItem) -> &ProductId {
        &record.product_id
    }

    fn build(id: ProductId, (): ()) -> WishlistItem {
        WishlistItem::new(id)
    }

    fn merge(existing: &mut WishlistItem, incoming: WishlistItem) {
        // Presence is the whole state.
        if existing.product.is_none() {
            existing.product = incoming.product;
        }
    }

    fn quantity(_record: &WishlistItem) -> u32 {
        1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_merge_increments_quantity() {
        let mut existing = Cart::build(
            ProductId::new("p1"),
            CartAttributes::with_quantity(NonZeroU32::new(2).unwrap()),
        );
        let incoming = Cart::build(ProductId::new("p1"), CartAttributes::default());
        Cart::merge(&mut existing, incoming);
        assert_eq!(Cart::quantity(&existing), 3);
    }

    #[test]
    fn test_cart_key_includes_variant() {
        let attributes = CartAttributes {
            size: Some("M".to_string()),
            ..CartAttributes::default()
        };
        let line = Cart::build(ProductId::new("p1"), attributes.clone());
        assert_eq!(Cart::key(&line), attributes.line_key(ProductId::new("p1")));
        assert_eq!(Cart::identifier(&Cart::key(&line)).as_str(), "p1");
    }

    #[test]
    fn test_wishlist_merge_is_presence_only() {
        let mut existing = Wishlist::build(ProductId::new("p1"), ());
        Wishlist::merge(&mut existing, Wishlist::build(ProductId::new("p1"), ()));
        assert_eq!(existing, WishlistItem::new(ProductId::new("p1")));
        assert_eq!(Wishlist::quantity(&existing), 1);
    }
}
