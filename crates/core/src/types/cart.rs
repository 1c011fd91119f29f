//! Cart records.

use core::fmt;
use core::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::ProductSnapshot;

/// A cart line.
///
/// The same product in two sizes or colors is two lines; see [`CartLineKey`].
/// A line always holds at least one unit. Reducing it to zero removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product in the line.
    pub product_id: ProductId,
    /// Number of units (never zero).
    pub quantity: NonZeroU32,
    /// Selected size, if the product has sizes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Selected color, if the product has colors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Product data captured at add time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSnapshot>,
}

impl CartLine {
    /// Composite key of this line.
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }

    /// Whether this line matches a composite key.
    #[must_use]
    pub fn matches(&self, key: &CartLineKey) -> bool {
        self.product_id == key.product_id && self.size == key.size && self.color == key.color
    }

    /// Unit price from the product snapshot, if known.
    #[must_use]
    pub fn unit_price(&self) -> Option<Decimal> {
        self.product.as_ref()?.price.map(|p| p.amount)
    }

    /// Unit price times quantity. Lines without a known price contribute zero.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price()
            .map_or(Decimal::ZERO, |unit| unit * Decimal::from(self.quantity.get()))
    }

    /// Add units to this line, saturating at `u32::MAX`.
    pub fn add_quantity(&mut self, more: NonZeroU32) {
        self.quantity = self.quantity.saturating_add(more.get());
    }
}

/// Composite key of a cart line: product identifier plus variant attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineKey {
    /// Product in the line.
    pub product_id: ProductId,
    /// Selected size.
    pub size: Option<String>,
    /// Selected color.
    pub color: Option<String>,
}

impl CartLineKey {
    /// Key with explicit variant attributes.
    #[must_use]
    pub const fn new(product_id: ProductId, size: Option<String>, color: Option<String>) -> Self {
        Self {
            product_id,
            size,
            color,
        }
    }
}

/// A bare product identifier addresses the line without size or color.
impl From<ProductId> for CartLineKey {
    fn from(product_id: ProductId) -> Self {
        Self::new(product_id, None, None)
    }
}

impl From<&str> for CartLineKey {
    fn from(product_id: &str) -> Self {
        Self::from(ProductId::from(product_id))
    }
}

impl fmt::Display for CartLineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product_id)?;
        if let Some(size) = &self.size {
            write!(f, "/{size}")?;
        }
        if let Some(color) = &self.color {
            write!(f, "/{color}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::price::{CurrencyCode, Price};

    fn line(id: &str, quantity: u32, size: Option<&str>) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity: NonZeroU32::new(quantity).unwrap(),
            size: size.map(String::from),
            color: None,
            product: None,
        }
    }

    #[test]
    fn test_key_distinguishes_sizes() {
        let small = line("p1", 1, Some("S"));
        let large = line("p1", 1, Some("L"));
        assert_ne!(small.key(), large.key());
        assert!(small.matches(&small.key()));
        assert!(!small.matches(&large.key()));
    }

    #[test]
    fn test_key_from_product_id() {
        let key = CartLineKey::from(ProductId::new("p1"));
        assert!(line("p1", 2, None).matches(&key));
        assert!(!line("p1", 2, Some("M")).matches(&key));
    }

    #[test]
    fn test_key_display() {
        let key = CartLineKey::new(
            ProductId::new("p1"),
            Some("M".to_string()),
            Some("navy".to_string()),
        );
        assert_eq!(key.to_string(), "p1/M/navy");
        assert_eq!(CartLineKey::from("p2").to_string(), "p2");
    }

    #[test]
    fn test_line_total_uses_snapshot_price() {
        let mut l = line("p1", 3, None);
        assert_eq!(l.line_total(), Decimal::ZERO);

        l.product = Some(ProductSnapshot {
            price: Some(Price::parse("12.50", CurrencyCode::USD).unwrap()),
            ..ProductSnapshot::default()
        });
        assert_eq!(l.line_total(), Decimal::new(3750, 2));
    }

    #[test]
    fn test_add_quantity_saturates() {
        let mut l = line("p1", u32::MAX - 1, None);
        l.add_quantity(NonZeroU32::new(5).unwrap());
        assert_eq!(l.quantity.get(), u32::MAX);
    }

    #[test]
    fn test_zero_quantity_rejected_on_deserialize() {
        let json = r#"{"product_id":"p1","quantity":0}"#;
        assert!(serde_json::from_str::<CartLine>(json).is_err());
    }
}
