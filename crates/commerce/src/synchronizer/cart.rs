//! Cart-only operations.

use core::num::NonZeroU32;

use rust_decimal::Decimal;
use tracing::instrument;

use atelier_core::CartLineKey;

use super::Synchronizer;
use crate::entity::Cart;
use crate::error::Result;
use crate::gateway::CartGateway;

impl<G: CartGateway + ?Sized + 'static> Synchronizer<Cart, G> {
    /// Sum of unit price times quantity. Lines without a price count as zero.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.inner.state.read(|s| s.items.total())
    }

    /// Units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.state.read(|s| s.items.item_count())
    }

    /// Replace the quantity of a line.
    ///
    /// A quantity of zero or less removes the line. Quantities above
    /// `u32::MAX` are clamped.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    #[instrument(skip(self, key), fields(kind = "cart"))]
    pub async fn set_quantity(&self, key: impl Into<CartLineKey> + Send, quantity: i64) -> Result<()> {
        let key = key.into();
        let Some(quantity) = clamp_quantity(quantity) else {
            return self.remove(key).await;
        };

        let session = self.require_session()?;
        let _guard = self.inner.locks.acquire(&key.product_id).await;

        let remote = self.inner.gateway.set_quantity(&key, quantity);
        self.apply_locked(session, |items| items.set_quantity(&key, quantity), remote)
            .await
    }
}

fn clamp_quantity(quantity: i64) -> Option<NonZeroU32> {
    if quantity <= 0 {
        return None;
    }
    NonZeroU32::new(u32::try_from(quantity).unwrap_or(u32::MAX))
}
