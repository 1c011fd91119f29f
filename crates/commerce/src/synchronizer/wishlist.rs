//! Wishlist-only operations.

use tracing::{debug, instrument};

use atelier_core::{ProductId, WishlistItem};

use super::Synchronizer;
use crate::entity::Wishlist;
use crate::error::Result;
use crate::gateway::CommerceGateway;

impl<G: CommerceGateway<Wishlist> + ?Sized + 'static> Synchronizer<Wishlist, G> {
    /// Number of saved items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.state.read(|s| s.items.total())
    }

    /// Add the product if absent, remove it if present.
    ///
    /// The direction is decided locally under the product's lock and sent to
    /// the backend as an explicit add or remove, so a server that already
    /// disagrees with the local collection converges to the local decision.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    #[instrument(skip(self), fields(kind = "wishlist", product_id = %id))]
    pub async fn toggle(&self, id: ProductId) -> Result<()> {
        let session = self.require_session()?;
        let _guard = self.inner.locks.acquire(&id).await;

        if self.contains(&id) {
            debug!("Toggling off");
            let remote = self.inner.gateway.remove(&id);
            self.apply_locked(session, |items| items.remove(&id), remote)
                .await
        } else {
            debug!("Toggling on");
            let item = WishlistItem::new(id.clone());
            let remote = self.inner.gateway.add(&id, &());
            self.apply_locked(session, |items| items.insert_or_merge(item), remote)
                .await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::FakeGateway;
    use super::*;
    use crate::error::SyncError;
    use crate::gateway::GatewayError;
    use crate::session::SessionSignal;
    use crate::store::MemoryStore;
    use crate::synchronizer::WishlistSynchronizer;

    fn wishlist(gateway: &Arc<FakeGateway>) -> WishlistSynchronizer<FakeGateway> {
        Synchronizer::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(gateway),
            SessionSignal::new(true),
        )
    }

    #[tokio::test]
    async fn test_toggle_twice_is_identity() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&gateway);
        sync.add(ProductId::new("p0"), ()).await.unwrap();
        let before = sync.snapshot().items;

        sync.toggle(ProductId::new("p1")).await.unwrap();
        assert!(sync.contains(&ProductId::new("p1")));
        assert_eq!(sync.total(), 2);

        sync.toggle(ProductId::new("p1")).await.unwrap();
        assert_eq!(sync.snapshot().items, before);
    }

    #[tokio::test]
    async fn test_toggle_failure_restores_membership() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&gateway);
        sync.add(ProductId::new("p1"), ()).await.unwrap();

        gateway.fail_next(GatewayError::Timeout);
        let result = sync.toggle(ProductId::new("p1")).await;
        assert!(matches!(result, Err(SyncError::Transient(_))));
        assert!(sync.contains(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_concurrent_toggles_cancel_out() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&gateway);

        let (a, b) = tokio::join!(
            sync.toggle(ProductId::new("p1")),
            sync.toggle(ProductId::new("p1"))
        );
        a.unwrap();
        b.unwrap();
        assert!(!sync.contains(&ProductId::new("p1")));
        assert!(gateway.wishlist.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_on_sends_add_when_server_already_has_item() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&gateway);
        sync.load().await;

        // Saved from another device after the last load
        gateway
            .wishlist
            .lock()
            .unwrap()
            .insert_or_merge(WishlistItem::new(ProductId::new("p1")));
        assert!(!sync.contains(&ProductId::new("p1")));

        sync.toggle(ProductId::new("p1")).await.unwrap();
        assert!(sync.contains(&ProductId::new("p1")));
        assert!(gateway.wishlist.lock().unwrap().contains(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_toggle_off_sends_remove_when_server_lacks_item() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&gateway);
        sync.add(ProductId::new("p1"), ()).await.unwrap();
        gateway.wishlist.lock().unwrap().clear();

        sync.toggle(ProductId::new("p1")).await.unwrap();
        assert!(!sync.contains(&ProductId::new("p1")));
        assert!(gateway.wishlist.lock().unwrap().is_empty());
    }
}
