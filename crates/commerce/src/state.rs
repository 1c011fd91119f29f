//! Commerce state shared across the application.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, instrument};

use atelier_core::ProductId;

use crate::entity::{CartAttributes, Wishlist};
use crate::error::Result;
use crate::gateway::{CartGateway, CommerceGateway, HttpGateway, SessionCredentials};
use crate::session::SessionSignal;
use crate::store::KeyValueStore;
use crate::synchronizer::{CartSynchronizer, Synchronizer, WishlistSynchronizer};

/// Cart and wishlist synchronizers bound to one session and one gateway.
///
/// This struct is cheaply cloneable via `Arc`. Construct one per process and
/// pass it to whatever needs it.
///
/// Session transitions go through [`start_session`](Self::start_session) and
/// [`end_session`](Self::end_session), which drive both synchronizers
/// directly. Do not also run [`Synchronizer::watch_session`] on them, or every
/// transition is applied twice.
pub struct CommerceState<G = HttpGateway> {
    inner: Arc<CommerceStateInner<G>>,
}

struct CommerceStateInner<G> {
    session: SessionSignal,
    gateway: Arc<G>,
    cart: CartSynchronizer<G>,
    wishlist: WishlistSynchronizer<G>,
}

impl<G> Clone for CommerceState<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> CommerceState<G>
where
    G: CartGateway + CommerceGateway<Wishlist> + SessionCredentials + 'static,
{
    /// Create the state. Both synchronizers share the store, the gateway and
    /// the session.
    pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<G>, session: SessionSignal) -> Self {
        let cart = Synchronizer::new(Arc::clone(&store), Arc::clone(&gateway), session.clone());
        let wishlist = Synchronizer::new(store, Arc::clone(&gateway), session.clone());

        Self {
            inner: Arc::new(CommerceStateInner {
                session,
                gateway,
                cart,
                wishlist,
            }),
        }
    }

    /// Get a reference to the session signal.
    #[must_use]
    pub fn session(&self) -> &SessionSignal {
        &self.inner.session
    }

    /// Get a reference to the gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.inner.gateway
    }

    /// Get a reference to the cart synchronizer.
    #[must_use]
    pub fn cart(&self) -> &CartSynchronizer<G> {
        &self.inner.cart
    }

    /// Get a reference to the wishlist synchronizer.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistSynchronizer<G> {
        &self.inner.wishlist
    }

    /// Start a session and load both collections.
    ///
    /// Without a token the gateway keeps whatever credential it already has.
    #[instrument(skip_all)]
    pub async fn start_session(&self, token: Option<SecretString>) {
        if let Some(token) = token {
            self.inner.gateway.set_credential(token);
        }
        self.inner.session.start();
        info!("Session started");
        self.load_all().await;
    }

    /// End the session: forget the credential and empty both collections.
    #[instrument(skip_all)]
    pub async fn end_session(&self) {
        self.inner.session.end();
        self.inner.gateway.clear_credential();
        info!("Session ended");
        tokio::join!(
            self.inner.cart.on_session_end(),
            self.inner.wishlist.on_session_end()
        );
    }

    /// Load both collections concurrently.
    pub async fn load_all(&self) {
        tokio::join!(self.inner.cart.load(), self.inner.wishlist.load());
    }

    /// Move a saved product into the cart.
    ///
    /// The wishlist entry is removed only after the cart accepted the product.
    ///
    /// # Errors
    ///
    /// Returns the cart error when the add failed, in which case the wishlist
    /// is untouched, or the wishlist error when the removal failed, in which
    /// case the product is in both collections.
    #[instrument(skip(self, attributes), fields(product_id = %id))]
    pub async fn move_to_cart(&self, id: ProductId, attributes: CartAttributes) -> Result<()> {
        self.inner.cart.add(id.clone(), attributes).await?;
        self.inner.wishlist.remove(id).await
    }
}

impl<G> std::fmt::Debug for CommerceState<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceState")
            .field("session_active", &self.inner.session.is_active())
            .field("cart", &self.inner.cart)
            .field("wishlist", &self.inner.wishlist)
            .finish_non_exhaustive()
    }
}
