//! In-process commerce backend.
//!
//! Holds server-side collections and implements the gateway traits directly,
//! with scripted failures, a hold gate to observe optimistic state, and call
//! accounting.

use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;

use atelier_commerce::{
    Cart, CartAttributes, CartGateway, CommerceGateway, GatewayError, SessionCredentials, Wishlist,
};
use atelier_core::{CartLine, CartLineKey, ProductId, WishlistItem};

/// Failure returned instead of touching server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Request timed out.
    Timeout,
    /// 5xx response.
    Server,
    /// Credential rejected.
    Unauthorized,
    /// Feature not offered.
    Unavailable,
}

impl Failure {
    fn into_error(self) -> GatewayError {
        match self {
            Self::Timeout => GatewayError::Timeout,
            Self::Server => GatewayError::Api {
                status: 500,
                message: "internal error".to_string(),
            },
            Self::Unauthorized => GatewayError::NotAuthenticated,
            Self::Unavailable => GatewayError::Unavailable("mock".to_string()),
        }
    }
}

/// Scriptable backend for both entity kinds.
pub struct MockBackend {
    cart: Mutex<Vec<CartLine>>,
    wishlist: Mutex<Vec<WishlistItem>>,
    failures: Mutex<VecDeque<Failure>>,
    wishlist_unavailable: AtomicBool,
    gate: watch::Sender<bool>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    credential: Mutex<Option<SecretString>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            cart: Mutex::default(),
            wishlist: Mutex::default(),
            failures: Mutex::default(),
            wishlist_unavailable: AtomicBool::new(false),
            gate: watch::Sender::new(true),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            credential: Mutex::default(),
        }
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the server-side cart.
    pub fn seed_cart(&self, lines: impl IntoIterator<Item = CartLine>) {
        self.cart.lock().unwrap().extend(lines);
    }

    /// Seed the server-side wishlist.
    pub fn seed_wishlist(&self, ids: &[&str]) {
        self.wishlist
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| WishlistItem::new(ProductId::new(*id))));
    }

    #[must_use]
    pub fn server_cart(&self) -> Vec<CartLine> {
        self.cart.lock().unwrap().clone()
    }

    #[must_use]
    pub fn server_wishlist(&self) -> Vec<WishlistItem> {
        self.wishlist.lock().unwrap().clone()
    }

    /// Make the next call fail.
    pub fn fail_next(&self, failure: Failure) {
        self.failures.lock().unwrap().push_back(failure);
    }

    /// Make every wishlist call answer "feature not available".
    pub fn disable_wishlist(&self) {
        self.wishlist_unavailable.store(true, Ordering::SeqCst);
    }

    /// Block calls until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Forget the in-flight peak, e.g. after the concurrent initial loads.
    pub fn reset_peak(&self) {
        self.max_in_flight.store(0, Ordering::SeqCst);
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.lock().unwrap().is_some()
    }

    async fn call<T>(
        &self,
        wishlist: bool,
        f: impl FnOnce(&Self) -> T,
    ) -> Result<T, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        tokio::task::yield_now().await;

        let failure = self.failures.lock().unwrap().pop_front();
        let result = if wishlist && self.wishlist_unavailable.load(Ordering::SeqCst) {
            Err(Failure::Unavailable.into_error())
        } else if let Some(failure) = failure {
            Err(failure.into_error())
        } else {
            Ok(f(self))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn cart_add(&self, id: &ProductId, attributes: &CartAttributes) -> Vec<CartLine> {
        let mut cart = self.cart.lock().unwrap();
        let key = attributes.line_key(id.clone());
        if let Some(line) = cart.iter_mut().find(|line| line.matches(&key)) {
            line.add_quantity(attributes.quantity);
        } else {
            cart.push(CartLine {
                product_id: id.clone(),
                quantity: attributes.quantity,
                size: attributes.size.clone(),
                color: attributes.color.clone(),
                product: attributes.product.clone(),
            });
        }
        cart.clone()
    }

    fn cart_remove(&self, key: &CartLineKey) -> Vec<CartLine> {
        let mut cart = self.cart.lock().unwrap();
        cart.retain(|line| !line.matches(key));
        cart.clone()
    }

    fn cart_set_quantity(&self, key: &CartLineKey, quantity: NonZeroU32) -> Vec<CartLine> {
        let mut cart = self.cart.lock().unwrap();
        if let Some(line) = cart.iter_mut().find(|line| line.matches(key)) {
            line.quantity = quantity;
        }
        cart.clone()
    }

    fn wishlist_add(&self, id: &ProductId) -> Vec<WishlistItem> {
        let mut wishlist = self.wishlist.lock().unwrap();
        if !wishlist.iter().any(|item| item.product_id == *id) {
            wishlist.push(WishlistItem::new(id.clone()));
        }
        wishlist.clone()
    }

    fn wishlist_remove(&self, id: &ProductId) -> Vec<WishlistItem> {
        let mut wishlist = self.wishlist.lock().unwrap();
        wishlist.retain(|item| item.product_id != *id);
        wishlist.clone()
    }
}

#[async_trait]
impl CommerceGateway<Cart> for MockBackend {
    async fn fetch_all(&self) -> Result<Vec<CartLine>, GatewayError> {
        self.call(false, Self::server_cart).await
    }

    async fn add(
        &self,
        id: &ProductId,
        attributes: &CartAttributes,
    ) -> Result<Vec<CartLine>, GatewayError> {
        self.call(false, |backend| backend.cart_add(id, attributes))
            .await
    }

    async fn remove(&self, key: &CartLineKey) -> Result<Vec<CartLine>, GatewayError> {
        self.call(false, |backend| backend.cart_remove(key)).await
    }

    async fn clear(&self) -> Result<(), GatewayError> {
        self.call(false, |backend| backend.cart.lock().unwrap().clear())
            .await
    }
}

#[async_trait]
impl CartGateway for MockBackend {
    async fn set_quantity(
        &self,
        key: &CartLineKey,
        quantity: NonZeroU32,
    ) -> Result<Vec<CartLine>, GatewayError> {
        self.call(false, |backend| backend.cart_set_quantity(key, quantity))
            .await
    }
}

#[async_trait]
impl CommerceGateway<Wishlist> for MockBackend {
    async fn fetch_all(&self) -> Result<Vec<WishlistItem>, GatewayError> {
        self.call(true, Self::server_wishlist).await
    }

    async fn add(
        &self,
        id: &ProductId,
        _attributes: &(),
    ) -> Result<Vec<WishlistItem>, GatewayError> {
        self.call(true, |backend| backend.wishlist_add(id)).await
    }

    async fn remove(&self, id: &ProductId) -> Result<Vec<WishlistItem>, GatewayError> {
        self.call(true, |backend| backend.wishlist_remove(id)).await
    }

    async fn clear(&self) -> Result<(), GatewayError> {
        self.call(true, |backend| backend.wishlist.lock().unwrap().clear())
            .await
    }
}

impl SessionCredentials for MockBackend {
    fn set_credential(&self, token: SecretString) {
        *self.credential.lock().unwrap() = Some(token);
    }

    fn clear_credential(&self) {
        *self.credential.lock().unwrap() = None;
    }
}
