//! The entity synchronizer.
//!
//! Every mutation follows the same shape:
//!
//! 1. check the session, take the product's lock
//! 2. apply the change locally and notify subscribers
//! 3. in local-only mode, persist and stop
//! 4. otherwise confirm with the gateway: success replaces the collection
//!    with the server's, "unavailable" demotes to local-only mode and keeps
//!    the local change, anything else rolls the change back
//!
//! Each operation captures the session generation it started in. A backend
//! answer that arrives after that session ended is discarded: the collection
//! stays empty and nothing is written to the cache.
//!
//! Kind-specific operations (`set_quantity`, `toggle`, totals) live in the
//! `cart` and `wishlist` submodules as inherent impls on the concrete kind,
//! so calling them on the wrong kind does not compile.

mod cart;
mod wishlist;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use atelier_core::{Availability, ProductId, SyncPhase};

use crate::collection::{Collection, Undo};
use crate::entity::{Cart, EntityKind, Wishlist};
use crate::error::{Result, SyncError};
use crate::gateway::{CommerceGateway, FailureClass, GatewayError, HttpGateway};
use crate::locks::KeyedLocks;
use crate::session::SessionSignal;
use crate::snapshot::{Snapshot, SnapshotCell};
use crate::store::KeyValueStore;
use crate::store::persisted::Persistence;

/// Cart synchronizer.
pub type CartSynchronizer<G = HttpGateway> = Synchronizer<Cart, G>;

/// Wishlist synchronizer.
pub type WishlistSynchronizer<G = HttpGateway> = Synchronizer<Wishlist, G>;

// =============================================================================
// Synchronizer
// =============================================================================

/// Optimistic, self-healing store for one entity collection.
///
/// Cheaply cloneable; clones share state.
pub struct Synchronizer<E: EntityKind, G: ?Sized> {
    inner: Arc<Inner<E, G>>,
}

struct Inner<E: EntityKind, G: ?Sized> {
    state: SnapshotCell<E>,
    persistence: Persistence<E>,
    session: SessionSignal,
    locks: KeyedLocks,
    availability_restored: OnceCell<()>,
    loads: Mutex<LoadTracker>,
    gateway: Arc<G>,
}

/// Loads in flight and the phase to fall back to if they all fail.
#[derive(Debug, Default)]
struct LoadTracker {
    in_flight: usize,
    phase_before: SyncPhase,
}

impl<E: EntityKind, G: ?Sized> Clone for Synchronizer<E, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, G> Synchronizer<E, G>
where
    E: EntityKind,
    G: CommerceGateway<E> + ?Sized + 'static,
{
    /// Create a synchronizer with an empty, uninitialized collection.
    ///
    /// Nothing is loaded until [`load`](Self::load) runs.
    pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<G>, session: SessionSignal) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: SnapshotCell::new(),
                persistence: Persistence::new(store),
                session,
                locks: KeyedLocks::new(),
                availability_restored: OnceCell::new(),
                loads: Mutex::default(),
                gateway,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<E> {
        self.inner.state.get()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<E>> {
        self.inner.state.subscribe()
    }

    /// Whether any record refers to the product.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.inner.state.read(|s| s.contains(id))
    }

    /// Units of the product held in the collection.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.inner.state.read(|s| s.quantity_of(id))
    }

    /// Whether the remote gateway is in use.
    #[must_use]
    pub fn availability(&self) -> Availability {
        self.inner.state.read(|s| s.availability)
    }

    /// The session signal this synchronizer follows.
    #[must_use]
    pub fn session(&self) -> &SessionSignal {
        &self.inner.session
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Populate the collection from the backend, or from the persisted store
    /// in local-only mode.
    ///
    /// Never fails: errors are logged and the previous state is kept. Loads
    /// may overlap; `loading` stays set until the last one finishes.
    #[instrument(skip(self), fields(kind = E::NAME))]
    pub async fn load(&self) {
        let Some(session) = self.inner.session.active_session() else {
            debug!("No session, clearing collection");
            self.inner.state.set_items(Collection::new());
            return;
        };

        self.ensure_availability().await;
        if !self.availability().is_remote() {
            let items = self.read_local().await;
            self.finish_local_load(session, items);
            return;
        }

        self.begin_load();
        let loaded = match self.inner.gateway.fetch_all().await {
            Ok(records) => {
                let items = Collection::from_records(records);
                debug!(count = items.len(), "Loaded collection from backend");
                self.persist(session, items.records()).await;
                Some(items)
            }
            Err(e) if e.class() == FailureClass::Unavailable => {
                self.demote(&e).await;
                Some(self.read_local().await)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load collection, keeping current state");
                None
            }
        };

        self.finish_load(session, loaded);
    }

    async fn read_local(&self) -> Collection<E> {
        let items = self
            .inner
            .persistence
            .read_collection()
            .await
            .map(Collection::from_records)
            .unwrap_or_default();
        debug!(count = items.len(), "Loaded collection from local store");
        items
    }

    fn finish_local_load(&self, session: u64, items: Collection<E>) {
        self.update_in_session(session, |s| {
            s.items = items;
            s.phase = SyncPhase::Ready;
        });
    }

    fn begin_load(&self) {
        self.inner.state.update(|s| {
            let mut loads = self.loads();
            if loads.in_flight == 0 {
                loads.phase_before = s.phase;
            }
            loads.in_flight += 1;
            s.loading = true;
            if s.phase == SyncPhase::Uninitialized {
                s.phase = SyncPhase::Loading;
            }
        });
    }

    /// `None`, or a result from an ended session, keeps the current records.
    fn finish_load(&self, session: u64, loaded: Option<Collection<E>>) {
        self.inner.state.update(|s| {
            let mut loads = self.loads();
            loads.in_flight = loads.in_flight.saturating_sub(1);
            let loaded = loaded.filter(|_| {
                let current = self.inner.session.is_current(session);
                if !current {
                    debug!("Session changed during load, discarding result");
                }
                current
            });
            if let Some(items) = loaded {
                s.items = items;
                s.phase = SyncPhase::Ready;
                loads.phase_before = SyncPhase::Ready;
            } else if loads.in_flight == 0 {
                s.phase = loads.phase_before;
            }
            s.loading = loads.in_flight > 0;
        });
    }

    fn loads(&self) -> MutexGuard<'_, LoadTracker> {
        self.inner
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product, merging into an existing record with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without any state change when
    /// no session is active, and [`SyncError::Transient`] after rolling back
    /// when the backend failed.
    #[instrument(skip(self, attributes), fields(kind = E::NAME, product_id = %id))]
    pub async fn add(&self, id: ProductId, attributes: E::Attributes) -> Result<()> {
        let session = self.require_session()?;
        let _guard = self.inner.locks.acquire(&id).await;

        let record = E::build(id.clone(), attributes.clone());
        let remote = self.inner.gateway.add(&id, &attributes);
        self.apply_locked(session, |items| items.insert_or_merge(record), remote)
            .await
    }

    /// Remove the record with the given key.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    #[instrument(skip(self, key), fields(kind = E::NAME))]
    pub async fn remove(&self, key: impl Into<E::Key> + Send) -> Result<()> {
        let key = key.into();
        let session = self.require_session()?;
        let _guard = self.inner.locks.acquire(E::identifier(&key)).await;

        debug!(%key, "Removing");
        let remote = self.inner.gateway.remove(&key);
        self.apply_locked(session, |items| items.remove(&key), remote)
            .await
    }

    /// Empty the collection.
    ///
    /// Never rolls back: the empty collection is persisted even when the
    /// backend call fails.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] when no session is active.
    #[instrument(skip(self), fields(kind = E::NAME))]
    pub async fn clear(&self) -> Result<()> {
        let session = self.require_session()?;
        self.ensure_availability().await;
        if !self.update_in_session(session, |s| s.items.clear()) {
            return Err(SyncError::NotAuthenticated);
        }

        if self.availability().is_remote() {
            match self.inner.gateway.clear().await {
                Ok(()) => debug!("Cleared on backend"),
                Err(e) if e.class() == FailureClass::Unavailable => self.demote(&e).await,
                Err(e) => warn!(error = %e, "Backend clear failed, keeping local clear"),
            }
        }

        self.persist(session, &[]).await;
        Ok(())
    }

    // =========================================================================
    // Session linkage
    // =========================================================================

    /// Reload after a session started.
    pub async fn on_session_start(&self) {
        info!(kind = E::NAME, "Session started, loading");
        self.load().await;
    }

    /// Drop the collection after the session ended.
    ///
    /// Kinds with [`EntityKind::CLEAR_CACHE_ON_SESSION_END`] also remove their
    /// persisted cache. No network call is made.
    pub async fn on_session_end(&self) {
        info!(kind = E::NAME, "Session ended, clearing collection");
        self.inner.state.update(|s| {
            s.items.clear();
            s.loading = false;
        });
        if E::CLEAR_CACHE_ON_SESSION_END {
            self.inner.persistence.remove_collection().await;
        }
    }

    /// Follow the session signal in a background task.
    ///
    /// The task applies [`on_session_start`](Self::on_session_start) and
    /// [`on_session_end`](Self::on_session_end) on every transition and stops
    /// when the signal is dropped.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut rx = self.inner.session.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let active = *rx.borrow_and_update();
                if active {
                    this.on_session_start().await;
                } else {
                    this.on_session_end().await;
                }
            }
        })
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Use the persisted store only, for the rest of this process.
    ///
    /// Unlike a demotion caused by the backend, this is not persisted.
    pub fn force_local(&self) {
        let mut changed = false;
        self.inner.state.update(|s| {
            changed = s.availability.is_remote();
            s.availability = Availability::LocalOnly;
        });
        if changed {
            info!(kind = E::NAME, "Forced local-only mode");
        }
    }

    /// Apply the persisted availability flag once per process.
    async fn ensure_availability(&self) {
        self.inner
            .availability_restored
            .get_or_init(|| async {
                if self.inner.persistence.read_availability().await == Some(Availability::LocalOnly)
                {
                    info!(kind = E::NAME, "Restored local-only mode from store");
                    self.inner
                        .state
                        .update(|s| s.availability = Availability::LocalOnly);
                }
            })
            .await;
    }

    async fn demote(&self, reason: &GatewayError) {
        let mut changed = false;
        self.inner.state.update(|s| {
            changed = s.availability.is_remote();
            s.availability = Availability::LocalOnly;
        });
        if changed {
            info!(kind = E::NAME, reason = %reason, "Remote feature unavailable, using local store");
        }
        self.inner
            .persistence
            .write_availability(Availability::LocalOnly)
            .await;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Generation of the active session.
    fn require_session(&self) -> Result<u64> {
        self.inner
            .session
            .active_session()
            .ok_or(SyncError::NotAuthenticated)
    }

    /// Optimistic step, then confirmation. The caller holds the product lock.
    ///
    /// `remote` is only polled in remote mode. Once `session` has ended the
    /// outcome is discarded and [`SyncError::NotAuthenticated`] returned.
    async fn apply_locked<F>(
        &self,
        session: u64,
        local: impl FnOnce(&mut Collection<E>) -> Undo<E>,
        remote: F,
    ) -> Result<()>
    where
        F: Future<Output = std::result::Result<Vec<E::Record>, GatewayError>>,
    {
        self.ensure_availability().await;
        let mut undo = None;
        if !self.update_in_session(session, |s| undo = Some(local(&mut s.items))) {
            return Err(SyncError::NotAuthenticated);
        }

        if !self.availability().is_remote() {
            self.persist_current(session).await;
            return Ok(());
        }

        let outcome = remote.await;
        if !self.inner.session.is_current(session) {
            debug!("Session ended before the backend answered, discarding result");
            return Err(SyncError::NotAuthenticated);
        }

        match outcome {
            Ok(records) => {
                let items = Collection::from_records(records);
                debug!(count = items.len(), "Reconciled with backend");
                if !self.update_in_session(session, |s| s.items = items) {
                    return Err(SyncError::NotAuthenticated);
                }
                self.persist_current(session).await;
                Ok(())
            }
            Err(e) if e.class() == FailureClass::Unavailable => {
                self.demote(&e).await;
                self.persist_current(session).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Backend rejected change, rolling back");
                if let Some(undo) = undo {
                    self.update_in_session(session, |s| s.items.restore(undo));
                }
                Err(SyncError::from_gateway(e))
            }
        }
    }

    /// Apply `f` only while `session` is active. Returns whether it ran.
    fn update_in_session(&self, session: u64, f: impl FnOnce(&mut Snapshot<E>)) -> bool {
        self.inner.state.update_if(|s| {
            let current = self.inner.session.is_current(session);
            if current {
                f(s);
            }
            current
        })
    }

    async fn persist_current(&self, session: u64) {
        let records = self.inner.state.read(|s| s.items.records().to_vec());
        self.persist(session, &records).await;
    }

    /// Write the cache while `session` is active.
    async fn persist(&self, session: u64, records: &[E::Record]) {
        if !self.inner.session.is_current(session) {
            return;
        }
        self.inner.persistence.write_collection(records).await;
        // A logout during the write has already removed the cache once.
        if E::CLEAR_CACHE_ON_SESSION_END && !self.inner.session.is_current(session) {
            self.inner.persistence.remove_collection().await;
        }
    }
}

impl<E: EntityKind, G: ?Sized> std::fmt::Debug for Synchronizer<E, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner
            .state
            .read(|s| {
                f.debug_struct("Synchronizer")
                    .field("kind", &E::NAME)
                    .field("items", &s.items.len())
                    .field("phase", &s.phase)
                    .field("availability", &s.availability)
                    .finish()
            })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable in-memory gateway for unit tests.

    use core::num::NonZeroU32;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use atelier_core::{CartLine, CartLineKey, ProductId, WishlistItem};

    use crate::collection::Collection;
    use crate::entity::{Cart, CartAttributes, EntityKind, Wishlist};
    use crate::gateway::{CartGateway, CommerceGateway, GatewayError};

    /// Gateway holding server-side collections. Queued failures are returned
    /// by the next calls instead of touching server state.
    pub(crate) struct FakeGateway {
        pub cart: Mutex<Collection<Cart>>,
        pub wishlist: Mutex<Collection<Wishlist>>,
        failures: Mutex<VecDeque<GatewayError>>,
        pub calls: AtomicUsize,
        held: AtomicBool,
        gate: Semaphore,
    }

    impl Default for FakeGateway {
        fn default() -> Self {
            Self {
                cart: Mutex::default(),
                wishlist: Mutex::default(),
                failures: Mutex::default(),
                calls: AtomicUsize::new(0),
                held: AtomicBool::new(false),
                gate: Semaphore::new(0),
            }
        }
    }

    impl FakeGateway {
        /// Park every following call until [`release_one`](Self::release_one).
        pub(crate) fn hold(&self) {
            self.held.store(true, Ordering::SeqCst);
        }

        /// Let the oldest parked call through.
        pub(crate) fn release_one(&self) {
            self.gate.add_permits(1);
        }

        /// Wait until `n` calls have reached the gateway.
        pub(crate) async fn wait_for_calls(&self, n: usize) {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        }

        pub(crate) fn fail_next(&self, error: GatewayError) {
            self.failures.lock().unwrap().push_back(error);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn begin(&self) -> Result<(), GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.held.load(Ordering::SeqCst) {
                self.gate.acquire().await.unwrap().forget();
            }
            self.failures.lock().unwrap().pop_front().map_or(Ok(()), Err)
        }
    }

    #[async_trait]
    impl CommerceGateway<Cart> for FakeGateway {
        async fn fetch_all(&self) -> Result<Vec<CartLine>, GatewayError> {
            self.begin().await?;
            Ok(self.cart.lock().unwrap().records().to_vec())
        }

        async fn add(
            &self,
            id: &ProductId,
            attributes: &CartAttributes,
        ) -> Result<Vec<CartLine>, GatewayError> {
            self.begin().await?;
            let mut cart = self.cart.lock().unwrap();
            cart.insert_or_merge(Cart::build(id.clone(), attributes.clone()));
            Ok(cart.records().to_vec())
        }

        async fn remove(&self, key: &CartLineKey) -> Result<Vec<CartLine>, GatewayError> {
            self.begin().await?;
            let mut cart = self.cart.lock().unwrap();
            cart.remove(key);
            Ok(cart.records().to_vec())
        }

        async fn clear(&self) -> Result<(), GatewayError> {
            self.begin().await?;
            self.cart.lock().unwrap().clear();
            Ok(())
        }
    }

    #[async_trait]
    impl CartGateway for FakeGateway {
        async fn set_quantity(
            &self,
            key: &CartLineKey,
            quantity: NonZeroU32,
        ) -> Result<Vec<CartLine>, GatewayError> {
            self.begin().await?;
            let mut cart = self.cart.lock().unwrap();
            cart.set_quantity(key, quantity);
            Ok(cart.records().to_vec())
        }
    }

    #[async_trait]
    impl CommerceGateway<Wishlist> for FakeGateway {
        async fn fetch_all(&self) -> Result<Vec<WishlistItem>, GatewayError> {
            self.begin().await?;
            Ok(self.wishlist.lock().unwrap().records().to_vec())
        }

        async fn add(
            &self,
            id: &ProductId,
            _attributes: &(),
        ) -> Result<Vec<WishlistItem>, GatewayError> {
            self.begin().await?;
            let mut wishlist = self.wishlist.lock().unwrap();
            wishlist.insert_or_merge(WishlistItem::new(id.clone()));
            Ok(wishlist.records().to_vec())
        }

        async fn remove(&self, id: &ProductId) -> Result<Vec<WishlistItem>, GatewayError> {
            self.begin().await?;
            let mut wishlist = self.wishlist.lock().unwrap();
            wishlist.remove(id);
            Ok(wishlist.records().to_vec())
        }

        async fn clear(&self) -> Result<(), GatewayError> {
            self.begin().await?;
            self.wishlist.lock().unwrap().clear();
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use atelier_core::WishlistItem;

    use super::testing::FakeGateway;
    use super::*;
    use crate::entity::CartAttributes;
    use crate::store::MemoryStore;

    fn wishlist(
        store: &MemoryStore,
        gateway: &Arc<FakeGateway>,
        session: &SessionSignal,
    ) -> WishlistSynchronizer<FakeGateway> {
        Synchronizer::new(
            Arc::new(store.clone()),
            Arc::clone(gateway),
            session.clone(),
        )
    }

    fn unavailable() -> GatewayError {
        GatewayError::Unavailable("wishlist".to_string())
    }

    #[tokio::test]
    async fn test_load_without_session_makes_no_calls() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(false));

        sync.load().await;
        assert!(sync.snapshot().items.is_empty());
        assert_eq!(sync.snapshot().phase, SyncPhase::Uninitialized);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_replaces_and_caches() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        gateway
            .wishlist
            .lock()
            .unwrap()
            .insert_or_merge(WishlistItem::new(ProductId::new("p1")));
        let sync = wishlist(&store, &gateway, &SessionSignal::new(true));

        sync.load().await;
        let snapshot = sync.snapshot();
        assert!(snapshot.contains(&ProductId::new("p1")));
        assert_eq!(snapshot.phase, SyncPhase::Ready);
        assert!(!snapshot.loading);
        assert!(store.get("atelier:wishlist:items").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_load_restores_phase() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));

        gateway.fail_next(GatewayError::Timeout);
        sync.load().await;
        let snapshot = sync.snapshot();
        assert_eq!(snapshot.phase, SyncPhase::Uninitialized);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.availability, Availability::RemoteActive);
    }

    #[tokio::test]
    async fn test_unavailable_load_demotes_and_reads_store() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);

        // Seed the cache through a local-only instance
        let seeded = wishlist(&store, &gateway, &session);
        seeded.force_local();
        seeded.add(ProductId::new("p7"), ()).await.unwrap();

        let sync = wishlist(&store, &gateway, &session);
        gateway.fail_next(unavailable());
        sync.load().await;

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.availability, Availability::LocalOnly);
        assert_eq!(snapshot.phase, SyncPhase::Ready);
        assert!(snapshot.contains(&ProductId::new("p7")));
        assert_eq!(
            store.get("atelier:wishlist:remote_available").await.unwrap(),
            Some(serde_json::json!(false))
        );
    }

    #[tokio::test]
    async fn test_add_requires_session() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(false));

        let result = sync.add(ProductId::new("p1"), ()).await;
        assert!(matches!(result, Err(SyncError::NotAuthenticated)));
        assert!(sync.snapshot().items.is_empty());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_add_notifies_subscribers() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));
        let mut rx = sync.subscribe();

        sync.add(ProductId::new("p1"), ()).await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().contains(&ProductId::new("p1")));
        assert!(sync.contains(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_transient_failure_rolls_back() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));

        gateway.fail_next(GatewayError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        let result = sync.add(ProductId::new("p1"), ()).await;
        assert!(matches!(result, Err(SyncError::Transient(_))));
        assert!(!sync.contains(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_gateway_not_authenticated_rolls_back() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));

        gateway.fail_next(GatewayError::NotAuthenticated);
        let result = sync.add(ProductId::new("p1"), ()).await;
        assert!(matches!(result, Err(SyncError::NotAuthenticated)));
        assert!(sync.snapshot().items.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_mutation_keeps_change_and_persists() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);
        let sync = wishlist(&store, &gateway, &session);

        gateway.fail_next(unavailable());
        sync.add(ProductId::new("p1"), ()).await.unwrap();
        assert!(sync.contains(&ProductId::new("p1")));
        assert_eq!(sync.availability(), Availability::LocalOnly);

        // Later operations never reach the gateway
        let calls = gateway.calls();
        sync.add(ProductId::new("p2"), ()).await.unwrap();
        sync.load().await;
        assert_eq!(gateway.calls(), calls);
        assert_eq!(sync.snapshot().items.len(), 2);
    }

    #[tokio::test]
    async fn test_persisted_flag_restored_by_new_instance() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);

        let first = wishlist(&store, &gateway, &session);
        gateway.fail_next(unavailable());
        first.add(ProductId::new("p1"), ()).await.unwrap();

        let calls = gateway.calls();
        let second = wishlist(&store, &gateway, &session);
        second.load().await;
        assert_eq!(second.availability(), Availability::LocalOnly);
        assert!(second.contains(&ProductId::new("p1")));
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_force_local_is_not_persisted() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);

        let offline = wishlist(&store, &gateway, &session);
        offline.force_local();
        offline.add(ProductId::new("p1"), ()).await.unwrap();
        assert_eq!(gateway.calls(), 0);

        let online = wishlist(&store, &gateway, &session);
        online.load().await;
        assert_eq!(online.availability(), Availability::RemoteActive);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_never_rolls_back() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&store, &gateway, &SessionSignal::new(true));
        sync.add(ProductId::new("p1"), ()).await.unwrap();

        gateway.fail_next(GatewayError::Timeout);
        sync.clear().await.unwrap();
        assert!(sync.snapshot().items.is_empty());

        let cached = store.get("atelier:wishlist:items").await.unwrap().unwrap();
        assert_eq!(cached["items"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_clear_requires_session() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(false));
        assert!(matches!(sync.clear().await, Err(SyncError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_session_end_wishlist_drops_cache() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);
        let sync = wishlist(&store, &gateway, &session);
        sync.add(ProductId::new("p1"), ()).await.unwrap();

        let calls = gateway.calls();
        session.end();
        sync.on_session_end().await;
        assert!(sync.snapshot().items.is_empty());
        assert!(store.get("atelier:wishlist:items").await.unwrap().is_none());
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_session_end_cart_keeps_cache() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);
        let cart: CartSynchronizer<FakeGateway> =
            Synchronizer::new(Arc::new(store.clone()), gateway, session.clone());
        cart.add(ProductId::new("p1"), CartAttributes::default())
            .await
            .unwrap();

        session.end();
        cart.on_session_end().await;
        assert!(cart.snapshot().items.is_empty());
        assert!(store.get("atelier:cart:items").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_watch_session_follows_transitions() {
        let gateway = Arc::new(FakeGateway::default());
        gateway
            .wishlist
            .lock()
            .unwrap()
            .insert_or_merge(WishlistItem::new(ProductId::new("p1")));
        let session = SessionSignal::new(false);
        let sync = wishlist(&MemoryStore::new(), &gateway, &session);
        let mut rx = sync.subscribe();
        let task = sync.watch_session();

        session.start();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| s.phase == SyncPhase::Ready),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(sync.contains(&ProductId::new("p1")));

        session.end();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.items.is_empty()))
            .await
            .unwrap()
            .unwrap();

        task.abort();
    }

    #[tokio::test]
    async fn test_overlapping_loads_keep_loading_until_last() {
        let gateway = Arc::new(FakeGateway::default());
        gateway
            .wishlist
            .lock()
            .unwrap()
            .insert_or_merge(WishlistItem::new(ProductId::new("p1")));
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));
        gateway.hold();

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.load().await }
        });
        gateway.wait_for_calls(1).await;
        let second = tokio::spawn({
            let sync = sync.clone();
            async move { sync.load().await }
        });
        gateway.wait_for_calls(2).await;
        assert!(sync.snapshot().loading);
        assert_eq!(sync.snapshot().phase, SyncPhase::Loading);

        gateway.release_one();
        first.await.unwrap();
        let snapshot = sync.snapshot();
        assert!(snapshot.loading, "second load still in flight");
        assert_eq!(snapshot.phase, SyncPhase::Ready);
        assert!(snapshot.contains(&ProductId::new("p1")));

        gateway.fail_next(GatewayError::Timeout);
        gateway.release_one();
        second.await.unwrap();
        let snapshot = sync.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.phase, SyncPhase::Ready);
        assert!(snapshot.contains(&ProductId::new("p1")));
    }

    #[tokio::test]
    async fn test_overlapping_failed_loads_restore_initial_phase() {
        let gateway = Arc::new(FakeGateway::default());
        let sync = wishlist(&MemoryStore::new(), &gateway, &SessionSignal::new(true));
        gateway.hold();
        gateway.fail_next(GatewayError::Timeout);
        gateway.fail_next(GatewayError::Timeout);

        let loads: Vec<_> = (0..2)
            .map(|_| {
                let sync = sync.clone();
                tokio::spawn(async move { sync.load().await })
            })
            .collect();
        gateway.wait_for_calls(2).await;
        gateway.release_one();
        gateway.release_one();
        for load in loads {
            load.await.unwrap();
        }

        let snapshot = sync.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.phase, SyncPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_confirmation_after_logout_is_discarded() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);
        let sync = wishlist(&store, &gateway, &session);
        gateway.hold();

        let pending = tokio::spawn({
            let sync = sync.clone();
            async move { sync.add(ProductId::new("p1"), ()).await }
        });
        gateway.wait_for_calls(1).await;
        assert!(sync.contains(&ProductId::new("p1")));

        session.end();
        sync.on_session_end().await;
        gateway.release_one();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SyncError::NotAuthenticated)));
        assert!(sync.snapshot().items.is_empty());
        assert!(store.get("atelier:wishlist:items").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_from_previous_session_is_discarded() {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        gateway
            .wishlist
            .lock()
            .unwrap()
            .insert_or_merge(WishlistItem::new(ProductId::new("p1")));
        let session = SessionSignal::new(true);
        let sync = wishlist(&store, &gateway, &session);
        gateway.hold();

        let pending = tokio::spawn({
            let sync = sync.clone();
            async move { sync.load().await }
        });
        gateway.wait_for_calls(1).await;

        // Another user signs in before the old answer arrives
        session.end();
        sync.on_session_end().await;
        session.start();
        gateway.release_one();
        pending.await.unwrap();

        let snapshot = sync.snapshot();
        assert!(snapshot.items.is_empty());
        assert!(!snapshot.loading);
        assert!(store.get("atelier:wishlist:items").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_after_logout_does_not_restore() {
        let gateway = Arc::new(FakeGateway::default());
        let session = SessionSignal::new(true);
        let sync = wishlist(&MemoryStore::new(), &gateway, &session);
        sync.add(ProductId::new("p1"), ()).await.unwrap();
        gateway.hold();
        gateway.fail_next(GatewayError::Timeout);

        let pending = tokio::spawn({
            let sync = sync.clone();
            async move { sync.remove(ProductId::new("p1")).await }
        });
        gateway.wait_for_calls(2).await;

        session.end();
        sync.on_session_end().await;
        gateway.release_one();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SyncError::NotAuthenticated)));
        assert!(sync.snapshot().items.is_empty());
    }
}
