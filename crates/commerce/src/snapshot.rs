//! Reactive holder of a synchronizer's current state.
//!
//! A thin wrapper over `tokio::sync::watch`: every update replaces the value
//! atomically and wakes subscribers. Updates are synchronous, so no two
//! mutations ever interleave inside one update.

use core::fmt;

use tokio::sync::watch;

use atelier_core::{Availability, ProductId, SyncPhase};

use crate::collection::Collection;
use crate::entity::EntityKind;

/// Point-in-time view of a synchronized collection.
pub struct Snapshot<E: EntityKind> {
    /// Current records.
    pub items: Collection<E>,
    /// True only while a `load()` is in flight.
    pub loading: bool,
    /// Lifecycle phase.
    pub phase: SyncPhase,
    /// Whether the remote gateway is in use.
    pub availability: Availability,
}

impl<E: EntityKind> Snapshot<E> {
    /// Whether any record refers to the product.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.contains(id)
    }

    /// Units of the product across its records.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.items.quantity_of(id)
    }
}

impl<E: EntityKind> Default for Snapshot<E> {
    fn default() -> Self {
        Self {
            items: Collection::new(),
            loading: false,
            phase: SyncPhase::Uninitialized,
            availability: Availability::RemoteActive,
        }
    }
}

impl<E: EntityKind> Clone for Snapshot<E> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            loading: self.loading,
            phase: self.phase,
            availability: self.availability,
        }
    }
}

impl<E: EntityKind> PartialEq for Snapshot<E> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
            && self.loading == other.loading
            && self.phase == other.phase
            && self.availability == other.availability
    }
}

impl<E: EntityKind> fmt::Debug for Snapshot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("items", &self.items)
            .field("loading", &self.loading)
            .field("phase", &self.phase)
            .field("availability", &self.availability)
            .finish()
    }
}

/// Subscribable container for a [`Snapshot`].
pub(crate) struct SnapshotCell<E: EntityKind> {
    tx: watch::Sender<Snapshot<E>>,
}

impl<E: EntityKind> SnapshotCell<E> {
    pub(crate) fn new() -> Self {
        Self {
            tx: watch::Sender::new(Snapshot::default()),
        }
    }

    /// Clone of the current snapshot.
    pub(crate) fn get(&self) -> Snapshot<E> {
        self.tx.borrow().clone()
    }

    /// Read the current snapshot without cloning it.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Snapshot<E>) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<E>> {
        self.tx.subscribe()
    }

    /// Apply `f` atomically and notify subscribers.
    ///
    /// Anything `f` needs to hand back goes through its captures.
    pub(crate) fn update(&self, f: impl FnOnce(&mut Snapshot<E>)) {
        self.tx.send_modify(f);
    }

    /// Apply `f` atomically, notifying subscribers only when it returns true.
    pub(crate) fn update_if(&self, f: impl FnOnce(&mut Snapshot<E>) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Replace the records.
    pub(crate) fn set_items(&self, items: Collection<E>) {
        self.update(|snapshot| snapshot.items = items);
    }
}
