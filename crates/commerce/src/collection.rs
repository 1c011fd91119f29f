//! Ordered, deduplicated entity collection.
//!
//! Records are unique by [`EntityKind::Key`]. Insertion order is kept for
//! display and carries no meaning otherwise.

use core::fmt;
use core::num::NonZeroU32;

use rust_decimal::Decimal;

use atelier_core::{CartLineKey, ProductId};

use crate::entity::{Cart, EntityKind, Wishlist};

/// Ordered collection of records, unique by key.
pub struct Collection<E: EntityKind> {
    records: Vec<E::Record>,
}

/// State of one key before a local mutation, used to roll it back.
pub(crate) struct Undo<E: EntityKind> {
    key: E::Key,
    previous: Option<(usize, E::Record)>,
}

impl<E: EntityKind> fmt::Debug for Undo<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Undo")
            .field("key", &self.key)
            .field("previous", &self.previous)
            .finish()
    }
}

impl<E: EntityKind> Collection<E> {
    /// An empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Build a collection from records, keeping the first record of each key.
    pub fn from_records(records: impl IntoIterator<Item = E::Record>) -> Self {
        let mut collection = Self::new();
        for record in records {
            if collection.position(&E::key(&record)).is_none() {
                collection.records.push(record);
            }
        }
        collection
    }

    /// Records in display order.
    #[must_use]
    pub fn records(&self) -> &[E::Record] {
        &self.records
    }

    /// Iterate over records in display order.
    pub fn iter(&self) -> impl Iterator<Item = &E::Record> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the collection holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the collection, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<E::Record> {
        self.records
    }

    /// Record with the given key.
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Option<&E::Record> {
        self.records.iter().find(|r| E::key(r) == *key)
    }

    /// Whether any record refers to the product.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.records.iter().any(|r| E::record_identifier(r) == id)
    }

    /// Units of the product across all of its records.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.records
            .iter()
            .filter(|r| E::record_identifier(r) == id)
            .map(E::quantity)
            .fold(0, u32::saturating_add)
    }

    fn position(&self, key: &E::Key) -> Option<usize> {
        self.records.iter().position(|r| E::key(r) == *key)
    }

    fn snapshot_of(&self, key: E::Key) -> Undo<E> {
        let previous = self
            .position(&key)
            .and_then(|i| self.records.get(i).map(|r| (i, r.clone())));
        Undo { key, previous }
    }

    /// Insert a record, or merge it into the record with the same key.
    pub(crate) fn insert_or_merge(&mut self, record: E::Record) -> Undo<E> {
        let undo = self.snapshot_of(E::key(&record));
        match undo.previous.as_ref().map(|(i, _)| *i) {
            Some(i) => {
                if let Some(existing) = self.records.get_mut(i) {
                    E::merge(existing, record);
                }
            }
            None => self.records.push(record),
        }
        undo
    }

    /// Remove the record with the given key, if present.
    pub(crate) fn remove(&mut self, key: &E::Key) -> Undo<E> {
        let undo = self.snapshot_of(key.clone());
        if let Some((i, _)) = &undo.previous {
            self.records.remove(*i);
        }
        undo
    }

    /// Apply `f` to the record with the given key, if present.
    pub(crate) fn update(&mut self, key: &E::Key, f: impl FnOnce(&mut E::Record)) -> Undo<E> {
        let undo = self.snapshot_of(key.clone());
        if let Some((i, _)) = &undo.previous
            && let Some(record) = self.records.get_mut(*i)
        {
            f(record);
        }
        undo
    }

    /// Put a key back into the state recorded by `undo`.
    pub(crate) fn restore(&mut self, undo: Undo<E>) {
        let current = self.position(&undo.key);
        match (current, undo.previous) {
            (Some(i), None) => {
                self.records.remove(i);
            }
            (Some(i), Some((_, record))) => {
                if let Some(slot) = self.records.get_mut(i) {
                    *slot = record;
                }
            }
            (None, Some((i, record))) => {
                let at = i.min(self.records.len());
                self.records.insert(at, record);
            }
            (None, None) => {}
        }
    }

    /// Remove every record.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

impl Collection<Cart> {
    /// Sum of unit price times quantity, from the product snapshots.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.records.iter().map(atelier_core::CartLine::line_total).sum()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.records
            .iter()
            .map(|line| line.quantity.get())
            .fold(0, u32::saturating_add)
    }

    /// Replace the quantity of a line, if present.
    pub(crate) fn set_quantity(&mut self, key: &CartLineKey, quantity: NonZeroU32) -> Undo<Cart> {
        self.update(key, |line| line.quantity = quantity)
    }
}

impl Collection<Wishlist> {
    /// Number of saved items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.records.len()
    }
}

impl<E: EntityKind> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityKind> Clone for Collection<E> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
        }
    }
}

impl<E: EntityKind> PartialEq for Collection<E> {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<E: EntityKind> fmt::Debug for Collection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &E::NAME)
            .field("records", &self.records)
            .finish()
    }
}

impl<E: EntityKind> FromIterator<E::Record> for Collection<E> {
    fn from_iter<I: IntoIterator<Item = E::Record>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
