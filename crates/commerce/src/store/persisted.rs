//! Typed, namespaced access to the key-value store for one entity kind.
//!
//! Storage failures never escape this module: they are logged at `warn` and
//! reads degrade to "absent".

use core::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use atelier_core::Availability;

use super::KeyValueStore;
use crate::entity::EntityKind;

/// Envelope format version written by this build.
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CachedCollection<T> {
    version: u32,
    saved_at: DateTime<Utc>,
    items: T,
}

/// Storage keys of one entity kind.
pub(crate) fn items_key(kind: &str) -> String {
    format!("atelier:{kind}:items")
}

pub(crate) fn availability_key(kind: &str) -> String {
    format!("atelier:{kind}:remote_available")
}

pub(crate) struct Persistence<E: EntityKind> {
    store: Arc<dyn KeyValueStore>,
    items_key: String,
    availability_key: String,
    _kind: PhantomData<fn() -> E>,
}

impl<E: EntityKind> Persistence<E> {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            items_key: items_key(E::NAME),
            availability_key: availability_key(E::NAME),
            _kind: PhantomData,
        }
    }

    /// Cached records, `None` when absent or unreadable.
    pub(crate) async fn read_collection(&self) -> Option<Vec<E::Record>> {
        let value = match self.store.get(&self.items_key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(kind = E::NAME, error = %e, "Failed to read cached collection");
                return None;
            }
        };

        let version = value.get("version").and_then(Value::as_u64);
        if version != Some(u64::from(CACHE_VERSION)) {
            warn!(kind = E::NAME, ?version, "Ignoring cached collection with unknown version");
            return None;
        }

        match serde_json::from_value::<CachedCollection<Vec<E::Record>>>(value) {
            Ok(cached) => {
                debug!(
                    kind = E::NAME,
                    count = cached.items.len(),
                    saved_at = %cached.saved_at,
                    "Cache hit"
                );
                Some(cached.items)
            }
            Err(e) => {
                warn!(kind = E::NAME, error = %e, "Ignoring corrupt cached collection");
                None
            }
        }
    }

    pub(crate) async fn write_collection(&self, records: &[E::Record]) {
        let envelope = CachedCollection {
            version: CACHE_VERSION,
            saved_at: Utc::now(),
            items: records,
        };
        let value = match serde_json::to_value(&envelope) {
            Ok(value) => value,
            Err(e) => {
                warn!(kind = E::NAME, error = %e, "Failed to encode collection");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.items_key, value).await {
            warn!(kind = E::NAME, error = %e, "Failed to persist collection");
        }
    }

    pub(crate) async fn remove_collection(&self) {
        if let Err(e) = self.store.remove(&self.items_key).await {
            warn!(kind = E::NAME, error = %e, "Failed to remove cached collection");
        }
    }

    /// Persisted availability, `None` when never recorded.
    pub(crate) async fn read_availability(&self) -> Option<Availability> {
        match self.store.get(&self.availability_key).await {
            Ok(Some(Value::Bool(true))) => Some(Availability::RemoteActive),
            Ok(Some(Value::Bool(false))) => Some(Availability::LocalOnly),
            Ok(Some(other)) => {
                warn!(kind = E::NAME, value = %other, "Ignoring malformed availability flag");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(kind = E::NAME, error = %e, "Failed to read availability flag");
                None
            }
        }
    }

    pub(crate) async fn write_availability(&self, availability: Availability) {
        let value = Value::Bool(availability.is_remote());
        if let Err(e) = self.store.set(&self.availability_key, value).await {
            warn!(kind = E::NAME, error = %e, "Failed to persist availability flag");
        }
    }
}
