//! Atelier Commerce - Cart and wishlist state synchronizer.
//!
//! One generic [`Synchronizer`] type keeps an entity collection (the cart or
//! the wishlist) correct across an unreliable network, an optional backend
//! feature, and session transitions.
//!
//! # Architecture
//!
//! - Optimistic local mutation first, subscribers see the change immediately
//! - The remote gateway confirms; its response replaces local state
//! - A "feature not available" response demotes the entity kind to local-only
//!   mode backed by the persisted key-value store, for the rest of the process
//! - Transient failures roll the optimistic change back and are returned
//! - Mutations on the same product are serialized
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_commerce::{
//!     CartAttributes, CommerceConfig, CommerceState, FileStore, HttpGateway, SessionSignal,
//! };
//!
//! let config = CommerceConfig::from_env()?;
//! let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
//! let store = Arc::new(FileStore::new(&config.store_dir));
//! let state = CommerceState::new(store, gateway, SessionSignal::new(false));
//!
//! state.start_session(Some(token)).await;
//! state.cart().add(ProductId::new("p1"), CartAttributes::default()).await?;
//! state.wishlist().toggle(ProductId::new("p2")).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod collection;
pub mod config;
pub mod entity;
pub mod error;
pub mod gateway;
mod locks;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod synchronizer;

pub use collection::Collection;
pub use config::{CommerceConfig, ConfigError, GatewayConfig};
pub use entity::{Cart, CartAttributes, EntityKind, Wishlist};
pub use error::{Result, SyncError};
pub use gateway::{
    CartGateway, CommerceGateway, FailureClass, GatewayError, HttpGateway, SessionCredentials,
};
pub use session::SessionSignal;
pub use snapshot::Snapshot;
pub use state::CommerceState;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use synchronizer::{CartSynchronizer, Synchronizer, WishlistSynchronizer};
