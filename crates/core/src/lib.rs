//! Atelier Core - Shared commerce types.
//!
//! This crate provides the domain types shared by every Atelier component:
//! - `commerce` - Cart and wishlist state synchronizer
//! - `cli` - Command-line driver for the synchronizer
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product identifiers, prices, cart lines, wishlist items and
//!   synchronization statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
