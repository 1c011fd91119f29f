//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common commerce concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod status;
pub mod wishlist;

pub use cart::{CartLine, CartLineKey};
pub use id::ProductId;
pub use price::{CurrencyCode, Price, PriceError};
pub use product::ProductSnapshot;
pub use status::*;
pub use wishlist::WishlistItem;
