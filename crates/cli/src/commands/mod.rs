//! Command implementations.
//!
//! Output goes through `tracing` at `info` so it shares the subscriber
//! configured in `main`.

pub mod cart;
pub mod wishlist;

use atelier_core::PriceError;
use thiserror::Error;

/// Errors raised by the CLI before reaching the synchronizer.
#[derive(Debug, Error)]
pub enum CliError {
    /// Online mode without a credential.
    #[error("No session token: set ATELIER_API_TOKEN or pass --offline")]
    NoSession,

    /// Quantity of zero.
    #[error("Quantity must be at least 1")]
    ZeroQuantity,

    /// Price or currency could not be parsed.
    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] PriceError),

    /// Empty product identifier.
    #[error("Product identifier cannot be empty")]
    EmptyProductId,
}
