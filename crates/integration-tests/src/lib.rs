//! Integration tests for the Atelier synchronizer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```
//!
//! No external services are needed.
//!
//! # Test Categories
//!
//! - `sync_properties` - behavioural properties against [`MockBackend`]
//! - `http_gateway` - `HttpGateway` end to end against [`FakeServer`]

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

pub mod backend;
pub mod server;

pub use backend::{Failure, MockBackend};
pub use server::FakeServer;
