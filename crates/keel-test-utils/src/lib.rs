//! Shared test utilities for keel.
//!
//! This crate provides:
//! - [`FakeDatabaseClient`]: in-memory store with call recording and failure injection
//! - [`FakeQueueClient`]: in-memory queue with call recording and failure injection
//! - [`fixtures`]: identifiers and documents shared across tests
//! - [`run_database_conformance`]: behavior suite every store implementation must pass
//!
//! # Example
//!
//! ```rust
//! use keel_core::database::InMemoryClient;
//! use keel_test_utils::run_database_conformance;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = InMemoryClient::new();
//! run_database_conformance(&client, || client.clear().unwrap()).await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fakes;
pub mod fixtures;
pub mod storetest;

pub use fakes::*;
pub use storetest::run_database_conformance;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("keel=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
