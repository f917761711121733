//! Runs the store conformance suite against the bundled implementations.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use keel_core::database::InMemoryClient;
use keel_test_utils::{FakeDatabaseClient, init_test_logging, run_database_conformance};

#[tokio::test]
async fn in_memory_client_conforms() {
    init_test_logging();
    let client = InMemoryClient::new();
    run_database_conformance(&client, || client.clear().unwrap()).await;
}

#[tokio::test]
async fn fake_client_conforms() {
    init_test_logging();
    let client = FakeDatabaseClient::new();
    run_database_conformance(&client, || client.inner().clear().unwrap()).await;
}
