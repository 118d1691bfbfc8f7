//! Test Scenario 3.1: Repository lifecycle
//!
//! Uninitialized → Active → Closed, with registrations rejected outside the
//! active state and store failures surfaced unchanged.

use e2e_tests::{http_record, RegistryHarness};
use soul_common::Error;
use soul_register_client::{ClientRegisterRepository, RegisterCenterConfig, RegisterType, RepositoryState};

#[tokio::test]
async fn test_registration_rejected_outside_active_state() {
    let harness = RegistryHarness::new();
    let record = http_record("/create", "10.0.0.1", 8080);

    let err = harness.repository.persist_interface(&record).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }), "got {}", err);
    assert_eq!(harness.store.node_count(), 0);

    harness.repository.init(&RegistryHarness::config()).await.unwrap();
    harness.repository.close().await.unwrap();
    let nodes_after_close = harness.store.node_count();

    let err = harness.repository.persist_interface(&record).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }), "got {}", err);
    assert_eq!(harness.store.node_count(), nodes_after_close);
    assert_eq!(harness.repository.state(), RepositoryState::Closed);
}

#[tokio::test]
async fn test_closed_repository_cannot_be_reinitialized() {
    let harness = RegistryHarness::started().await.unwrap();
    harness.repository.close().await.unwrap();

    let err = harness.repository.init(&RegistryHarness::config()).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }));
    assert_eq!(harness.repository.state(), RepositoryState::Closed);
}

#[tokio::test]
async fn test_store_outage_leaves_partial_state() {
    let harness = RegistryHarness::started().await.unwrap();
    harness
        .repository
        .persist_interface(&http_record("/create", "10.0.0.1", 8080))
        .await
        .unwrap();

    harness.store.set_available(false);
    let err = harness
        .repository
        .persist_interface(&http_record("/cancel", "10.0.0.2", 8080))
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable(), "got {}", err);

    // Earlier registrations survive; nothing from the failed call was written
    harness.store.set_available(true);
    assert!(harness.store.exists("/soul/register/metadata/http/order/order-create"));
    assert!(!harness.store.exists("/soul/register/metadata/http/order/order-cancel"));
    assert_eq!(harness.repository.state(), RepositoryState::Active);
}

#[tokio::test]
async fn test_memory_backend_from_config() {
    let config = RegisterCenterConfig::load_from_string(
        "registerType: memory\nserverLists: memory://standalone\nprops:\n  zookeeperSessionTimeout: 1000\n",
    )
    .unwrap();
    assert_eq!(config.register_type, RegisterType::Memory);

    let repository = ClientRegisterRepository::connect(&config).await.unwrap();
    repository
        .persist_interface(&http_record("/create", "10.0.0.1", 8080))
        .await
        .unwrap();
    repository.close().await.unwrap();
}
