//! Test Scenario 1.2: Repeated registration
//!
//! Re-registering replaces metadata in place and leaves existing liveness
//! markers alone, whether the repeat comes from the same process or another.

use e2e_tests::assertions::{assert_metadata_node, assert_uri_node};
use e2e_tests::{http_record, RegistryHarness};

const METADATA_PATH: &str = "/soul/register/metadata/http/order/order-create";
const URI_PARENT: &str = "/soul/register/uri/http/order";
const URI_PATH: &str = "/soul/register/uri/http/order/10.0.0.1:8080";

#[tokio::test]
async fn test_metadata_upsert_keeps_single_node_with_latest_value() {
    let harness = RegistryHarness::started().await.unwrap();

    let first = http_record("/create", "10.0.0.1", 8080);
    let mut second = first.clone();
    second.path_desc = "create order v2".to_string();
    second.plugin_names = vec!["rateLimiter".to_string()];

    harness.repository.persist_interface(&first).await.unwrap();
    harness.repository.persist_interface(&second).await.unwrap();

    assert_eq!(
        harness.store.children("/soul/register/metadata/http/order"),
        vec!["order-create"]
    );
    if let Err(e) = assert_metadata_node(&harness, METADATA_PATH, &second) {
        panic!("Test failed: {}", e);
    }
}

#[tokio::test]
async fn test_repeat_registration_keeps_liveness_node() {
    let harness = RegistryHarness::started().await.unwrap();
    let record = http_record("/create", "10.0.0.1", 8080);

    harness.repository.persist_interface(&record).await.unwrap();
    let owner = harness.store.ephemeral_owner(URI_PATH);
    assert!(owner.is_some());

    for _ in 0..3 {
        harness.repository.persist_interface(&record).await.unwrap();
    }

    assert_eq!(harness.store.ephemeral_owner(URI_PATH), owner);
    assert_eq!(harness.store.children(URI_PARENT), vec!["10.0.0.1:8080"]);
    if let Err(e) = assert_uri_node(&harness, URI_PATH, "10.0.0.1", 8080) {
        panic!("Test failed: {}", e);
    }
}

#[tokio::test]
async fn test_second_process_does_not_clobber_liveness_node() {
    let first = RegistryHarness::new();
    first.repository.init(&RegistryHarness::config()).await.unwrap();
    let second = RegistryHarness::on_store(first.store.clone());
    second.repository.init(&RegistryHarness::config()).await.unwrap();

    let record = http_record("/create", "10.0.0.1", 8080);
    first.repository.persist_interface(&record).await.unwrap();
    let owner = first.store.ephemeral_owner(URI_PATH);

    // Same address from another session: no create error, node untouched
    second.repository.persist_interface(&record).await.unwrap();
    assert_eq!(first.store.ephemeral_owner(URI_PATH), owner);

    // Liveness follows the session that created the node
    first.repository.close().await.unwrap();
    assert!(!first.store.exists(URI_PATH));
    assert!(first.store.exists(METADATA_PATH));

    second.repository.close().await.unwrap();
}
