//! Test Scenario 1.1: End-to-end registration
//!
//! An http service registers one route; the gateway-facing tree must hold a
//! durable metadata node and an ephemeral uri node at the agreed paths.

use e2e_tests::assertions::{assert_metadata_node, assert_no_node, assert_uri_node};
use e2e_tests::{contract_record, http_record, RegistryHarness};
use soul_common::RpcType;

#[tokio::test]
async fn test_http_route_registration() {
    println!("\n========================================");
    println!("TEST: End-to-end http registration");
    println!("========================================\n");

    let harness = RegistryHarness::started().await.unwrap();
    let record = http_record("/create", "10.0.0.1", 8080);

    harness.repository.persist_interface(&record).await.unwrap();

    let result = assert_metadata_node(
        &harness,
        "/soul/register/metadata/http/order/order-create",
        &record,
    )
    .and_then(|_| assert_uri_node(&harness, "/soul/register/uri/http/order/10.0.0.1:8080", "10.0.0.1", 8080));

    if let Err(e) = result {
        panic!("Test failed: {}", e);
    }
    println!("✓ TEST PASSED: End-to-end http registration");
}

#[tokio::test]
async fn test_uri_payload_is_projection_of_metadata() {
    let harness = RegistryHarness::started().await.unwrap();
    harness
        .repository
        .persist_interface(&http_record("/create", "10.0.0.1", 8080))
        .await
        .unwrap();

    let uri = harness.json_at("/soul/register/uri/http/order/10.0.0.1:8080").unwrap();
    assert_eq!(uri["host"], "10.0.0.1");
    assert_eq!(uri["port"], 8080);
    assert_eq!(uri["contextPath"], "/order");
    assert_eq!(uri["rpcType"], "http");
    assert!(uri.get("ruleName").is_none());
}

#[tokio::test]
async fn test_uri_nodes_only_for_live_endpoint_types() {
    let harness = RegistryHarness::started().await.unwrap();

    for (port, rpc_type) in (9000u16..).zip(RpcType::ALL) {
        let record = if rpc_type.is_routed_by_path() {
            let mut record = http_record("/create", "10.0.0.1", port);
            record.rpc_type = rpc_type;
            record
        } else {
            contract_record(rpc_type, "create", "10.0.0.1", port)
        };
        harness.repository.persist_interface(&record).await.unwrap();

        let uri_path = format!("/soul/register/uri/{}/order/10.0.0.1:{}", rpc_type, port);
        let result = if rpc_type.has_live_endpoint() {
            assert_uri_node(&harness, &uri_path, "10.0.0.1", port)
        } else {
            assert_no_node(&harness, &format!("/soul/register/uri/{}", rpc_type))
        };
        if let Err(e) = result {
            panic!("{}: {}", rpc_type, e);
        }

        assert_eq!(
            harness.store.children(&format!("/soul/register/metadata/{}/order", rpc_type)).len(),
            1,
            "{} should have one metadata node",
            rpc_type
        );
    }

    assert_eq!(
        harness.store.children("/soul/register/uri"),
        vec!["grpc", "http", "tars"]
    );
}

#[tokio::test]
async fn test_contract_metadata_node_name() {
    let harness = RegistryHarness::started().await.unwrap();
    let record = contract_record(RpcType::Tars, "create", "10.0.0.3", 18015);

    harness.repository.persist_interface(&record).await.unwrap();

    if let Err(e) = assert_metadata_node(
        &harness,
        "/soul/register/metadata/tars/order/order.OrderService.create",
        &record,
    ) {
        panic!("Test failed: {}", e);
    }
}
