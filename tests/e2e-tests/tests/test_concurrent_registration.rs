//! Test Scenario 2.1: Concurrent registration
//!
//! Many tasks register at once through one shared repository. Every distinct
//! address must end up with exactly one liveness node and no caller may see
//! a create conflict.

use e2e_tests::{contract_record, http_record, RegistryHarness};
use soul_common::RpcType;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_distinct_addresses() {
    const INSTANCES: u16 = 64;

    let harness = RegistryHarness::started().await.unwrap();
    let mut handles = Vec::new();

    for i in 0..INSTANCES {
        let repository = Arc::clone(&harness.repository);
        handles.push(tokio::spawn(async move {
            let record = http_record("/create", "10.0.1.1", 20000 + i);
            repository.persist_interface(&record).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let uri_nodes = harness.store.children("/soul/register/uri/http/order");
    assert_eq!(uri_nodes.len(), INSTANCES as usize);
    for i in 0..INSTANCES {
        let path = format!("/soul/register/uri/http/order/10.0.1.1:{}", 20000 + i);
        assert!(harness.store.is_ephemeral(&path), "missing {}", path);
    }

    // All instances share one rule, so one metadata node
    assert_eq!(
        harness.store.children("/soul/register/metadata/http/order"),
        vec!["order-create"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_same_address_registers_once() {
    let harness = RegistryHarness::started().await.unwrap();
    let mut handles = Vec::new();

    for method in ["create", "cancel", "query", "refund", "ship", "track"] {
        let repository = Arc::clone(&harness.repository);
        handles.push(tokio::spawn(async move {
            let record = contract_record(RpcType::Grpc, method, "10.0.2.2", 50051);
            repository.persist_interface(&record).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        harness.store.children("/soul/register/uri/grpc/order"),
        vec!["10.0.2.2:50051"]
    );
    assert_eq!(harness.store.children("/soul/register/metadata/grpc/order").len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_then_close() {
    let harness = RegistryHarness::started().await.unwrap();

    let handles: Vec<_> = (0..16u16)
        .map(|i| {
            let repository = Arc::clone(&harness.repository);
            tokio::spawn(async move {
                let record = http_record(&format!("/rule{}", i), "10.0.3.3", 7000 + i);
                repository.persist_interface(&record).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    harness.repository.close().await.unwrap();

    assert!(harness.store.children("/soul/register/uri/http/order").is_empty());
    assert_eq!(harness.store.children("/soul/register/metadata/http/order").len(), 16);
}
