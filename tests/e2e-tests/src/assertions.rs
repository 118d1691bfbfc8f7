//! Custom assertions for E2E tests

use crate::harness::RegistryHarness;
use soul_common::MetaDataRegisterDTO;

/// Assert that a durable metadata node holds exactly `expected`
pub fn assert_metadata_node(
    harness: &RegistryHarness,
    path: &str,
    expected: &MetaDataRegisterDTO,
) -> Result<(), String> {
    let Some(bytes) = harness.store.get_data(path) else {
        return Err(format!(
            "Metadata node '{}' does not exist. Nodes under parent: {:?}",
            path,
            siblings(harness, path)
        ));
    };

    if harness.store.is_ephemeral(path) {
        return Err(format!("Metadata node '{}' is ephemeral", path));
    }

    let stored: MetaDataRegisterDTO = serde_json::from_slice(&bytes)
        .map_err(|e| format!("Metadata node '{}' is not a metadata record: {}", path, e))?;

    if &stored == expected {
        Ok(())
    } else {
        Err(format!(
            "Metadata node '{}' holds {:#?}, expected {:#?}",
            path, stored, expected
        ))
    }
}

/// Assert that an ephemeral uri node exists for `host:port`
pub fn assert_uri_node(harness: &RegistryHarness, path: &str, host: &str, port: u16) -> Result<(), String> {
    let Some(value) = harness.json_at(path) else {
        return Err(format!(
            "Uri node '{}' does not exist. Nodes under parent: {:?}",
            path,
            siblings(harness, path)
        ));
    };

    if !harness.store.is_ephemeral(path) {
        return Err(format!("Uri node '{}' is not ephemeral", path));
    }

    if value["host"] == host && value["port"] == port {
        Ok(())
    } else {
        Err(format!(
            "Uri node '{}' holds {}, expected host={} port={}",
            path, value, host, port
        ))
    }
}

/// Assert that nothing exists at `path`
pub fn assert_no_node(harness: &RegistryHarness, path: &str) -> Result<(), String> {
    if harness.store.exists(path) {
        Err(format!("Expected no node at '{}', found {:?}", path, harness.json_at(path)))
    } else {
        Ok(())
    }
}

fn siblings(harness: &RegistryHarness, path: &str) -> Vec<String> {
    match path.rfind('/') {
        Some(index) if index > 0 => harness.store.children(&path[..index]),
        _ => Vec::new(),
    }
}
