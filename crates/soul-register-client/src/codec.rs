//! Node payload encoding.
//!
//! Payloads are JSON so the gateway can read them without sharing Rust types.

use serde::{de::DeserializeOwned, Serialize};
use soul_common::Result;

/// Encodes a record into the bytes stored on a node.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a node payload back into a record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
