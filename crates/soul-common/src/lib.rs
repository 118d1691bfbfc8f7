//! # Soul Common
//!
//! Common types and errors shared across the Soul register client crates.
//!
//! This crate provides the error taxonomy every registration operation
//! returns and the records that are written into the coordination store.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use types::{MetaDataRegisterDTO, RpcType, URIRegisterDTO};
