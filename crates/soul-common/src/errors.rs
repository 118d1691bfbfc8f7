//! Error types for the Soul register client.
//!
//! # Rust Learning Note
//!
//! Rust doesn't have exceptions - it uses `Result<T, E>` for error handling.
//! This module defines the single error type every registration operation
//! returns, so callers can match on *why* a registration failed.
//!
//! ```rust,ignore
//! use soul_common::{Error, Result};
//!
//! fn connect(target: &str) -> Result<()> {
//!     if target.is_empty() {
//!         return Err(Error::configuration("serverLists is required"));
//!     }
//!     Ok(())
//! }
//!
//! fn caller() -> Result<()> {
//!     // The ? operator propagates the error unchanged
//!     connect("localhost:2379")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for register client operations.
///
/// This is a convenience alias so we can write `Result<T>` instead of
/// `Result<T, Error>` throughout the codebase.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for register client operations.
///
/// # Rust Learning Note
///
/// We use the `thiserror` crate to automatically derive error traits.
/// Each variant can carry additional context data, and callers can
/// pattern match on the variant to decide their own retry policy.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid connection settings, or the store could not be
    /// reached within the connect timeout.
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
    },

    /// The coordination store could not be reached during an operation.
    #[error("Store unavailable: {operation} {path}: {reason}")]
    StoreUnavailable {
        operation: String,
        path: String,
        reason: String,
    },

    /// An operation was invoked outside its valid lifecycle state.
    #[error("Illegal state: cannot {operation} while {state}")]
    IllegalState {
        operation: String,
        state: String,
    },

    /// A record violates a precondition of the path scheme.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// A create targeted a node that already exists.
    #[error("Node already exists: {path}")]
    NodeExists {
        path: String,
    },

    /// A write or non-recursive create targeted a missing node.
    #[error("Node does not exist: {path}")]
    NoNode {
        path: String,
    },

    /// Encoding or decoding a node payload failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a StoreUnavailable error.
    pub fn store_unavailable(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::StoreUnavailable {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IllegalState error.
    pub fn illegal_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::IllegalState {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn node_exists(path: impl Into<String>) -> Self {
        Self::NodeExists { path: path.into() }
    }

    pub fn no_node(path: impl Into<String>) -> Self {
        Self::NoNode { path: path.into() }
    }

    /// Returns true if the error came from losing the store connection.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
