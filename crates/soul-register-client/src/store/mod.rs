//! Coordination store capability.
//!
//! The repository talks to the store only through [`CoordinationStore`], and
//! obtains one through a [`StoreConnector`]. Backends are picked from
//! configuration by [`connector_for`].
//!
//! # Rust Learning Note
//!
//! ## Trait objects at the seam
//!
//! ```rust,ignore
//! let store: Arc<dyn CoordinationStore> = connector.connect(&settings).await?;
//! ```
//!
//! `dyn CoordinationStore` lets the repository hold *any* backend behind one
//! pointer. `async-trait` is what makes `async fn` usable in such a trait:
//! each method returns a boxed future, so the trait stays object safe.

pub mod etcd;
pub mod memory;
pub mod zookeeper;

use async_trait::async_trait;
use parking_lot::Mutex;
use soul_common::{Error, Result};
use std::sync::Arc;

use crate::config::{RegisterType, StoreSettings};

pub use etcd::{EtcdConnector, EtcdStore};
pub use memory::{MemorySession, MemoryStore};
pub use zookeeper::{ZookeeperConnector, ZookeeperStore};

/// Hierarchical store with persistent and session-scoped nodes.
///
/// Implementations must be safe to call from many tasks at once; the
/// repository shares one handle between all callers.
///
/// Error contract:
/// - creating a node that exists fails with [`Error::NodeExists`]
///   (except `create_persistent` with `recursive`, which is a no-op then);
/// - writing a missing node, or creating under a missing parent without
///   `recursive`, fails with [`Error::NoNode`];
/// - losing the connection fails with [`Error::StoreUnavailable`].
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Returns true if a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Creates a durable node.
    ///
    /// With `recursive`, missing ancestors are created as empty durable
    /// nodes and an existing node at `path` is left untouched.
    async fn create_persistent(&self, path: &str, value: Option<&[u8]>, recursive: bool) -> Result<()>;

    /// Creates a node removed by the store when this client's session ends.
    async fn create_ephemeral(&self, path: &str, value: &[u8]) -> Result<()>;

    /// Overwrites the value of an existing node.
    async fn write_data(&self, path: &str, value: &[u8]) -> Result<()>;

    /// Ends the session, releasing every ephemeral node it owns.
    async fn close(&self) -> Result<()>;
}

/// Opens sessions against one kind of coordination store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connects using `settings`, failing with [`Error::Configuration`] when
    /// the target is unreachable within the connect timeout.
    async fn connect(&self, settings: &StoreSettings) -> Result<Arc<dyn CoordinationStore>>;
}

/// Returns the connector for a configured backend.
pub fn connector_for(register_type: RegisterType) -> Arc<dyn StoreConnector> {
    match register_type {
        RegisterType::Zookeeper => Arc::new(ZookeeperConnector),
        RegisterType::Etcd => Arc::new(EtcdConnector),
        RegisterType::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Whether a remote store session is still usable.
///
/// Background session upkeep marks the session lost; every later store call
/// then fails with [`Error::StoreUnavailable`] instead of silently writing
/// nodes that no longer belong to a live session.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionHealth {
    lost: Arc<Mutex<Option<String>>>,
}

impl SessionHealth {
    /// Records why the session was lost. The first reason wins.
    pub(crate) fn mark_lost(&self, reason: impl Into<String>) {
        let mut lost = self.lost.lock();
        if lost.is_none() {
            *lost = Some(reason.into());
        }
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.lock().is_some()
    }

    /// Fails with [`Error::StoreUnavailable`] once the session is lost.
    pub(crate) fn check(&self, operation: &str, path: &str) -> Result<()> {
        match &*self.lost.lock() {
            Some(reason) => Err(Error::store_unavailable(operation, path, reason.clone())),
            None => Ok(()),
        }
    }
}

/// Checks that `path` is absolute, with no empty segment and no trailing
/// separator.
pub(crate) fn validate_node_path(path: &str) -> Result<()> {
    let valid = path.len() > 1
        && path.starts_with('/')
        && !path.ends_with('/')
        && !path[1..].split('/').any(str::is_empty);

    if valid {
        Ok(())
    } else {
        Err(Error::validation(format!("Invalid node path: '{}'", path)))
    }
}

/// Parent of a node path, or `None` for top-level nodes (whose parent is the
/// always-present root).
pub(crate) fn parent_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}

/// Every proper ancestor of `path`, nearest the root first.
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .skip(1)
        .map(|(index, _)| &path[..index])
        .collect()
}
