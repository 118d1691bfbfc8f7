//! In-process coordination store.
//!
//! # Rust Learning Note
//!
//! ## DashMap as a node tree
//!
//! The tree is kept flat: one `DashMap<String, Node>` keyed by full path.
//! Parent/child structure lives in the path strings themselves, so a lookup
//! is a single hash probe and no lock is ever held across two nodes.
//!
//! ```rust,ignore
//! struct MemoryStore {
//!     nodes: Arc<DashMap<String, Node>>,
//! }
//! ```
//!
//! `MemoryStore` plays the role of the server and is cheap to clone. Every
//! `connect` opens a [`MemorySession`]; closing that session deletes the
//! ephemeral nodes it created, the same way a real store expires a session.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use soul_common::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{ancestors, parent_path, validate_node_path, CoordinationStore, StoreConnector};
use crate::config::StoreSettings;

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,

    /// Session that owns this node if it is ephemeral.
    ephemeral_owner: Option<u64>,
}

/// Thread-safe in-memory node tree shared by all of its sessions.
#[derive(Clone)]
pub struct MemoryStore {
    nodes: Arc<DashMap<String, Node>>,
    available: Arc<AtomicBool>,
    next_session_id: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Opens a new client session.
    pub fn open_session(&self) -> MemorySession {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!("Opened memory store session {}", id);

        MemorySession {
            id,
            store: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates losing (or regaining) the store.
    ///
    /// While unavailable every session operation and every new connect fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Returns true if a node exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Returns the value stored at `path`.
    pub fn get_data(&self, path: &str) -> Option<Vec<u8>> {
        self.nodes.get(path).map(|node| node.data.clone())
    }

    /// Returns true if `path` exists and is owned by a session.
    pub fn is_ephemeral(&self, path: &str) -> bool {
        self.nodes
            .get(path)
            .map(|node| node.ephemeral_owner.is_some())
            .unwrap_or(false)
    }

    /// Session owning the ephemeral node at `path`.
    pub fn ephemeral_owner(&self, path: &str) -> Option<u64> {
        self.nodes.get(path).and_then(|node| node.ephemeral_owner)
    }

    /// Leaf names of the direct children of `path`, sorted.
    pub fn children(&self, path: &str) -> Vec<String> {
        let mut children: Vec<String> = self
            .nodes
            .iter()
            .filter(|entry| parent_path(entry.key()) == Some(path))
            .filter_map(|entry| entry.key().rsplit('/').next().map(str::to_string))
            .collect();
        children.sort();
        children
    }

    /// Returns the number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn insert(&self, path: &str, data: Vec<u8>, ephemeral_owner: Option<u64>) -> Result<()> {
        if let Some(parent) = parent_path(path) {
            if !self.nodes.contains_key(parent) {
                return Err(Error::no_node(parent));
            }
        }

        match self.nodes.entry(path.to_string()) {
            Entry::Occupied(_) => Err(Error::node_exists(path)),
            Entry::Vacant(vacant) => {
                vacant.insert(Node { data, ephemeral_owner });
                Ok(())
            }
        }
    }

    fn insert_if_absent(&self, path: &str, data: Vec<u8>) -> Result<()> {
        match self.insert(path, data, None) {
            Err(Error::NodeExists { .. }) => Ok(()),
            other => other,
        }
    }

    fn remove_session_nodes(&self, session_id: u64) -> usize {
        let before = self.nodes.len();
        self.nodes
            .retain(|_, node| node.ephemeral_owner != Some(session_id));
        before.saturating_sub(self.nodes.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, _settings: &StoreSettings) -> Result<Arc<dyn CoordinationStore>> {
        if !self.is_available() {
            return Err(Error::configuration("memory store is unavailable"));
        }
        Ok(Arc::new(self.open_session()))
    }
}

/// One client session against a [`MemoryStore`].
pub struct MemorySession {
    id: u64,
    store: MemoryStore,
    closed: AtomicBool,
}

impl MemorySession {
    /// Session identifier, as reported by [`MemoryStore::ephemeral_owner`].
    pub fn id(&self) -> u64 {
        self.id
    }

    fn check(&self, operation: &str, path: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable(operation, path, "session closed"));
        }
        if !self.store.is_available() {
            return Err(Error::store_unavailable(operation, path, "connection lost"));
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for MemorySession {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.check("exists", path)?;
        Ok(self.store.exists(path))
    }

    async fn create_persistent(&self, path: &str, value: Option<&[u8]>, recursive: bool) -> Result<()> {
        self.check("create persistent", path)?;
        validate_node_path(path)?;
        let data = value.map(<[u8]>::to_vec).unwrap_or_default();

        if !recursive {
            return self.store.insert(path, data, None);
        }

        for ancestor in ancestors(path) {
            self.store.insert_if_absent(ancestor, Vec::new())?;
        }
        self.store.insert_if_absent(path, data)
    }

    async fn create_ephemeral(&self, path: &str, value: &[u8]) -> Result<()> {
        self.check("create ephemeral", path)?;
        validate_node_path(path)?;
        self.store.insert(path, value.to_vec(), Some(self.id))
    }

    async fn write_data(&self, path: &str, value: &[u8]) -> Result<()> {
        self.check("write data", path)?;
        match self.store.nodes.get_mut(path) {
            Some(mut node) => {
                node.data = value.to_vec();
                Ok(())
            }
            None => Err(Error::no_node(path)),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let removed = self.store.remove_session_nodes(self.id);
        debug!("Closed memory store session {}, removed {} ephemeral nodes", self.id, removed);
        Ok(())
    }
}
