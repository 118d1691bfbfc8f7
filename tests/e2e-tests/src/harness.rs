//! Repository wired to an inspectable in-memory store.

use soul_common::Result;
use soul_register_client::{ClientRegisterRepository, MemoryStore, RegisterCenterConfig, RegisterType};
use std::sync::Arc;

/// A memory store plus a repository connected to it.
///
/// The store outlives the repository session, so tests can look at what a
/// closed session left behind.
pub struct RegistryHarness {
    pub store: MemoryStore,
    pub repository: Arc<ClientRegisterRepository>,
}

impl RegistryHarness {
    /// Creates an uninitialized repository over a fresh store.
    pub fn new() -> Self {
        Self::on_store(MemoryStore::new())
    }

    /// Creates an uninitialized repository over an existing store.
    ///
    /// Several harnesses on one store behave like several processes
    /// registering against the same coordination service.
    pub fn on_store(store: MemoryStore) -> Self {
        let repository = Arc::new(ClientRegisterRepository::new(store.clone()));
        Self { store, repository }
    }

    /// Creates and initializes a repository over a fresh store.
    pub async fn started() -> Result<Self> {
        let harness = Self::new();
        harness.repository.init(&Self::config()).await?;
        Ok(harness)
    }

    /// Configuration used by every harness.
    pub fn config() -> RegisterCenterConfig {
        RegisterCenterConfig::new(RegisterType::Memory, "memory://e2e")
    }

    /// Decoded JSON payload of the node at `path`.
    pub fn json_at(&self, path: &str) -> Option<serde_json::Value> {
        self.store
            .get_data(path)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }
}

impl Default for RegistryHarness {
    fn default() -> Self {
        Self::new()
    }
}
