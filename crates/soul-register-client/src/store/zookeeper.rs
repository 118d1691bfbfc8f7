//! ZooKeeper coordination store.
//!
//! Nodes map one to one onto znodes. Ephemeral nodes belong to the client
//! session; the ensemble removes them when the session ends, either through
//! [`ZookeeperStore::close`] or by expiry after the session timeout.

use async_trait::async_trait;
use parking_lot::Mutex;
use soul_common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zookeeper_client as zk;

use super::{ancestors, validate_node_path, CoordinationStore, SessionHealth, StoreConnector};
use crate::config::StoreSettings;

/// Connects [`ZookeeperStore`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZookeeperConnector;

#[async_trait]
impl StoreConnector for ZookeeperConnector {
    async fn connect(&self, settings: &StoreSettings) -> Result<Arc<dyn CoordinationStore>> {
        let store = ZookeeperStore::connect(settings).await?;
        Ok(Arc::new(store))
    }
}

/// One ZooKeeper session.
pub struct ZookeeperStore {
    /// `None` once closed. Dropping the last client handle ends the session.
    client: Mutex<Option<zk::Client>>,
    cluster: String,
    health: SessionHealth,
}

impl ZookeeperStore {
    /// Connects to `settings.server_lists` (`host:port[,host:port...]`).
    ///
    /// The session must be established within the connect timeout.
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let endpoints = settings.endpoints();
        if endpoints.is_empty() {
            return Err(Error::configuration("serverLists contains no endpoint"));
        }
        let cluster = endpoints.join(",");

        let client = tokio::time::timeout(
            settings.connection_timeout,
            zk::Client::connector()
                .session_timeout(settings.session_timeout)
                .connection_timeout(settings.connection_timeout)
                .connect(&cluster),
        )
        .await
        .map_err(|_| {
            Error::configuration(format!(
                "Timed out connecting to {} after {:?}",
                cluster, settings.connection_timeout
            ))
        })?
        .map_err(|e| Error::configuration(format!("Failed to connect to {}: {}", cluster, e)))?;

        info!(
            "Connected to zookeeper {} (session timeout {:?})",
            cluster, settings.session_timeout
        );

        Ok(Self {
            client: Mutex::new(Some(client)),
            cluster,
            health: SessionHealth::default(),
        })
    }

    fn client(&self, operation: &str, path: &str) -> Result<zk::Client> {
        self.health.check(operation, path)?;
        self.client
            .lock()
            .clone()
            .ok_or_else(|| Error::store_unavailable(operation, path, "session closed"))
    }

    fn fail(&self, operation: &str, path: &str, error: zk::Error) -> Error {
        if ends_session(&error) {
            warn!("Zookeeper session to {} lost during {} {}: {}", self.cluster, operation, path, error);
            self.health.mark_lost(error.to_string());
        }
        map_error(operation, path, error)
    }

    async fn create(&self, operation: &str, path: &str, data: &[u8], mode: zk::CreateMode) -> Result<()> {
        let client = self.client(operation, path)?;
        let options = mode.with_acls(zk::Acls::anyone_all());

        client
            .create(path, data, &options)
            .await
            .map(|_| ())
            .map_err(|e| self.fail(operation, path, e))
    }

    async fn create_if_absent(&self, path: &str, data: &[u8]) -> Result<()> {
        match self.create("create persistent", path, data, zk::CreateMode::Persistent).await {
            Err(Error::NodeExists { .. }) => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl CoordinationStore for ZookeeperStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let client = self.client("exists", path)?;
        let stat = client
            .check_stat(path)
            .await
            .map_err(|e| self.fail("exists", path, e))?;
        Ok(stat.is_some())
    }

    async fn create_persistent(&self, path: &str, value: Option<&[u8]>, recursive: bool) -> Result<()> {
        validate_node_path(path)?;
        let data = value.unwrap_or_default();

        if !recursive {
            return self.create("create persistent", path, data, zk::CreateMode::Persistent).await;
        }

        for ancestor in ancestors(path) {
            self.create_if_absent(ancestor, &[]).await?;
        }
        self.create_if_absent(path, data).await
    }

    async fn create_ephemeral(&self, path: &str, value: &[u8]) -> Result<()> {
        validate_node_path(path)?;
        self.create("create ephemeral", path, value, zk::CreateMode::Ephemeral).await?;
        debug!("Created ephemeral znode {}", path);
        Ok(())
    }

    async fn write_data(&self, path: &str, value: &[u8]) -> Result<()> {
        let client = self.client("write data", path)?;
        client
            .set_data(path, value, None)
            .await
            .map(|_| ())
            .map_err(|e| self.fail("write data", path, e))
    }

    async fn close(&self) -> Result<()> {
        if self.client.lock().take().is_some() {
            info!("Closed zookeeper session to {}", self.cluster);
        }
        Ok(())
    }
}

/// Maps a client error onto the store error contract.
fn map_error(operation: &str, path: &str, error: zk::Error) -> Error {
    match error {
        zk::Error::NodeExists => Error::node_exists(path),
        zk::Error::NoNode => Error::no_node(path),
        other => Error::store_unavailable(operation, path, other.to_string()),
    }
}

/// Errors after which the session and its ephemeral nodes are gone.
fn ends_session(error: &zk::Error) -> bool {
    matches!(error, zk::Error::SessionExpired | zk::Error::ClientClosed)
}
