//! etcd v3 coordination store.
//!
//! etcd has a flat keyspace, so the tree is emulated:
//!
//! - a node is a key equal to its full path; placeholder parents hold an
//!   empty value;
//! - ephemeral nodes are keys attached to the session lease. The lease TTL is
//!   the configured session timeout and a background task keeps it alive, so
//!   the keys vanish when the process dies or [`EtcdStore::close`] revokes
//!   the lease. If the lease is lost anyway, every later call fails with
//!   `StoreUnavailable`;
//! - "create" is a transaction guarded on `create_revision == 0`, which gives
//!   the same exists-check-and-create atomicity a tree store has.

use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, GetOptions, LeaseKeepAliveStream, LeaseKeeper,
    PutOptions, Txn, TxnOp,
};
use parking_lot::Mutex;
use soul_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::{
    ancestors, parent_path, validate_node_path, CoordinationStore, SessionHealth, StoreConnector,
};
use crate::config::StoreSettings;

/// Shortest interval between two lease keep-alives.
const MIN_KEEP_ALIVE_PERIOD: Duration = Duration::from_millis(500);

/// Connects [`EtcdStore`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtcdConnector;

#[async_trait]
impl StoreConnector for EtcdConnector {
    async fn connect(&self, settings: &StoreSettings) -> Result<Arc<dyn CoordinationStore>> {
        let store = EtcdStore::connect(settings).await?;
        Ok(Arc::new(store))
    }
}

/// One etcd session: a client plus the lease its ephemeral nodes hang off.
pub struct EtcdStore {
    /// Cloning the client shares its underlying channel.
    client: Client,
    lease_id: i64,
    keep_alive_shutdown: Mutex<Option<mpsc::Sender<()>>>,
    health: SessionHealth,
    closed: AtomicBool,
}

impl EtcdStore {
    /// Connects to `settings.server_lists` and opens a session lease.
    ///
    /// Connecting, granting the lease and starting the keep-alive must all
    /// finish within the connect timeout.
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let endpoints = settings.endpoints();
        if endpoints.is_empty() {
            return Err(Error::configuration("serverLists contains no endpoint"));
        }

        let ttl = lease_ttl_secs(settings.session_timeout);
        let options = ConnectOptions::new().with_connect_timeout(settings.connection_timeout);

        let session = async {
            let mut client = Client::connect(endpoints, Some(options)).await?;
            let lease_id = client.lease_grant(ttl, None).await?.id();
            let (keeper, stream) = client.lease_keep_alive(lease_id).await?;
            Ok::<_, etcd_client::Error>((client, lease_id, keeper, stream))
        };

        let (client, lease_id, keeper, stream) =
            tokio::time::timeout(settings.connection_timeout, session)
                .await
                .map_err(|_| {
                    Error::configuration(format!(
                        "Timed out connecting to {} after {:?}",
                        settings.server_lists, settings.connection_timeout
                    ))
                })?
                .map_err(|e| {
                    Error::configuration(format!(
                        "Failed to connect to {}: {}",
                        settings.server_lists, e
                    ))
                })?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let health = SessionHealth::default();
        let period = keep_alive_period(ttl);
        tokio::spawn(keep_lease_alive(
            lease_id,
            keeper,
            stream,
            period,
            health.clone(),
            shutdown_rx,
        ));

        info!(
            "Connected to etcd {} with session lease {} (ttl {}s)",
            settings.server_lists, lease_id, ttl
        );

        Ok(Self {
            client,
            lease_id,
            keep_alive_shutdown: Mutex::new(Some(shutdown_tx)),
            health,
            closed: AtomicBool::new(false),
        })
    }

    /// Lease every ephemeral node of this session is attached to.
    pub fn lease_id(&self) -> i64 {
        self.lease_id
    }

    fn client(&self, operation: &str, path: &str) -> Result<Client> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable(operation, path, "session closed"));
        }
        self.health.check(operation, path)?;
        Ok(self.client.clone())
    }

    /// Puts `value` at `path` only if the key has never been created.
    ///
    /// Returns false if the key already existed.
    async fn put_if_absent(&self, path: &str, value: Vec<u8>, lease: Option<i64>) -> Result<bool> {
        let mut client = self.client("create", path)?;
        let options = lease.map(|id| PutOptions::new().with_lease(id));
        let txn = Txn::new()
            .when(vec![Compare::create_revision(path, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(path, value, options)]);

        let response = client
            .txn(txn)
            .await
            .map_err(|e| Error::store_unavailable("create", path, e.to_string()))?;
        Ok(response.succeeded())
    }

    async fn require_parent(&self, path: &str) -> Result<()> {
        if let Some(parent) = parent_path(path) {
            if !self.exists(parent).await? {
                return Err(Error::no_node(parent));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let mut client = self.client("exists", path)?;
        let response = client
            .get(path, Some(GetOptions::new().with_count_only()))
            .await
            .map_err(|e| Error::store_unavailable("exists", path, e.to_string()))?;
        Ok(response.count() > 0)
    }

    async fn create_persistent(&self, path: &str, value: Option<&[u8]>, recursive: bool) -> Result<()> {
        validate_node_path(path)?;
        let data = value.map(<[u8]>::to_vec).unwrap_or_default();

        if recursive {
            for ancestor in ancestors(path) {
                self.put_if_absent(ancestor, Vec::new(), None).await?;
            }
            self.put_if_absent(path, data, None).await?;
            return Ok(());
        }

        self.require_parent(path).await?;
        if !self.put_if_absent(path, data, None).await? {
            return Err(Error::node_exists(path));
        }
        Ok(())
    }

    async fn create_ephemeral(&self, path: &str, value: &[u8]) -> Result<()> {
        validate_node_path(path)?;
        self.require_parent(path).await?;

        if !self.put_if_absent(path, value.to_vec(), Some(self.lease_id)).await? {
            return Err(Error::node_exists(path));
        }
        debug!("Created ephemeral node {} on lease {}", path, self.lease_id);
        Ok(())
    }

    async fn write_data(&self, path: &str, value: &[u8]) -> Result<()> {
        let mut client = self.client("write data", path)?;
        let txn = Txn::new()
            .when(vec![Compare::create_revision(path, CompareOp::Greater, 0)])
            .and_then(vec![TxnOp::put(path, value.to_vec(), None)]);

        let response = client
            .txn(txn)
            .await
            .map_err(|e| Error::store_unavailable("write data", path, e.to_string()))?;
        if !response.succeeded() {
            return Err(Error::no_node(path));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender stops the keep-alive task.
        self.keep_alive_shutdown.lock().take();

        if self.health.is_lost() {
            info!("Etcd session lease {} already lost, nothing to revoke", self.lease_id);
            return Ok(());
        }

        let mut client = self.client.clone();
        client
            .lease_revoke(self.lease_id)
            .await
            .map_err(|e| Error::store_unavailable("close", "", e.to_string()))?;

        info!("Revoked etcd session lease {}", self.lease_id);
        Ok(())
    }
}

/// Lease TTL in whole seconds, rounded up, at least one.
fn lease_ttl_secs(session_timeout: Duration) -> i64 {
    let millis = session_timeout.as_millis().max(1);
    let secs = (millis + 999) / 1000;
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Keep-alives are sent three times per TTL.
fn keep_alive_period(ttl_secs: i64) -> Duration {
    let millis = u64::try_from(ttl_secs).unwrap_or(1).saturating_mul(1000) / 3;
    Duration::from_millis(millis).max(MIN_KEEP_ALIVE_PERIOD)
}

async fn keep_lease_alive(
    lease_id: i64,
    mut keeper: LeaseKeeper,
    mut stream: LeaseKeepAliveStream,
    period: Duration,
    health: SessionHealth,
    mut shutdown: mpsc::Receiver<()>,
) {
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                debug!("Stopping keep-alive for lease {}", lease_id);
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = keeper.keep_alive().await {
                    warn!("Failed to send keep-alive for lease {}: {}", lease_id, e);
                }
            }
            message = stream.message() => {
                match message {
                    Ok(Some(response)) if response.ttl() <= 0 => {
                        warn!("Session lease {} expired; ephemeral nodes are gone", lease_id);
                        health.mark_lost(format!("session lease {} expired", lease_id));
                        break;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        warn!("Keep-alive stream for lease {} closed", lease_id);
                        health.mark_lost(format!("keep-alive stream for lease {} closed", lease_id));
                        break;
                    }
                    Err(e) => {
                        warn!("Keep-alive for lease {} failed: {}", lease_id, e);
                    }
                }
            }
        }
    }
}
