//! Client register repository.
//!
//! Publishes [`MetaDataRegisterDTO`] records into a coordination store:
//!
//! ```text
//! persist_interface(metadata)
//!     ↓
//! 1. Require an active session (init called, close not called)
//! 2. Compute every path and payload (no store access yet)
//! 3. Upsert the durable metadata node            (always)
//! 4. Create the ephemeral uri node if absent     (http, tars, grpc only)
//! 5. Log success
//! ```
//!
//! # Rust Learning Note
//!
//! ## Two locks, two jobs
//!
//! ```rust,ignore
//! lifecycle: RwLock<Lifecycle>,     // parking_lot, held for nanoseconds
//! uri_lock: tokio::sync::Mutex<()>, // held across store round-trips
//! ```
//!
//! A `parking_lot` guard must never live across an `.await` (it would block
//! the executor thread, and it is not `Send`). So the lifecycle lock is only
//! taken to clone the `Arc` of the store handle out, and dropped right away.
//!
//! The uri section *does* await while locked, which is exactly what
//! `tokio::sync::Mutex` is for: waiting tasks yield instead of blocking.
//! Metadata upserts run outside it and never queue behind uri registration.

use parking_lot::RwLock;
use soul_common::{Error, MetaDataRegisterDTO, Result, RpcType, URIRegisterDTO};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::codec;
use crate::config::{RegisterCenterConfig, RegisterType};
use crate::path;
use crate::store::{connector_for, CoordinationStore, StoreConnector};

/// Lifecycle state of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// `init` has not succeeded yet.
    Uninitialized,
    /// Connected; registrations are accepted.
    Active,
    /// `close` was called. Terminal.
    Closed,
}

impl fmt::Display for RepositoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryState::Uninitialized => write!(f, "uninitialized"),
            RepositoryState::Active => write!(f, "active"),
            RepositoryState::Closed => write!(f, "closed"),
        }
    }
}

enum Lifecycle {
    Uninitialized,
    Active(Arc<dyn CoordinationStore>),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> RepositoryState {
        match self {
            Lifecycle::Uninitialized => RepositoryState::Uninitialized,
            Lifecycle::Active(_) => RepositoryState::Active,
            Lifecycle::Closed => RepositoryState::Closed,
        }
    }
}

/// Paths and payloads for one `persist_interface` call.
struct Registration {
    rpc_type: RpcType,
    metadata_parent: String,
    metadata_node: String,
    metadata_payload: Vec<u8>,
    uri: Option<UriRegistration>,
}

struct UriRegistration {
    parent: String,
    node: String,
    payload: Vec<u8>,
}

impl Registration {
    /// Validates `metadata` and derives everything the store writes need.
    fn prepare(metadata: &MetaDataRegisterDTO) -> Result<Self> {
        let rpc_type = metadata.rpc_type;
        let context_path = path::strip_leading_separator(&metadata.context_path)?;

        let metadata_parent = path::metadata_parent_path(rpc_type.as_str(), context_path);
        let metadata_node = path::real_node_path(&metadata_parent, &path::metadata_node_name(metadata)?);

        let uri = if rpc_type.has_live_endpoint() {
            if metadata.host.trim().is_empty() || metadata.port == 0 {
                return Err(Error::validation(format!(
                    "{} registration needs a reachable host and port, got '{}:{}'",
                    rpc_type, metadata.host, metadata.port
                )));
            }
            let parent = path::uri_parent_path(rpc_type.as_str(), context_path);
            let node = path::real_node_path(&parent, &path::uri_node_name(metadata));
            Some(UriRegistration {
                parent,
                node,
                payload: codec::encode(&URIRegisterDTO::from(metadata))?,
            })
        } else {
            None
        };

        Ok(Self {
            rpc_type,
            metadata_parent,
            metadata_node,
            metadata_payload: codec::encode(metadata)?,
            uri,
        })
    }
}

/// Publishes service metadata and liveness markers into a coordination store.
///
/// One instance owns one store session for its whole life:
/// `Uninitialized → Active → Closed`. The instance is meant to be shared
/// (`Arc<ClientRegisterRepository>`) by every task that registers.
///
/// # Example
///
/// ```rust,no_run
/// use soul_common::{MetaDataRegisterDTO, RpcType};
/// use soul_register_client::{ClientRegisterRepository, RegisterCenterConfig, RegisterType};
///
/// # async fn run() -> soul_common::Result<()> {
/// let config = RegisterCenterConfig::new(RegisterType::Etcd, "http://127.0.0.1:2379");
/// let repository = ClientRegisterRepository::for_register_type(config.register_type);
/// repository.init(&config).await?;
///
/// repository
///     .persist_interface(&MetaDataRegisterDTO {
///         rpc_type: RpcType::Http,
///         context_path: "/order".to_string(),
///         rule_name: "/create".to_string(),
///         host: "10.0.0.1".to_string(),
///         port: 8080,
///         ..Default::default()
///     })
///     .await?;
///
/// repository.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientRegisterRepository {
    connector: Arc<dyn StoreConnector>,
    lifecycle: RwLock<Lifecycle>,
    uri_lock: Mutex<()>,
}

impl ClientRegisterRepository {
    /// Creates an uninitialized repository that will connect through
    /// `connector`.
    pub fn new(connector: impl StoreConnector + 'static) -> Self {
        Self::with_connector(Arc::new(connector))
    }

    /// Creates an uninitialized repository from a shared connector.
    pub fn with_connector(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            uri_lock: Mutex::new(()),
        }
    }

    /// Creates an uninitialized repository for a configured backend.
    pub fn for_register_type(register_type: RegisterType) -> Self {
        Self::with_connector(connector_for(register_type))
    }

    /// Creates a repository for `config.register_type` and initializes it.
    pub async fn connect(config: &RegisterCenterConfig) -> Result<Self> {
        let repository = Self::for_register_type(config.register_type);
        repository.init(config).await?;
        Ok(repository)
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> RepositoryState {
        self.lifecycle.read().state()
    }

    /// Opens the store session.
    ///
    /// Fails with [`Error::Configuration`] if the settings are invalid or the
    /// store is unreachable within the connect timeout, and with
    /// [`Error::IllegalState`] if the repository was already initialized.
    /// No retry is attempted.
    pub async fn init(&self, config: &RegisterCenterConfig) -> Result<()> {
        self.require_state("init", RepositoryState::Uninitialized)?;
        let settings = config.store_settings()?;

        let store = self.connector.connect(&settings).await?;

        let rejected = {
            let mut lifecycle = self.lifecycle.write();
            if matches!(*lifecycle, Lifecycle::Uninitialized) {
                *lifecycle = Lifecycle::Active(Arc::clone(&store));
                None
            } else {
                Some(lifecycle.state())
            }
        };

        // Lost a race with a concurrent init (or a close); drop our session.
        if let Some(state) = rejected {
            store.close().await?;
            return Err(Error::illegal_state("init", state.to_string()));
        }

        info!(
            "{:?} register client initialized: {} (session timeout {:?}, connect timeout {:?})",
            config.register_type,
            settings.server_lists,
            settings.session_timeout,
            settings.connection_timeout
        );
        Ok(())
    }

    /// Publishes one registrable unit.
    ///
    /// The metadata node is always upserted. The uri liveness node is only
    /// registered for rpc types with a live endpoint. Store failures are
    /// returned unchanged; whatever was already written stays written.
    pub async fn persist_interface(&self, metadata: &MetaDataRegisterDTO) -> Result<()> {
        let store = self.active_store("persist interface")?;
        let registration = Registration::prepare(metadata)?;

        self.register_metadata(store.as_ref(), &registration).await?;
        if let Some(uri) = &registration.uri {
            self.register_uri(store.as_ref(), uri).await?;
        }

        info!("{} client register success: {:?}", registration.rpc_type, metadata);
        Ok(())
    }

    /// Releases the store session.
    ///
    /// Ephemeral uri nodes owned by the session disappear with it. Fails with
    /// [`Error::IllegalState`] unless the repository is active.
    pub async fn close(&self) -> Result<()> {
        let store = {
            let mut lifecycle = self.lifecycle.write();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
                Lifecycle::Active(store) => store,
                other => {
                    let state = other.state();
                    *lifecycle = other;
                    return Err(Error::illegal_state("close", state.to_string()));
                }
            }
        };

        store.close().await?;
        info!("Register client closed");
        Ok(())
    }

    fn require_state(&self, operation: &str, expected: RepositoryState) -> Result<()> {
        let state = self.state();
        if state != expected {
            return Err(Error::illegal_state(operation, state.to_string()));
        }
        Ok(())
    }

    fn active_store(&self, operation: &str) -> Result<Arc<dyn CoordinationStore>> {
        match &*self.lifecycle.read() {
            Lifecycle::Active(store) => Ok(Arc::clone(store)),
            other => Err(Error::illegal_state(operation, other.state().to_string())),
        }
    }

    /// Creates or overwrites the metadata node. Last writer wins.
    async fn register_metadata(
        &self,
        store: &dyn CoordinationStore,
        registration: &Registration,
    ) -> Result<()> {
        let parent = &registration.metadata_parent;
        let node = &registration.metadata_node;
        let payload = registration.metadata_payload.as_slice();

        if !store.exists(parent).await? {
            store.create_persistent(parent, None, true).await?;
        }

        if store.exists(node).await? {
            store.write_data(node, payload).await?;
            debug!("Updated metadata node {}", node);
            return Ok(());
        }

        match store.create_persistent(node, Some(payload), false).await {
            Ok(()) => {
                debug!("Created metadata node {}", node);
                Ok(())
            }
            // A concurrent upsert of the same rule created it first.
            Err(Error::NodeExists { .. }) => {
                store.write_data(node, payload).await?;
                debug!("Updated metadata node {} after concurrent create", node);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Creates the uri liveness node if it does not exist yet.
    ///
    /// Serialized per repository; an existing node is never touched so its
    /// session association stays intact.
    async fn register_uri(&self, store: &dyn CoordinationStore, uri: &UriRegistration) -> Result<()> {
        let _guard = self.uri_lock.lock().await;

        if !store.exists(&uri.parent).await? {
            store.create_persistent(&uri.parent, None, true).await?;
        }

        if store.exists(&uri.node).await? {
            return Ok(());
        }

        match store.create_ephemeral(&uri.node, &uri.payload).await {
            Ok(()) => {
                debug!("Created uri node {}", uri.node);
                Ok(())
            }
            // Another session registered the same address first.
            Err(Error::NodeExists { .. }) => {
                debug!("Uri node {} created concurrently by another session", uri.node);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
