//! # Soul Register Client
//!
//! Publishes an application's callable surface and network address into a
//! coordination store, where the Soul gateway discovers and routes to it.
//!
//! This crate provides:
//! - Path scheme for metadata and liveness nodes (`path`)
//! - Register center configuration (`config`)
//! - Coordination store capability with ZooKeeper, etcd and in-memory backends (`store`)
//! - The client register repository (`repository`)

pub mod codec;
pub mod config;
pub mod path;
pub mod repository;
pub mod store;

// Re-export commonly used items
pub use config::{RegisterCenterConfig, RegisterType, StoreSettings};
pub use repository::{ClientRegisterRepository, RepositoryState};
pub use store::{CoordinationStore, EtcdConnector, MemoryStore, StoreConnector, ZookeeperConnector};
