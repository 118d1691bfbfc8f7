//! Register center configuration.
//!
//! ```yaml
//! registerType: zookeeper
//! serverLists: "127.0.0.1:2181"
//! props:
//!   zookeeperSessionTimeout: 5000
//!   zookeeperConnectionTimeout: 3000
//! ```
//!
//! The timeouts are ZooKeeper session and connection timeouts. The etcd
//! backend reads the same keys for its lease TTL and connect timeout.

use serde::{Deserialize, Deserializer, Serialize};
use soul_common::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Property key for the session timeout, in milliseconds.
pub const SESSION_TIMEOUT_KEY: &str = "zookeeperSessionTimeout";

/// Property key for the connect timeout, in milliseconds.
pub const CONNECTION_TIMEOUT_KEY: &str = "zookeeperConnectionTimeout";

/// Default for both timeouts when the property is absent.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Which coordination store backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    /// ZooKeeper, with native ephemeral znodes.
    Zookeeper,

    /// etcd v3, with ephemeral nodes bound to a session lease.
    Etcd,

    /// In-process tree; nothing leaves the process.
    Memory,
}

impl Default for RegisterType {
    fn default() -> Self {
        RegisterType::Zookeeper
    }
}

/// Top-level register center configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCenterConfig {
    #[serde(default)]
    pub register_type: RegisterType,

    /// Connection target, e.g. a comma separated endpoint list.
    #[serde(default)]
    pub server_lists: String,

    /// Backend tuning properties. Scalar YAML values are kept as strings.
    #[serde(default, deserialize_with = "deserialize_props")]
    pub props: HashMap<String, String>,
}

/// Connection settings resolved from a [`RegisterCenterConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub server_lists: String,
    pub session_timeout: Duration,
    pub connection_timeout: Duration,
}

impl StoreSettings {
    /// Splits the connection target into individual endpoints.
    pub fn endpoints(&self) -> Vec<String> {
        self.server_lists
            .split(',')
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl RegisterCenterConfig {
    /// Creates a configuration with default properties.
    pub fn new(register_type: RegisterType, server_lists: impl Into<String>) -> Self {
        Self {
            register_type,
            server_lists: server_lists.into(),
            props: HashMap::new(),
        }
    }

    /// Sets a property, returning the updated configuration.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: RegisterCenterConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse YAML configuration: {}", e)))?;

        config.store_settings()?;
        Ok(config)
    }

    /// Resolves and validates the connection settings.
    pub fn store_settings(&self) -> Result<StoreSettings> {
        if self.server_lists.trim().is_empty() {
            return Err(Error::configuration("serverLists is required"));
        }

        Ok(StoreSettings {
            server_lists: self.server_lists.trim().to_string(),
            session_timeout: self.timeout_prop(SESSION_TIMEOUT_KEY)?,
            connection_timeout: self.timeout_prop(CONNECTION_TIMEOUT_KEY)?,
        })
    }

    fn timeout_prop(&self, key: &str) -> Result<Duration> {
        let Some(raw) = self.props.get(key) else {
            return Ok(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        };

        let millis: u64 = raw.trim().parse().map_err(|_| {
            Error::configuration(format!("{} must be an integer of milliseconds, got '{}'", key, raw))
        })?;
        if millis == 0 {
            return Err(Error::configuration(format!("{} must be greater than 0", key)));
        }

        Ok(Duration::from_millis(millis))
    }
}

fn deserialize_props<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;
    use serde_yaml::Value;

    let raw = HashMap::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "property '{}' must be a scalar, got {:?}",
                        key, other
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}
