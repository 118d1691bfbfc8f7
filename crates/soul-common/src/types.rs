//! Registration records shared by the register client and its callers.
//!
//! These types are the payloads written into the coordination store. Their
//! JSON shape (camelCase field names, rpc type wire names) is consumed by the
//! gateway, so renaming a field here is a wire-format change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// RPC style a registered unit is reachable through.
///
/// # Rust Learning Note
///
/// This is an **enum** - a type that can be one of several variants. The
/// `#[serde(rename = ...)]` attributes keep the wire names the gateway
/// expects, while Rust code gets exhaustive `match` checking.
///
/// # Example
/// ```
/// use soul_common::RpcType;
///
/// let rpc_type: RpcType = "springCloud".parse().unwrap();
/// assert!(rpc_type.is_routed_by_path());
/// assert!(!rpc_type.has_live_endpoint());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcType {
    #[serde(rename = "http")]
    Http,

    #[serde(rename = "dubbo")]
    Dubbo,

    #[serde(rename = "sofa")]
    Sofa,

    #[serde(rename = "tars")]
    Tars,

    #[serde(rename = "websocket")]
    WebSocket,

    #[serde(rename = "springCloud")]
    SpringCloud,

    #[serde(rename = "motan")]
    Motan,

    #[serde(rename = "grpc")]
    Grpc,
}

impl RpcType {
    /// All known rpc types, in declaration order.
    pub const ALL: [RpcType; 8] = [
        RpcType::Http,
        RpcType::Dubbo,
        RpcType::Sofa,
        RpcType::Tars,
        RpcType::WebSocket,
        RpcType::SpringCloud,
        RpcType::Motan,
        RpcType::Grpc,
    ];

    /// Returns the wire name of this rpc type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcType::Http => "http",
            RpcType::Dubbo => "dubbo",
            RpcType::Sofa => "sofa",
            RpcType::Tars => "tars",
            RpcType::WebSocket => "websocket",
            RpcType::SpringCloud => "springCloud",
            RpcType::Motan => "motan",
            RpcType::Grpc => "grpc",
        }
    }

    /// Returns true if the gateway routes this kind by context path and rule
    /// name rather than by service contract.
    pub fn is_routed_by_path(&self) -> bool {
        matches!(self, RpcType::Http | RpcType::SpringCloud)
    }

    /// Returns true if instances of this kind expose a network endpoint whose
    /// liveness is published by the register client.
    ///
    /// Other kinds publish metadata only; their liveness is tracked elsewhere.
    pub fn has_live_endpoint(&self) -> bool {
        matches!(self, RpcType::Http | RpcType::Tars | RpcType::Grpc)
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RpcType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RpcType::ALL
            .iter()
            .copied()
            .find(|rpc_type| rpc_type.as_str() == s)
            .ok_or_else(|| Error::validation(format!("Unknown rpc type: {}", s)))
    }
}

impl Default for RpcType {
    fn default() -> Self {
        RpcType::Http
    }
}

/// Description of one registrable callable unit (a route, or a service
/// method).
///
/// `context_path` must begin with `/`. Routed-by-path kinds are named by
/// `context_path` + `rule_name`; contract kinds by `service_name` +
/// `method_name`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetaDataRegisterDTO {
    pub app_name: String,

    /// Context path of the application, e.g. "/order".
    pub context_path: String,

    /// Full request path of the unit, e.g. "/order/create".
    pub path: String,

    pub path_desc: String,

    pub rpc_type: RpcType,

    pub service_name: String,

    pub method_name: String,

    /// Rule name, may contain path separators, e.g. "/create".
    pub rule_name: String,

    pub parameter_types: String,

    /// Protocol-specific extension data, already encoded by the caller.
    pub rpc_ext: String,

    pub enabled: bool,

    pub host: String,

    pub port: u16,

    pub plugin_names: Vec<String>,

    pub register_meta_data: bool,
}

/// Network address at which a registered unit is currently reachable.
///
/// This is a pure projection of [`MetaDataRegisterDTO`]; it is never stored
/// independently of the metadata it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct URIRegisterDTO {
    pub app_name: String,

    pub context_path: String,

    pub rpc_type: RpcType,

    pub host: String,

    pub port: u16,
}

impl From<&MetaDataRegisterDTO> for URIRegisterDTO {
    fn from(metadata: &MetaDataRegisterDTO) -> Self {
        Self {
            app_name: metadata.app_name.clone(),
            context_path: metadata.context_path.clone(),
            rpc_type: metadata.rpc_type,
            host: metadata.host.clone(),
            port: metadata.port,
        }
    }
}

impl fmt::Display for URIRegisterDTO {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
