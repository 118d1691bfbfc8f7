//! Path scheme for registration nodes.
//!
//! ```text
//! /soul/register/metadata/<rpcType>/<contextPath>/<metadataNodeName>   (persistent)
//! /soul/register/uri/<rpcType>/<contextPath>/<host:port>               (ephemeral)
//! ```
//!
//! The root segments are shared with the gateway that watches these nodes
//! and must not change on one side only.
//!
//! # Rust Learning Note
//!
//! Every function here is pure: same input, same output, no I/O. That makes
//! the naming rules testable without a coordination store, and lets the
//! repository compute every path *before* it touches the store.

use soul_common::{Error, MetaDataRegisterDTO, Result};

/// Root of every registration node.
pub const ROOT_PATH: &str = "/soul/register";

/// Path separator of the coordination store.
pub const SEPARATOR: char = '/';

/// Joins service and method names for contract-addressed rpc types.
pub const DOT_SEPARATOR: &str = ".";

/// Replaces path separators inside path-routed node names.
pub const DASH_SEPARATOR: &str = "-";

/// Namespace segment for durable metadata nodes.
pub const METADATA_SEGMENT: &str = "metadata";

/// Namespace segment for ephemeral liveness nodes.
pub const URI_SEGMENT: &str = "uri";

/// Builds an absolute path from raw segments.
///
/// Segments may themselves contain separators; empty pieces are dropped so
/// the result never contains `//` or a trailing `/`.
fn join_path(segments: &[&str]) -> String {
    let mut path = String::new();
    for piece in segments
        .iter()
        .flat_map(|segment| segment.split(SEPARATOR))
        .filter(|piece| !piece.is_empty())
    {
        path.push(SEPARATOR);
        path.push_str(piece);
    }
    if path.is_empty() {
        path.push(SEPARATOR);
    }
    path
}

/// Namespace root for all metadata nodes of one (rpc type, context) pair.
///
/// `context_path` is the context with its leading separator already
/// stripped, e.g. `"order"`.
pub fn metadata_parent_path(rpc_type: &str, context_path: &str) -> String {
    join_path(&[ROOT_PATH, METADATA_SEGMENT, rpc_type, context_path])
}

/// Namespace root for all liveness nodes of one (rpc type, context) pair.
pub fn uri_parent_path(rpc_type: &str, context_path: &str) -> String {
    join_path(&[ROOT_PATH, URI_SEGMENT, rpc_type, context_path])
}

/// Joins a parent path and a leaf name.
pub fn real_node_path(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, name)
}

/// Removes the leading separator, failing if there is none.
///
/// Context paths and service names must begin with the separator; a value
/// without one is a [`Error::Validation`], never truncated.
pub fn strip_leading_separator(value: &str) -> Result<&str> {
    value.strip_prefix(SEPARATOR).ok_or_else(|| {
        Error::validation(format!(
            "'{}' must begin with '{}'",
            value, SEPARATOR
        ))
    })
}

/// Leaf name of the metadata node for `metadata`.
///
/// - path-routed kinds (`http`, `springCloud`): context path and rule name,
///   leading separator stripped, remaining separators replaced by dashes.
///   `/order` + `/create` gives `order-create`.
/// - everything else: `serviceName.methodName` with the leading separator
///   stripped.
pub fn metadata_node_name(metadata: &MetaDataRegisterDTO) -> Result<String> {
    if metadata.rpc_type.is_routed_by_path() {
        let joined = format!("{}{}{}", metadata.context_path, SEPARATOR, metadata.rule_name);
        let name = strip_leading_separator(&joined)?
            .split(SEPARATOR)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(DASH_SEPARATOR);
        if name.is_empty() {
            return Err(Error::validation(format!(
                "context path '{}' and rule name '{}' give an empty node name",
                metadata.context_path, metadata.rule_name
            )));
        }
        Ok(name)
    } else {
        let joined = [metadata.service_name.as_str(), metadata.method_name.as_str()]
            .join(DOT_SEPARATOR);
        Ok(strip_leading_separator(&joined)?.to_string())
    }
}

/// Leaf name of the liveness node for `metadata`: `host:port`.
pub fn uri_node_name(metadata: &MetaDataRegisterDTO) -> String {
    format!("{}:{}", metadata.host, metadata.port)
}
