//! Stable identifiers for blocks and connections.
//!
//! The editor assigns string ids (`conv-2`, `reactflow__edge-a-b`) that stay
//! fixed across edits and round trips through storage, so both ids are
//! newtypes over `String` rather than graph indices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable block identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Stable connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    /// Builds the id the editor gives a freshly drawn connection.
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        EdgeId(format!("edge-{}-{}", source, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<String> for EdgeId {
    fn from(s: String) -> Self {
        EdgeId(s)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        EdgeId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::new("conv-1")), "conv-1");
    }

    #[test]
    fn edge_id_between() {
        let e = EdgeId::between(&"input-1".into(), &"hidden-1".into());
        assert_eq!(e.as_str(), "edge-input-1-hidden-1");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&NodeId::new("pool-3")).unwrap();
        assert_eq!(json, "\"pool-3\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId::new("pool-3"));
    }
}
