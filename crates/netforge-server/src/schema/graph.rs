//! Graph view and edit request/response types.

use serde::{Deserialize, Serialize};

use netforge_check::{Adjustment, EditOutcome, ShapeViolation};
use netforge_core::{Edge, EdgeId, Node, NodeId, ParamValue, Position};

/// `GET /projects/{id}/graph`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResponse {
    pub project_id: i64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub families: FamiliesView,
    pub revision: String,
}

/// Family members in sequence order.
#[derive(Debug, Clone, Serialize)]
pub struct FamiliesView {
    pub neural: Vec<NodeId>,
    pub spatial: Vec<NodeId>,
}

/// `POST /projects/{id}/nodes`
#[derive(Debug, Clone, Deserialize)]
pub struct InsertBlockRequest {
    /// Editor type string, e.g. `"convolutionalBlock"`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub label: Option<String>,
}

/// `PATCH /projects/{id}/nodes/{node_id}`: a parameter edit, a move on the
/// canvas, or both.
#[derive(Debug, Clone, Deserialize)]
pub struct EditNodeRequest {
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub value: Option<ParamValue>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeResponse {
    pub node: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<EditOutcome>,
    pub revision: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteNodeResponse {
    pub removed: Node,
    pub adjustments: Vec<Adjustment>,
    pub revision: String,
}

/// `POST /projects/{id}/edges`
#[derive(Debug, Clone, Deserialize)]
pub struct AddEdgeRequest {
    #[serde(default)]
    pub id: Option<EdgeId>,
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeResponse {
    pub edge: Edge,
    pub revision: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub adjustments: Vec<Adjustment>,
    pub revision: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub valid: bool,
    pub violations: Vec<ShapeViolation>,
}
