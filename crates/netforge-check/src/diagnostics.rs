//! Shape diagnostics.
//!
//! [`validate_graph`] scans the whole graph and reports every violation at
//! once, without modifying anything. Reconciliation repairs all of these
//! except [`ShapeViolation::InvalidValue`] and
//! [`ShapeViolation::SpatialCollapse`], which need a user edit.

use serde::{Deserialize, Serialize};

use netforge_core::node::BlockParams;
use netforge_core::{ArchitectureGraph, CoreError, Family, NodeId, ShapeConfig};

use crate::spatial::{derived_input_features, spatial_dims};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeViolation {
    /// A layer's input size does not match its predecessor's output size.
    #[error("{node}: sizeIn {actual} does not match {previous} sizeOut {expected}")]
    ChainMismatch {
        family: Family,
        node: NodeId,
        previous: NodeId,
        expected: u32,
        actual: u32,
    },

    /// A pooling block does not pass through the preceding convolution's channels.
    #[error("{node}: channels {actual} does not match {conv} sizeOut {expected}")]
    PassThroughMismatch {
        node: NodeId,
        conv: NodeId,
        expected: u32,
        actual: u32,
    },

    /// The first neural layer does not accept the flattened convolution output.
    #[error("{node}: sizeIn {actual} should be {expected} (flattened convolution output)")]
    DerivedSizeMismatch {
        node: NodeId,
        expected: u32,
        actual: u32,
    },

    /// Pooling shrank the spatial size to zero.
    #[error("spatial size collapses to 0 at {node}")]
    SpatialCollapse { node: NodeId },

    /// A stored value lies outside its parameter domain.
    #[error("{node}: invalid '{param}': {reason}")]
    InvalidValue {
        node: NodeId,
        param: String,
        reason: String,
    },

    /// Two blocks of one family share a sequence index, so their order is
    /// only fixed by insertion.
    #[error("{family:?} blocks {first} and {second} share sequence index {index}")]
    DuplicateSequenceIndex {
        family: Family,
        index: u32,
        first: NodeId,
        second: NodeId,
    },
}

/// Reports every shape violation in `graph`.
pub fn validate_graph(graph: &ArchitectureGraph, config: &ShapeConfig) -> Vec<ShapeViolation> {
    let mut violations = Vec::new();

    for node in graph.nodes() {
        for err in node.params.domain_violations() {
            if let CoreError::InvalidParameterValue { param, reason } = err {
                violations.push(ShapeViolation::InvalidValue {
                    node: node.id.clone(),
                    param,
                    reason,
                });
            }
        }
    }

    for family in [Family::Neural, Family::Spatial] {
        let members: Vec<_> = graph.family(family).collect();
        for pair in members.windows(2) {
            if pair[0].sequence_index == pair[1].sequence_index {
                violations.push(ShapeViolation::DuplicateSequenceIndex {
                    family,
                    index: pair[0].sequence_index,
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }
    }

    let mut last_conv: Option<(&NodeId, u32)> = None;
    let mut pools_seen = 0usize;
    let dims = spatial_dims(graph, config);
    for node in graph.family(Family::Spatial) {
        match &node.params {
            BlockParams::Convolutional(c) => {
                if let Some((prev, out)) = last_conv {
                    if c.size_in != out {
                        violations.push(ShapeViolation::ChainMismatch {
                            family: Family::Spatial,
                            node: node.id.clone(),
                            previous: prev.clone(),
                            expected: out,
                            actual: c.size_in,
                        });
                    }
                }
                last_conv = Some((&node.id, c.size_out));
            }
            BlockParams::Pooling(p) => {
                pools_seen += 1;
                if let Some((conv, out)) = last_conv {
                    if p.channels != out {
                        violations.push(ShapeViolation::PassThroughMismatch {
                            node: node.id.clone(),
                            conv: conv.clone(),
                            expected: out,
                            actual: p.channels,
                        });
                    }
                }
                // Report only the pool where the size first hits zero.
                if dims.get(pools_seen) == Some(&0) && dims.get(pools_seen - 1) != Some(&0) {
                    violations.push(ShapeViolation::SpatialCollapse {
                        node: node.id.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    let neural: Vec<_> = graph.family(Family::Neural).collect();
    if let (Some(first), Some(expected)) = (neural.first(), derived_input_features(graph, config)) {
        if let Some((actual, _)) = first.params.sizes() {
            if actual != expected {
                violations.push(ShapeViolation::DerivedSizeMismatch {
                    node: first.id.clone(),
                    expected,
                    actual,
                });
            }
        }
    }
    for pair in neural.windows(2) {
        if let (Some((_, out)), Some((size_in, _))) = (pair[0].params.sizes(), pair[1].params.sizes()) {
            if size_in != out {
                violations.push(ShapeViolation::ChainMismatch {
                    family: Family::Neural,
                    node: pair[1].id.clone(),
                    previous: pair[0].id.clone(),
                    expected: out,
                    actual: size_in,
                });
            }
        }
    }

    violations
}
