//! Full-graph reconciliation.
//!
//! One pass in family order restores:
//! - each convolution's `sizeIn` from the previous convolution's `sizeOut`
//!   (pooling blocks are skipped);
//! - each pooling block's `channels` from the nearest preceding convolution;
//! - the first neural layer's `sizeIn` from the flattened convolution output;
//! - each later neural layer's `sizeIn` from its predecessor's `sizeOut`.
//!
//! Only derived values are written, and every write reads user-set values
//! (`sizeOut`, kernel, stride), so a second pass changes nothing.

use serde::{Deserialize, Serialize};

use netforge_core::node::BlockParams;
use netforge_core::{ArchitectureGraph, Family, NodeId, ShapeConfig};

use crate::spatial::derived_input_features;

/// A derived value the engine rewrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub node: NodeId,
    pub param: String,
    pub old: u32,
    pub new: u32,
}

/// Pure form: returns a reconciled copy and leaves `graph` untouched.
pub fn reconcile(graph: &ArchitectureGraph, config: &ShapeConfig) -> ArchitectureGraph {
    let mut out = graph.clone();
    reconcile_in_place(&mut out, config);
    out
}

/// Reconciles `graph` in place, returning the writes it made.
pub fn reconcile_in_place(graph: &mut ArchitectureGraph, config: &ShapeConfig) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();

    let mut last_conv_out: Option<u32> = None;
    for id in graph.family_ids(Family::Spatial) {
        let conv_out = match graph.node(&id).map(|n| &n.params) {
            Some(BlockParams::Convolutional(c)) => Some(c.size_out),
            Some(BlockParams::Pooling(_)) => None,
            _ => continue,
        };
        match (conv_out, last_conv_out) {
            (Some(out), prev) => {
                if let Some(prev) = prev {
                    set_size_in(graph, &id, prev, &mut adjustments);
                }
                last_conv_out = Some(out);
            }
            (None, Some(prev)) => set_channels(graph, &id, prev, &mut adjustments),
            (None, None) => {}
        }
    }

    if let Some(features) = derived_input_features(graph, config) {
        if let Some(first) = graph.family_ids(Family::Neural).into_iter().next() {
            set_size_in(graph, &first, features, &mut adjustments);
        }
    }

    let mut prev_out: Option<u32> = None;
    for id in graph.family_ids(Family::Neural) {
        if let Some(prev) = prev_out {
            set_size_in(graph, &id, prev, &mut adjustments);
        }
        prev_out = graph.node(&id).and_then(|n| n.params.size_out());
    }

    adjustments
}

/// Writes `sizeIn` if it differs, recording the change.
pub(crate) fn set_size_in(
    graph: &mut ArchitectureGraph,
    id: &NodeId,
    value: u32,
    adjustments: &mut Vec<Adjustment>,
) {
    let old = graph.update_params(id, |p| {
        let slot = p.size_in_mut()?;
        let old = *slot;
        *slot = value;
        Some(old)
    });
    if let Ok(Some(old)) = old {
        if old != value {
            adjustments.push(Adjustment {
                node: id.clone(),
                param: "sizeIn".to_string(),
                old,
                new: value,
            });
        }
    }
}

/// Writes a pooling block's pass-through `channels` if it differs.
pub(crate) fn set_channels(
    graph: &mut ArchitectureGraph,
    id: &NodeId,
    value: u32,
    adjustments: &mut Vec<Adjustment>,
) {
    let old = graph.update_params(id, |p| match p {
        BlockParams::Pooling(pool) => {
            let old = pool.channels;
            pool.channels = value;
            Some(old)
        }
        _ => None,
    });
    if let Ok(Some(old)) = old {
        if old != value {
            adjustments.push(Adjustment {
                node: id.clone(),
                param: "channels".to_string(),
                old,
                new: value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::node::{ConvParams, DenseParams, HiddenParams, Node, PoolParams, PoolType};

    fn conv(id: &str, seq: u32, size_in: u32, size_out: u32) -> Node {
        Node::new(
            id,
            seq,
            BlockParams::Convolutional(ConvParams {
                size_in,
                size_out,
                kernel_size: 3,
                padding: 1,
            }),
        )
    }

    fn pool(id: &str, seq: u32, channels: u32) -> Node {
        Node::new(
            id,
            seq,
            BlockParams::Pooling(PoolParams {
                channels,
                kernel_size: 2,
                stride: 2,
                pool_type: PoolType::Max,
            }),
        )
    }

    fn dense(id: &str, seq: u32, size_in: u32, size_out: u32) -> Node {
        let p = DenseParams { size_in, size_out };
        let params = match seq {
            0 => BlockParams::Input(p),
            _ => BlockParams::Output(p),
        };
        Node::new(id, seq, params)
    }

    fn hidden(id: &str, seq: u32, size_in: u32, size_out: u32) -> Node {
        Node::new(
            id,
            seq,
            BlockParams::Hidden(HiddenParams {
                size_in,
                size_out,
                activation: Default::default(),
            }),
        )
    }

    fn size_in(g: &ArchitectureGraph, id: &str) -> u32 {
        g.node(&id.into()).and_then(|n| n.params.sizes()).map(|s| s.0).unwrap()
    }

    fn inconsistent_cnn() -> ArchitectureGraph {
        let mut g = ArchitectureGraph::new();
        g.add_node(conv("conv-1", 0, 3, 32)).unwrap();
        g.add_node(pool("pool-1", 1, 7)).unwrap();
        g.add_node(conv("conv-2", 2, 5, 64)).unwrap();
        g.add_node(pool("pool-2", 3, 9)).unwrap();
        g.add_node(dense("input-1", 0, 12, 128)).unwrap();
        g.add_node(hidden("hidden-1", 1, 1, 32)).unwrap();
        g.add_node(dense("output-1", 2, 1, 10)).unwrap();
        g
    }

    #[test]
    fn restores_all_invariants() {
        let mut g = inconsistent_cnn();
        let adjustments = reconcile_in_place(&mut g, &ShapeConfig::default());

        assert_eq!(size_in(&g, "conv-1"), 3, "first conv keeps its input channels");
        assert_eq!(size_in(&g, "conv-2"), 32);
        assert_eq!(g.node(&"pool-1".into()).unwrap().params.get("channels"), Some(32u32.into()));
        assert_eq!(g.node(&"pool-2".into()).unwrap().params.get("channels"), Some(64u32.into()));
        assert_eq!(size_in(&g, "input-1"), 65536);
        assert_eq!(size_in(&g, "hidden-1"), 128);
        assert_eq!(size_in(&g, "output-1"), 32);
        assert_eq!(adjustments.len(), 6);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let config = ShapeConfig::default();
        let once = reconcile(&inconsistent_cnn(), &config);
        let mut twice = once.clone();
        assert!(reconcile_in_place(&mut twice, &config).is_empty());
        assert_eq!(once.to_document(), twice.to_document());
    }

    #[test]
    fn pure_form_leaves_input_untouched() {
        let g = inconsistent_cnn();
        let before = g.to_document();
        let _ = reconcile(&g, &ShapeConfig::default());
        assert_eq!(g.to_document(), before);
    }

    #[test]
    fn pool_before_any_conv_keeps_channels() {
        let mut g = ArchitectureGraph::new();
        g.add_node(pool("pool-0", 0, 5)).unwrap();
        g.add_node(conv("conv-1", 1, 3, 16)).unwrap();
        reconcile_in_place(&mut g, &ShapeConfig::default());
        assert_eq!(g.node(&"pool-0".into()).unwrap().params.get("channels"), Some(5u32.into()));
    }

    #[test]
    fn without_convs_first_neural_layer_is_free() {
        let mut g = ArchitectureGraph::new();
        g.add_node(dense("input-1", 0, 784, 128)).unwrap();
        g.add_node(dense("output-1", 1, 3, 10)).unwrap();
        let adj = reconcile_in_place(&mut g, &ShapeConfig::default());
        assert_eq!(size_in(&g, "input-1"), 784);
        assert_eq!(size_in(&g, "output-1"), 128);
        assert_eq!(
            adj,
            vec![Adjustment {
                node: "output-1".into(),
                param: "sizeIn".into(),
                old: 3,
                new: 128
            }]
        );
    }

    #[test]
    fn respects_configured_initial_size() {
        let mut g = ArchitectureGraph::new();
        g.add_node(conv("conv-1", 0, 3, 8)).unwrap();
        g.add_node(pool("pool-1", 1, 8)).unwrap();
        g.add_node(dense("input-1", 0, 1, 4)).unwrap();
        let config = ShapeConfig {
            initial_spatial_size: 32,
            ..ShapeConfig::default()
        };
        reconcile_in_place(&mut g, &config);
        assert_eq!(size_in(&g, "input-1"), 8 * 16 * 16);
    }
}
