//! Single-parameter edits with forward shape propagation.
//!
//! An edit is validated against the registry schema, written, and then
//! cascaded strictly forward through the edited block's family:
//! - convolution `sizeOut` feeds the next convolution's `sizeIn` and the
//!   `channels` of a pooling block directly after it;
//! - neural `sizeOut` feeds the next neural layer's `sizeIn`;
//! - any change to convolution outputs or pooling geometry moves the first
//!   neural layer's derived `sizeIn`.
//!
//! A full [`reconcile_in_place`] pass follows, so invariants broken before
//! the edit are repaired too. Nothing upstream of the edited block changes.

use serde::{Deserialize, Serialize};

use netforge_core::{ArchitectureGraph, BlockKind, CoreError, Family, NodeId, ParamValue, ShapeConfig};

use crate::reconcile::{reconcile_in_place, set_channels, set_size_in, Adjustment};
use crate::spatial::derived_input_features;

/// What an edit changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOutcome {
    pub node: NodeId,
    pub param: String,
    pub previous: Option<ParamValue>,
    pub value: ParamValue,
    /// Derived values rewritten by propagation, in the order they were made.
    pub adjustments: Vec<Adjustment>,
}

/// Applies `param = value` to `node_id` and propagates the consequences.
///
/// Besides the registry parameters, `sequenceIndex` (moves the block within
/// its family) and `label` are accepted.
pub fn apply_edit(
    graph: &mut ArchitectureGraph,
    node_id: &NodeId,
    param: &str,
    value: ParamValue,
    config: &ShapeConfig,
) -> Result<EditOutcome, CoreError> {
    let node = graph.get_node(node_id)?;
    let kind = node.kind().ok_or_else(|| CoreError::UnknownBlockKind {
        kind: node.params.kind_name().to_string(),
    })?;

    let mut adjustments = Vec::new();
    let previous = match param {
        "sequenceIndex" => {
            let previous = ParamValue::from(node.sequence_index);
            let index = value
                .as_u32()
                .ok_or_else(|| CoreError::InvalidParameterValue {
                    param: param.to_string(),
                    reason: format!("expected a non-negative integer, got {}", value),
                })?;
            graph.set_sequence_index(node_id, index)?;
            Some(previous)
        }
        "label" => {
            let previous = ParamValue::Text(node.label.clone());
            let label = value
                .as_str()
                .ok_or_else(|| CoreError::InvalidParameterValue {
                    param: param.to_string(),
                    reason: format!("expected text, got {}", value),
                })?
                .to_string();
            graph.set_label(node_id, label)?;
            Some(previous)
        }
        _ => {
            let previous = node.params.get(param);
            if param == "sizeIn" && size_in_is_derived(graph, node_id, kind, config) {
                return Err(CoreError::ReadOnlyParameter {
                    kind: kind.as_str().to_string(),
                    param: param.to_string(),
                });
            }
            graph.update_params(node_id, |p| p.set(param, &value))??;
            cascade(graph, node_id, kind, param, config, &mut adjustments);
            previous
        }
    };

    adjustments.extend(reconcile_in_place(graph, config));

    Ok(EditOutcome {
        node: node_id.clone(),
        param: param.to_string(),
        previous,
        value,
        adjustments,
    })
}

/// `sizeIn` is user-owned only at the head of a chain: the first convolution,
/// and the first neural layer when no convolution feeds it.
fn size_in_is_derived(
    graph: &ArchitectureGraph,
    node_id: &NodeId,
    kind: BlockKind,
    config: &ShapeConfig,
) -> bool {
    match kind {
        BlockKind::Convolutional => graph
            .family(Family::Spatial)
            .take_while(|n| &n.id != node_id)
            .any(|n| n.kind() == Some(BlockKind::Convolutional)),
        BlockKind::Input | BlockKind::Hidden | BlockKind::Output => {
            let first = graph.family(Family::Neural).next().map(|n| &n.id);
            first != Some(node_id) || derived_input_features(graph, config).is_some()
        }
        _ => false,
    }
}

fn cascade(
    graph: &mut ArchitectureGraph,
    node_id: &NodeId,
    kind: BlockKind,
    param: &str,
    config: &ShapeConfig,
    adjustments: &mut Vec<Adjustment>,
) {
    let size_out = graph.node(node_id).and_then(|n| n.params.size_out());

    match (kind, param, size_out) {
        (BlockKind::Convolutional, "sizeOut", Some(out)) => {
            let spatial = graph.family_ids(Family::Spatial);
            if let Some(pos) = spatial.iter().position(|id| id == node_id) {
                let after = &spatial[pos + 1..];
                if let Some(next) = after.first() {
                    if is_kind(graph, next, BlockKind::Pooling) {
                        set_channels(graph, next, out, adjustments);
                    }
                }
                if let Some(next_conv) = after
                    .iter()
                    .find(|id| is_kind(graph, id, BlockKind::Convolutional))
                {
                    set_size_in(graph, next_conv, out, adjustments);
                }
            }
        }
        (BlockKind::Input | BlockKind::Hidden | BlockKind::Output, "sizeOut", Some(out)) => {
            let neural = graph.family_ids(Family::Neural);
            if let Some(pos) = neural.iter().position(|id| id == node_id) {
                if let Some(next) = neural.get(pos + 1) {
                    set_size_in(graph, next, out, adjustments);
                }
            }
        }
        _ => {}
    }

    let touches_derived_size = matches!(
        (kind, param),
        (BlockKind::Convolutional, "sizeOut")
            | (BlockKind::Pooling, "kernelSize" | "stride")
    );
    if touches_derived_size {
        if let Some(features) = derived_input_features(graph, config) {
            if let Some(first) = graph.family_ids(Family::Neural).into_iter().next() {
                set_size_in(graph, &first, features, adjustments);
            }
        }
    }
}

fn is_kind(graph: &ArchitectureGraph, id: &NodeId, kind: BlockKind) -> bool {
    graph.node(id).and_then(|n| n.kind()) == Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insert::insert_block;

    fn size_in(g: &ArchitectureGraph, id: &str) -> u32 {
        g.node(&id.into()).and_then(|n| n.params.sizes()).map(|s| s.0).unwrap()
    }

    fn channels(g: &ArchitectureGraph, id: &str) -> Option<ParamValue> {
        g.node(&id.into()).and_then(|n| n.params.get("channels"))
    }

    /// conv-1, pool-1, conv-2, pool-2 feeding input-1, hidden-1, output-1.
    fn cnn() -> ArchitectureGraph {
        let config = ShapeConfig::default();
        let mut g = ArchitectureGraph::new();
        for kind in [
            BlockKind::Convolutional,
            BlockKind::Pooling,
            BlockKind::Convolutional,
            BlockKind::Pooling,
            BlockKind::Input,
            BlockKind::Hidden,
            BlockKind::Output,
        ] {
            insert_block(&mut g, kind, None, &config).unwrap();
        }
        g
    }

    #[test]
    fn conv_size_out_cascades_forward() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        let outcome = apply_edit(&mut g, &"conv-1".into(), "sizeOut", 64u32.into(), &config).unwrap();

        assert_eq!(outcome.previous, Some(6u32.into()));
        assert_eq!(channels(&g, "pool-1"), Some(64u32.into()));
        assert_eq!(size_in(&g, "conv-2"), 64);
        assert_eq!(size_in(&g, "conv-1"), 3, "upstream untouched");
        let touched: Vec<_> = outcome.adjustments.iter().map(|a| a.node.as_str().to_string()).collect();
        assert_eq!(touched, vec!["pool-1", "conv-2"]);
    }

    #[test]
    fn last_conv_drives_derived_input_size() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        apply_edit(&mut g, &"conv-2".into(), "sizeOut", 64u32.into(), &config).unwrap();
        assert_eq!(channels(&g, "pool-2"), Some(64u32.into()));
        assert_eq!(size_in(&g, "input-1"), 65536);
    }

    #[test]
    fn pooling_geometry_moves_derived_size_only() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        let before_hidden = size_in(&g, "hidden-1");
        let outcome = apply_edit(&mut g, &"pool-2".into(), "stride", 1u32.into(), &config).unwrap();
        // 128 -> 64 -> 63
        let last_conv = g.node(&"conv-2".into()).and_then(|n| n.params.size_out()).unwrap();
        assert_eq!(size_in(&g, "input-1"), last_conv * 63 * 63);
        assert_eq!(size_in(&g, "hidden-1"), before_hidden);
        assert_eq!(outcome.adjustments.len(), 1);
    }

    #[test]
    fn neural_size_out_feeds_next_layer() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        apply_edit(&mut g, &"hidden-1".into(), "sizeOut", 100u32.into(), &config).unwrap();
        assert_eq!(size_in(&g, "output-1"), 100);
    }

    #[test]
    fn unrelated_params_do_not_cascade() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        let outcome = apply_edit(&mut g, &"hidden-1".into(), "activation", "tanh".into(), &config).unwrap();
        assert!(outcome.adjustments.is_empty());
        let outcome = apply_edit(&mut g, &"conv-1".into(), "padding", 0u32.into(), &config).unwrap();
        assert!(outcome.adjustments.is_empty());
    }

    #[test]
    fn derived_size_in_is_read_only() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        for id in ["conv-2", "input-1", "hidden-1"] {
            let err = apply_edit(&mut g, &id.into(), "sizeIn", 5u32.into(), &config).unwrap_err();
            assert!(matches!(err, CoreError::ReadOnlyParameter { .. }), "{id}: {err:?}");
        }
        apply_edit(&mut g, &"conv-1".into(), "sizeIn", 1u32.into(), &config).unwrap();
        assert_eq!(size_in(&g, "conv-1"), 1);
    }

    #[test]
    fn rejected_values_leave_graph_unchanged() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        let before = g.to_document();
        let err = apply_edit(&mut g, &"pool-1".into(), "kernelSize", ParamValue::Float(-2.0), &config).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameterValue { .. }));
        let err = apply_edit(&mut g, &"pool-1".into(), "channels", 8u32.into(), &config).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyParameter { .. }));
        let err = apply_edit(&mut g, &"ghost".into(), "sizeOut", 8u32.into(), &config).unwrap_err();
        assert!(matches!(err, CoreError::NodeNotFound { .. }));
        assert_eq!(g.to_document(), before);
    }

    #[test]
    fn unknown_blocks_cannot_be_edited() {
        let config = ShapeConfig::default();
        let mut g = ArchitectureGraph::new();
        let node: netforge_core::Node = serde_json::from_value(serde_json::json!({
            "id": "note-1", "type": "textBlock", "data": {}
        }))
        .unwrap();
        g.add_node(node).unwrap();
        let err = apply_edit(&mut g, &"note-1".into(), "sizeOut", 3u32.into(), &config).unwrap_err();
        assert!(matches!(err, CoreError::UnknownBlockKind { ref kind } if kind == "textBlock"));
    }

    #[test]
    fn reordering_reruns_propagation() {
        let config = ShapeConfig::default();
        let mut g = cnn();
        // conv-2 moves up beside conv-1, ahead of pool-1.
        let outcome =
            apply_edit(&mut g, &"conv-2".into(), "sequenceIndex", ParamValue::Int(0), &config).unwrap();
        let order: Vec<String> = g
            .family_ids(Family::Spatial)
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(order, vec!["conv-1", "conv-2", "pool-1", "pool-2"]);
        assert_eq!(outcome.previous, Some(ParamValue::Int(2)));
        assert_eq!(channels(&g, "pool-1"), Some(12u32.into()));
        assert_eq!(size_in(&g, "conv-2"), 6);
    }
}
