//! Adding blocks with defaults that fit where they land.

use netforge_core::node::{BlockParams, ConvParams, DenseParams, HiddenParams, PoolParams};
use netforge_core::{ArchitectureGraph, BlockKind, CoreError, Family, Node, NodeId, Position, ShapeConfig};

use crate::reconcile::reconcile_in_place;
use crate::spatial::{derived_input_features, last_conv_channels};

const COLUMN_GAP: f64 = 350.0;
const ROW_GAP: f64 = 150.0;

/// Inserts a new block of `kind` and returns its id.
///
/// Input layers go to the front of the neural family, hidden layers just
/// before the output layer, output layers at the end; convolution and
/// pooling blocks are appended to the spatial family. Sizes are seeded from
/// the neighbouring blocks, then the graph is reconciled.
pub fn insert_block(
    graph: &mut ArchitectureGraph,
    kind: BlockKind,
    id: Option<NodeId>,
    config: &ShapeConfig,
) -> Result<NodeId, CoreError> {
    let id = match id {
        Some(id) if graph.contains_node(&id) => return Err(CoreError::DuplicateNode { id }),
        Some(id) => id,
        None => next_id(graph, kind),
    };

    let (sequence_index, params) = match kind {
        BlockKind::Input => {
            let size_in = derived_input_features(graph, config).unwrap_or(12);
            graph.make_room(Family::Neural, 0);
            let params = BlockParams::Input(DenseParams {
                size_in,
                size_out: (size_in / 4).max(64),
            });
            (0, params)
        }
        BlockKind::Hidden => {
            let index = graph
                .family(Family::Neural)
                .find(|n| n.kind() == Some(BlockKind::Output))
                .map(|n| n.sequence_index)
                .unwrap_or_else(|| graph.next_sequence_index(Family::Neural));
            let prev_out = graph
                .family(Family::Neural)
                .filter(|n| n.sequence_index < index)
                .last()
                .and_then(|n| n.params.size_out())
                .unwrap_or(12);
            graph.make_room(Family::Neural, index);
            let params = BlockParams::Hidden(HiddenParams {
                size_in: prev_out,
                size_out: (prev_out / 2).max(4),
                activation: Default::default(),
            });
            (index, params)
        }
        BlockKind::Output => {
            let prev_out = graph
                .family(Family::Neural)
                .last()
                .and_then(|n| n.params.size_out())
                .unwrap_or(8);
            let params = BlockParams::Output(DenseParams {
                size_in: prev_out,
                size_out: (prev_out / 2).max(1),
            });
            (graph.next_sequence_index(Family::Neural), params)
        }
        BlockKind::Convolutional => {
            let prev_channels = last_conv_channels(graph).unwrap_or(config.input_channels);
            let params = BlockParams::Convolutional(ConvParams {
                size_in: prev_channels,
                size_out: prev_channels.saturating_mul(2),
                kernel_size: 3,
                padding: 1,
            });
            (graph.next_sequence_index(Family::Spatial), params)
        }
        BlockKind::Pooling => {
            let params = match BlockParams::default_for(BlockKind::Pooling) {
                BlockParams::Pooling(p) => BlockParams::Pooling(PoolParams {
                    channels: last_conv_channels(graph).unwrap_or(p.channels),
                    ..p
                }),
                other => other,
            };
            (graph.next_sequence_index(Family::Spatial), params)
        }
        BlockKind::Classifier | BlockKind::Training | BlockKind::Start => {
            (0, BlockParams::default_for(kind))
        }
    };

    let mut node = Node::new(id.clone(), sequence_index, params);
    node.position = Some(placement(graph, kind));
    graph.add_node(node)?;
    reconcile_in_place(graph, config);

    Ok(id)
}

/// `{prefix}-{n}` with the smallest unused `n` counting from the number of
/// existing blocks of the kind.
fn next_id(graph: &ArchitectureGraph, kind: BlockKind) -> NodeId {
    let existing = graph.nodes().filter(|n| n.kind() == Some(kind)).count();
    let mut n = existing + 1;
    loop {
        let candidate = NodeId(format!("{}-{}", kind.id_prefix(), n));
        if !graph.contains_node(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Right of the rightmost block, on the family's row, stepping down until
/// the row is free.
fn placement(graph: &ArchitectureGraph, kind: BlockKind) -> Position {
    let positions: Vec<Position> = graph.nodes().filter_map(|n| n.position).collect();
    let x = positions
        .iter()
        .map(|p| p.x)
        .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
        .map_or(0.0, |max| max + COLUMN_GAP);
    let mut y = match kind.family() {
        Some(Family::Spatial) => 300.0,
        _ => 100.0,
    };
    while positions.iter().any(|p| p.y == y) {
        y += ROW_GAP;
    }
    Position { x, y }
}
