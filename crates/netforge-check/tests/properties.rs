use proptest::prelude::*;

use netforge_check::{apply_edit, insert_block, reconcile, reconcile_in_place, validate_graph, ShapeViolation};
use netforge_core::node::BlockParams;
use netforge_core::{ArchitectureGraph, BlockKind, NodeId, ShapeConfig};

fn kind() -> impl Strategy<Value = BlockKind> {
    prop_oneof![
        Just(BlockKind::Input),
        Just(BlockKind::Hidden),
        Just(BlockKind::Output),
        Just(BlockKind::Convolutional),
        Just(BlockKind::Pooling),
        Just(BlockKind::Training),
    ]
}

fn build(kinds: &[BlockKind], config: &ShapeConfig) -> ArchitectureGraph {
    let mut g = ArchitectureGraph::new();
    for &k in kinds {
        insert_block(&mut g, k, None, config).unwrap();
    }
    g
}

fn ids(g: &ArchitectureGraph) -> Vec<NodeId> {
    g.nodes().map(|n| n.id.clone()).collect()
}

/// Writes derived values directly, bypassing propagation.
fn corrupt(g: &mut ArchitectureGraph, picks: &[(usize, u32)]) {
    let ids = ids(g);
    if ids.is_empty() {
        return;
    }
    for &(i, v) in picks {
        let id = &ids[i % ids.len()];
        g.update_params(id, |p| match p {
            BlockParams::Pooling(pool) => pool.channels = v,
            other => {
                if let Some(s) = other.size_in_mut() {
                    *s = v;
                }
            }
        })
        .unwrap();
    }
}

fn mismatches(g: &ArchitectureGraph, config: &ShapeConfig) -> Vec<ShapeViolation> {
    validate_graph(g, config)
        .into_iter()
        .filter(|v| {
            matches!(
                v,
                ShapeViolation::ChainMismatch { .. }
                    | ShapeViolation::PassThroughMismatch { .. }
                    | ShapeViolation::DerivedSizeMismatch { .. }
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn reconcile_is_idempotent(
        kinds in prop::collection::vec(kind(), 0..12),
        picks in prop::collection::vec((0usize..32, 1u32..4096), 0..8),
        initial in 8u32..256,
    ) {
        let config = ShapeConfig { initial_spatial_size: initial, ..ShapeConfig::default() };
        let mut g = build(&kinds, &config);
        corrupt(&mut g, &picks);

        let once = reconcile(&g, &config);
        let twice = reconcile(&once, &config);
        prop_assert_eq!(once.to_document(), twice.to_document());

        let mut again = once.clone();
        prop_assert!(reconcile_in_place(&mut again, &config).is_empty());
    }

    #[test]
    fn reconcile_restores_invariants(
        kinds in prop::collection::vec(kind(), 0..12),
        picks in prop::collection::vec((0usize..32, 1u32..4096), 0..8),
    ) {
        let config = ShapeConfig::default();
        let mut g = build(&kinds, &config);
        corrupt(&mut g, &picks);
        let fixed = reconcile(&g, &config);
        prop_assert!(mismatches(&fixed, &config).is_empty());
    }

    #[test]
    fn edits_preserve_invariants(
        kinds in prop::collection::vec(kind(), 1..10),
        edits in prop::collection::vec(
            (0usize..32, prop_oneof![Just("sizeOut"), Just("kernelSize"), Just("stride"), Just("sizeIn")], 1u32..300),
            0..12,
        ),
    ) {
        let config = ShapeConfig::default();
        let mut g = build(&kinds, &config);
        let ids = ids(&g);
        for (i, param, value) in edits {
            let id = &ids[i % ids.len()];
            // Rejections (read-only or unknown parameters) must leave the graph valid too.
            let _ = apply_edit(&mut g, id, param, value.into(), &config);
            prop_assert!(mismatches(&g, &config).is_empty());
        }
    }
}
