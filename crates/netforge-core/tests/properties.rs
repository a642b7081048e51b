use proptest::prelude::*;

use netforge_core::{ArchitectureGraph, BlockKind, BlockParams, Family, Node, NodeId};

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

#[derive(Debug, Clone)]
enum Op {
    Add(BlockKind, u32),
    Remove(usize),
    Move(usize, u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (kind(), 0u32..8).prop_map(|(k, s)| Op::Add(k, s)),
        1 => any::<usize>().prop_map(Op::Remove),
        1 => (any::<usize>(), 0u32..8).prop_map(|(i, s)| Op::Move(i, s)),
    ]
}

fn run(ops: &[Op]) -> ArchitectureGraph {
    let mut g = ArchitectureGraph::new();
    for (n, op) in ops.iter().enumerate() {
        let present: Vec<NodeId> = g.nodes().map(|node| node.id.clone()).collect();
        match op {
            Op::Add(k, seq) => {
                let id = format!("{}-{}", k.as_str(), n);
                g.add_node(Node::new(id, *seq, BlockParams::default_for(*k))).unwrap();
            }
            Op::Remove(i) if !present.is_empty() => {
                g.remove_node(&present[i % present.len()]).unwrap();
            }
            Op::Move(i, seq) if !present.is_empty() => {
                g.set_sequence_index(&present[i % present.len()], *seq).unwrap();
            }
            _ => {}
        }
    }
    g
}

proptest! {
    #[test]
    fn families_stay_sorted_by_sequence_index(ops in prop::collection::vec(op(), 0..40)) {
        let g = run(&ops);
        for family in [Family::Neural, Family::Spatial] {
            let seqs: Vec<u32> = g.family(family).map(|n| n.sequence_index).collect();
            prop_assert!(seqs.windows(2).all(|w| w[0] <= w[1]), "{:?}: {:?}", family, seqs);
        }
    }

    #[test]
    fn families_hold_exactly_their_members(ops in prop::collection::vec(op(), 0..40)) {
        let g = run(&ops);
        for family in [Family::Neural, Family::Spatial] {
            let mut filed = g.family_ids(family);
            let mut expected: Vec<NodeId> = g
                .nodes()
                .filter(|n| n.family() == Some(family))
                .map(|n| n.id.clone())
                .collect();
            filed.sort();
            expected.sort();
            prop_assert_eq!(filed, expected);
        }
    }
}
