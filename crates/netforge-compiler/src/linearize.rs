//! Graph linearization.
//!
//! The start block is the single block without incoming connections.
//! Placeholder blocks of unregistered kinds are never candidates. A
//! connection out of a placeholder counts as an input only when the
//! placeholder is itself fed by a registered block, so a stray note does
//! not hide the start while a placeholder inside a chain does not split it.
//!
//! From the start, a depth-first pre-order walk visits successors in the
//! order their connections were drawn. A visited set stops revisits, so
//! cycles end the walk quietly instead of looping. Control blocks (Start,
//! Training, Classifier) are walked through but not emitted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use netforge_core::{ArchitectureGraph, BlockParams, Node, NodeId};

use crate::error::CompileError;

/// A block left out of the model because its kind is unregistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedBlock {
    pub id: NodeId,
    pub kind: String,
}

/// Layer order produced by [`linearize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linearization {
    pub start: NodeId,
    /// Layer blocks in traversal order.
    pub layers: Vec<NodeId>,
    /// Placeholder blocks anywhere in the graph.
    pub skipped: Vec<SkippedBlock>,
    /// Layer blocks not reachable from the start.
    pub unreachable: Vec<NodeId>,
}

impl Linearization {
    /// Resolves the layer ids against `graph`.
    pub fn nodes<'g>(&self, graph: &'g ArchitectureGraph) -> Vec<&'g Node> {
        self.layers.iter().filter_map(|id| graph.node(id)).collect()
    }
}

fn is_layer(node: &Node) -> bool {
    node.kind().is_some_and(|k| k.is_layer())
}

/// Finds the unique start block.
pub fn find_start(graph: &ArchitectureGraph) -> Result<NodeId, CompileError> {
    let is_placeholder = |id: &NodeId| graph.node(id).map_or(true, |n| n.params.is_unknown());

    // Placeholders reachable from a registered block through placeholders only.
    let mut fed: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = graph
        .nodes()
        .filter(|n| !n.params.is_unknown())
        .flat_map(|n| graph.successors(&n.id))
        .filter(|id| is_placeholder(id))
        .collect();
    while let Some(id) = stack.pop() {
        if fed.insert(id.clone()) {
            stack.extend(graph.successors(&id).into_iter().filter(|s| is_placeholder(s)));
        }
    }

    let mut candidates: Vec<NodeId> = graph
        .nodes()
        .filter(|n| !n.params.is_unknown())
        .filter(|n| {
            graph
                .incoming(&n.id)
                .iter()
                .all(|e| is_placeholder(&e.source) && !fed.contains(&e.source))
        })
        .map(|n| n.id.clone())
        .collect();
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    candidates.sort();
    Err(CompileError::AmbiguousStart { candidates })
}

/// Orders the layer blocks of `graph` for compilation.
pub fn linearize(graph: &ArchitectureGraph) -> Result<Linearization, CompileError> {
    let start = find_start(graph)?;

    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut layers = Vec::new();
    let mut stack = vec![start.clone()];
    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(node) = graph.node(&id) else { continue };
        if is_layer(node) {
            layers.push(id.clone());
        }
        // Reversed so the first-drawn successor is popped first.
        stack.extend(graph.successors(&id).into_iter().rev());
    }

    let skipped = graph
        .nodes()
        .filter_map(|n| match &n.params {
            BlockParams::Unknown { kind, .. } => Some(SkippedBlock {
                id: n.id.clone(),
                kind: kind.clone(),
            }),
            _ => None,
        })
        .collect();
    let unreachable = graph
        .nodes()
        .filter(|n| is_layer(n) && !visited.contains(&n.id))
        .map(|n| n.id.clone())
        .collect();

    Ok(Linearization {
        start,
        layers,
        skipped,
        unreachable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::{BlockKind, Edge};

    fn graph(blocks: &[(&str, BlockKind)], edges: &[(&str, &str)]) -> ArchitectureGraph {
        let mut g = ArchitectureGraph::new();
        for (i, (id, kind)) in blocks.iter().enumerate() {
            g.add_node(Node::new(*id, i as u32, BlockParams::default_for(*kind)))
                .unwrap();
        }
        for (s, t) in edges {
            g.add_edge(Edge::connect(*s, *t)).unwrap();
        }
        g
    }

    fn placeholder(id: &str) -> Node {
        Node::new(
            id,
            0,
            BlockParams::Unknown {
                kind: "textBlock".into(),
                data: serde_json::json!({}),
            },
        )
    }

    fn names(ids: &[NodeId]) -> Vec<&str> {
        ids.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn chain_is_emitted_in_order_without_control_blocks() {
        let g = graph(
            &[
                ("start", BlockKind::Start),
                ("input", BlockKind::Input),
                ("hidden", BlockKind::Hidden),
                ("output", BlockKind::Output),
                ("train", BlockKind::Training),
            ],
            &[("start", "input"), ("input", "hidden"), ("hidden", "output"), ("output", "train")],
        );
        let lin = linearize(&g).unwrap();
        assert_eq!(lin.start.as_str(), "start");
        assert_eq!(names(&lin.layers), vec!["input", "hidden", "output"]);
        assert!(lin.unreachable.is_empty());
    }

    #[test]
    fn branches_follow_edge_order_depth_first() {
        let g = graph(
            &[
                ("s", BlockKind::Start),
                ("a", BlockKind::Convolutional),
                ("b", BlockKind::Pooling),
                ("c", BlockKind::Hidden),
                ("d", BlockKind::Output),
            ],
            &[("s", "c"), ("s", "a"), ("a", "b"), ("c", "d"), ("b", "d")],
        );
        let lin = linearize(&g).unwrap();
        assert_eq!(names(&lin.layers), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn repeated_runs_agree() {
        let g = graph(
            &[("s", BlockKind::Input), ("x", BlockKind::Hidden), ("y", BlockKind::Hidden)],
            &[("s", "y"), ("s", "x"), ("x", "y")],
        );
        let first = linearize(&g).unwrap();
        for _ in 0..5 {
            assert_eq!(linearize(&g).unwrap(), first);
        }
        assert_eq!(names(&first.layers), vec!["s", "y", "x"]);
    }

    #[test]
    fn cycles_are_tolerated() {
        let g = graph(
            &[
                ("start", BlockKind::Start),
                ("a", BlockKind::Hidden),
                ("b", BlockKind::Hidden),
            ],
            &[("start", "a"), ("a", "b"), ("b", "a")],
        );
        assert_eq!(names(&linearize(&g).unwrap().layers), vec!["a", "b"]);
    }

    #[test]
    fn two_unconnected_blocks_are_ambiguous() {
        let g = graph(&[("a", BlockKind::Input), ("b", BlockKind::Output)], &[]);
        match linearize(&g) {
            Err(CompileError::AmbiguousStart { candidates }) => {
                assert_eq!(names(&candidates), vec!["a", "b"])
            }
            other => panic!("expected AmbiguousStart, got {:?}", other),
        }
    }

    #[test]
    fn empty_graph_and_pure_cycle_have_no_start() {
        assert!(matches!(
            linearize(&ArchitectureGraph::new()),
            Err(CompileError::AmbiguousStart { ref candidates }) if candidates.is_empty()
        ));
        let g = graph(
            &[("a", BlockKind::Hidden), ("b", BlockKind::Hidden)],
            &[("a", "b"), ("b", "a")],
        );
        assert!(matches!(
            linearize(&g),
            Err(CompileError::AmbiguousStart { ref candidates }) if candidates.is_empty()
        ));
    }

    #[test]
    fn placeholders_do_not_affect_start_detection() {
        let mut g = graph(
            &[("input", BlockKind::Input), ("output", BlockKind::Output)],
            &[("input", "output")],
        );
        g.add_node(placeholder("note")).unwrap();
        g.add_edge(Edge::connect("note", "input")).unwrap();

        let lin = linearize(&g).unwrap();
        assert_eq!(lin.start.as_str(), "input");
        assert_eq!(names(&lin.layers), vec!["input", "output"]);
        assert_eq!(
            lin.skipped,
            vec![SkippedBlock {
                id: "note".into(),
                kind: "textBlock".into()
            }]
        );
    }

    #[test]
    fn placeholder_inside_chain_is_walked_through() {
        let mut g = graph(
            &[("input", BlockKind::Input), ("output", BlockKind::Output)],
            &[],
        );
        g.add_node(placeholder("x")).unwrap();
        g.add_edge(Edge::connect("input", "x")).unwrap();
        g.add_edge(Edge::connect("x", "output")).unwrap();

        let lin = linearize(&g).unwrap();
        assert_eq!(lin.start.as_str(), "input");
        assert_eq!(names(&lin.layers), vec!["input", "output"]);
        assert_eq!(lin.skipped.len(), 1);
        assert_eq!(lin.skipped[0].id.as_str(), "x");
        assert!(lin.unreachable.is_empty());
    }

    #[test]
    fn chained_placeholders_still_feed_the_next_layer() {
        let mut g = graph(
            &[("start", BlockKind::Start), ("input", BlockKind::Input), ("output", BlockKind::Output)],
            &[("start", "input")],
        );
        g.add_node(placeholder("x")).unwrap();
        g.add_node(placeholder("y")).unwrap();
        g.add_edge(Edge::connect("input", "x")).unwrap();
        g.add_edge(Edge::connect("x", "y")).unwrap();
        g.add_edge(Edge::connect("y", "output")).unwrap();
        // A stray note pointing into the chain is not an input.
        g.add_node(placeholder("note")).unwrap();
        g.add_edge(Edge::connect("note", "start")).unwrap();

        let lin = linearize(&g).unwrap();
        assert_eq!(lin.start.as_str(), "start");
        assert_eq!(names(&lin.layers), vec!["input", "output"]);
        assert_eq!(lin.skipped.len(), 3);
    }

    #[test]
    fn unreachable_layers_are_reported() {
        let g = graph(
            &[
                ("start", BlockKind::Start),
                ("input", BlockKind::Input),
                ("x", BlockKind::Hidden),
                ("y", BlockKind::Hidden),
            ],
            &[("start", "input"), ("x", "y"), ("y", "x")],
        );
        let lin = linearize(&g).unwrap();
        assert_eq!(names(&lin.layers), vec!["input"]);
        assert_eq!(names(&lin.unreachable), vec!["x", "y"]);
    }
}
