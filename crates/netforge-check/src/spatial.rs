//! Spatial size arithmetic.
//!
//! Only pooling shrinks the spatial dimension here; convolutions are assumed
//! to be padded to preserve it.

use netforge_core::node::BlockParams;
use netforge_core::{ArchitectureGraph, Family, ShapeConfig};

/// One pooling step: `floor((dim - kernel) / stride + 1)`.
///
/// Saturates to 0 when the kernel is wider than the input. A zero stride is
/// treated as 1 so the result stays defined.
pub fn reduce_dim(dim: u32, kernel: u32, stride: u32) -> u32 {
    if kernel > dim {
        return 0;
    }
    (dim - kernel) / stride.max(1) + 1
}

/// The spatial dimension before and after each pooling block, in order.
/// The first entry is the configured initial size.
pub fn spatial_dims(graph: &ArchitectureGraph, config: &ShapeConfig) -> Vec<u32> {
    let mut dims = vec![config.initial_spatial_size];
    let mut dim = config.initial_spatial_size;
    for node in graph.family(Family::Spatial) {
        if let BlockParams::Pooling(p) = &node.params {
            dim = reduce_dim(dim, p.kernel_size, p.stride);
            dims.push(dim);
        }
    }
    dims
}

/// Output channels of the last convolution in spatial order.
pub fn last_conv_channels(graph: &ArchitectureGraph) -> Option<u32> {
    graph
        .family(Family::Spatial)
        .filter_map(|n| match &n.params {
            BlockParams::Convolutional(c) => Some(c.size_out),
            _ => None,
        })
        .last()
}

/// Flattened feature count entering the first neural layer:
/// `lastConvChannels * dim * dim`.
///
/// `None` when there is no convolution, or when pooling collapsed the
/// spatial size to zero (the value would be meaningless).
pub fn derived_input_features(graph: &ArchitectureGraph, config: &ShapeConfig) -> Option<u32> {
    let channels = last_conv_channels(graph)?;
    let dim = spatial_dims(graph, config).last().copied().unwrap_or(0);
    if dim == 0 {
        return None;
    }
    Some(channels.saturating_mul(dim).saturating_mul(dim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::node::{ConvParams, Node, PoolParams, PoolType};

    fn conv(id: &str, seq: u32, out: u32) -> Node {
        Node::new(
            id,
            seq,
            BlockParams::Convolutional(ConvParams {
                size_in: 3,
                size_out: out,
                kernel_size: 3,
                padding: 1,
            }),
        )
    }

    fn pool(id: &str, seq: u32, kernel: u32, stride: u32) -> Node {
        Node::new(
            id,
            seq,
            BlockParams::Pooling(PoolParams {
                channels: 0,
                kernel_size: kernel,
                stride,
                pool_type: PoolType::Max,
            }),
        )
    }

    #[test]
    fn reduce_follows_floor_formula() {
        assert_eq!(reduce_dim(128, 2, 2), 64);
        assert_eq!(reduce_dim(64, 2, 2), 32);
        assert_eq!(reduce_dim(7, 3, 2), 3);
        assert_eq!(reduce_dim(5, 5, 1), 1);
        assert_eq!(reduce_dim(2, 3, 1), 0);
        assert_eq!(reduce_dim(10, 2, 0), 9);
    }

    #[test]
    fn two_pools_from_128_give_65536_features() {
        let mut g = ArchitectureGraph::new();
        g.add_node(conv("conv-1", 0, 64)).unwrap();
        g.add_node(pool("pool-1", 1, 2, 2)).unwrap();
        g.add_node(pool("pool-2", 2, 2, 2)).unwrap();
        let config = ShapeConfig::default();

        assert_eq!(spatial_dims(&g, &config), vec![128, 64, 32]);
        assert_eq!(derived_input_features(&g, &config), Some(65536));
    }

    #[test]
    fn last_conv_is_by_sequence_not_insertion() {
        let mut g = ArchitectureGraph::new();
        g.add_node(conv("conv-b", 2, 16)).unwrap();
        g.add_node(conv("conv-a", 0, 64)).unwrap();
        assert_eq!(last_conv_channels(&g), Some(16));
    }

    #[test]
    fn no_conv_means_no_derived_size() {
        let mut g = ArchitectureGraph::new();
        g.add_node(pool("pool-1", 0, 2, 2)).unwrap();
        assert_eq!(derived_input_features(&g, &ShapeConfig::default()), None);
    }

    #[test]
    fn collapsed_dimension_yields_none() {
        let mut g = ArchitectureGraph::new();
        g.add_node(conv("conv-1", 0, 8)).unwrap();
        g.add_node(pool("pool-1", 1, 200, 1)).unwrap();
        assert_eq!(derived_input_features(&g, &ShapeConfig::default()), None);
    }
}
