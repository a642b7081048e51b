//! Layer-by-layer model emission.
//!
//! [`compile`] walks an ordered layer list once, tracking the running
//! channel count (starting at the configured input channels) and spatial
//! size (starting at the configured initial size), and emits one map entry
//! per layer. Compilation is all-or-nothing: the first invalid layer fails
//! the whole call.

use indexmap::IndexMap;

use netforge_check::validate_graph;
use netforge_core::node::Activation;
use netforge_core::{ArchitectureGraph, BlockParams, Node, TrainingConfig};

use crate::description::{LayerSpec, ModelDescription};
use crate::error::CompileError;
use crate::linearize::linearize;
use crate::{Compilation, CompileOptions};

#[derive(Default)]
struct Counters {
    input: u32,
    hidden: u32,
    output: u32,
    conv: u32,
    pool: u32,
}

fn bump(counter: &mut u32, prefix: &str) -> String {
    *counter += 1;
    format!("{}{}", prefix, counter)
}

/// Emits the model description for `layers`, already in traversal order.
pub fn compile(
    layers: &[&Node],
    training: &TrainingConfig,
    options: &CompileOptions,
) -> Result<ModelDescription, CompileError> {
    training.validate()?;

    let mut counters = Counters::default();
    let mut current_channels = options.shape.input_channels;
    let mut current_size = options.shape.initial_spatial_size;
    let class_count = options.shape.output_classes;
    let mut out: IndexMap<String, LayerSpec> = IndexMap::new();

    for node in layers {
        match &node.params {
            BlockParams::Input(p) => {
                // Only the spatial size restarts; the channel count runs on.
                current_size = p.size_in;
                out.insert(
                    bump(&mut counters.input, "fcl_input"),
                    LayerSpec::Input { size: p.size_in },
                );
            }
            BlockParams::Convolutional(p) => {
                out.insert(
                    bump(&mut counters.conv, "conv"),
                    LayerSpec::Conv {
                        in_channels: current_channels,
                        out_channels: p.size_out,
                        kernel_size: p.kernel_size,
                        padding: p.padding,
                        act: Activation::Relu,
                    },
                );
                current_channels = p.size_out;
            }
            BlockParams::Pooling(p) => {
                if p.kernel_size == 0 || p.stride == 0 {
                    return Err(CompileError::InvalidLayer {
                        node: node.id.clone(),
                        reason: "pooling kernel size and stride must be positive".to_string(),
                    });
                }
                current_size /= p.kernel_size;
                if current_size == 0 {
                    return Err(CompileError::InvalidLayer {
                        node: node.id.clone(),
                        reason: "pooling reduces the spatial size to zero".to_string(),
                    });
                }
                out.insert(
                    bump(&mut counters.pool, "pool"),
                    LayerSpec::Pool {
                        kernel_size: p.kernel_size,
                        stride: p.stride,
                    },
                );
            }
            BlockParams::Hidden(p) => {
                out.insert(
                    bump(&mut counters.hidden, "fcl_hidden"),
                    LayerSpec::Dense {
                        in_features: current_channels,
                        out_features: p.size_out,
                        act: p.activation,
                    },
                );
                current_channels = p.size_out;
            }
            BlockParams::Output(_) => {
                out.insert(
                    bump(&mut counters.output, "fcl_output"),
                    LayerSpec::Dense {
                        in_features: current_channels,
                        out_features: class_count,
                        act: Activation::Softmax,
                    },
                );
                current_channels = class_count;
            }
            // Not layers; linearization never hands these over.
            BlockParams::Classifier(_)
            | BlockParams::Training(_)
            | BlockParams::Start
            | BlockParams::Unknown { .. } => continue,
        }
        if current_channels == 0 {
            return Err(CompileError::InvalidLayer {
                node: node.id.clone(),
                reason: "layer produces zero features".to_string(),
            });
        }
    }

    if out.is_empty() {
        return Err(CompileError::NoLayers);
    }

    Ok(ModelDescription {
        layers: out,
        training: training.clone(),
        classes: Vec::new(),
    })
}

/// The Training block's settings if the graph has one, else `fallback`.
pub fn resolve_training_config(graph: &ArchitectureGraph, fallback: &TrainingConfig) -> TrainingConfig {
    graph
        .nodes()
        .find_map(|n| match &n.params {
            BlockParams::Training(t) => Some(t.clone()),
            _ => None,
        })
        .unwrap_or_else(|| fallback.clone())
}

fn classifier_classes(graph: &ArchitectureGraph) -> Vec<String> {
    graph
        .nodes()
        .find_map(|n| match &n.params {
            BlockParams::Classifier(c) if !c.classes.is_empty() => Some(c.classes.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Linearizes and compiles a whole graph.
///
/// A Classifier block naming classes sets the output class count; a
/// Training block overrides `fallback_training`.
pub fn compile_graph(
    graph: &ArchitectureGraph,
    fallback_training: &TrainingConfig,
    options: &CompileOptions,
) -> Result<Compilation, CompileError> {
    let linearization = linearize(graph)?;
    let training = resolve_training_config(graph, fallback_training);
    let classes = classifier_classes(graph);

    let mut options = options.clone();
    if !classes.is_empty() {
        options.shape.output_classes = u32::try_from(classes.len()).unwrap_or(u32::MAX);
    }

    let mut model = compile(&linearization.nodes(graph), &training, &options)?;
    model.classes = classes;

    let warnings = if options.check_shapes {
        validate_graph(graph, &options.shape)
    } else {
        Vec::new()
    };

    Ok(Compilation {
        model,
        skipped: linearization.skipped,
        unreachable: linearization.unreachable,
        warnings,
    })
}
