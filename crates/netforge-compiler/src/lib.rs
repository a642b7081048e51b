//! Graph-to-model compilation for netforge architectures.
//!
//! This crate turns an architecture graph into the ordered model description
//! a training backend consumes.
//!
//! # Modules
//!
//! - [`error`] -- Error types for all compilation failure modes
//! - [`linearize`] -- Start detection and depth-first layer ordering
//! - [`compiler`] -- Layer-by-layer emission with running shape state
//! - [`description`] -- The emitted model description and its layer entries

pub mod compiler;
pub mod description;
pub mod error;
pub mod linearize;

pub use compiler::{compile, compile_graph, resolve_training_config};
pub use description::{LayerSpec, ModelDescription};
pub use error::CompileError;
pub use linearize::{linearize, Linearization, SkippedBlock};

use netforge_check::ShapeViolation;
use netforge_core::ShapeConfig;
use serde::{Deserialize, Serialize};

/// Options controlling compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Input channels, initial spatial size and default class count.
    pub shape: ShapeConfig,

    /// Whether [`compile_graph`] also runs shape validation and attaches
    /// the findings as warnings.
    pub check_shapes: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            shape: ShapeConfig::default(),
            check_shapes: true,
        }
    }
}

/// Result of compiling a whole graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub model: ModelDescription,

    /// Blocks of unregistered kinds, left out of the model.
    pub skipped: Vec<SkippedBlock>,

    /// Layer blocks the traversal from the start block never reached.
    pub unreachable: Vec<netforge_core::NodeId>,

    /// Shape problems found in the graph; compilation does not fail on them.
    pub warnings: Vec<ShapeViolation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_compile_options() {
        let opts = CompileOptions::default();
        assert_eq!(opts.shape, ShapeConfig::default());
        assert!(opts.check_shapes);
    }

    #[test]
    fn compile_options_serde_roundtrip() {
        let opts = CompileOptions {
            shape: ShapeConfig {
                initial_spatial_size: 224,
                input_channels: 1,
                output_classes: 2,
            },
            check_shapes: false,
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: CompileOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape, opts.shape);
        assert_eq!(back.check_shapes, opts.check_shapes);
    }
}
