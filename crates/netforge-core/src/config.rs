//! Shape constants shared by propagation and compilation.

use serde::{Deserialize, Serialize};

/// The single source of the numeric constants that shape derivation and
/// model compilation depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeConfig {
    /// Side length of the (square) input image before any pooling.
    pub initial_spatial_size: u32,
    /// Channels of the input image, fed to the first convolution.
    pub input_channels: u32,
    /// Class count of the output layer when no classifier names classes.
    pub output_classes: u32,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        ShapeConfig {
            initial_spatial_size: 128,
            input_channels: 3,
            output_classes: 10,
        }
    }
}
