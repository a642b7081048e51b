//! The compiled model description.
//!
//! Layers are an insertion-ordered map keyed `fcl_input1`, `conv1`,
//! `pool1`, `fcl_hidden1`, `fcl_output1`, ...; the backend builds its layer
//! stack by iterating the map in order, so the order is part of the format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use netforge_core::node::Activation;
use netforge_core::TrainingConfig;

/// One entry of the layer map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerSpec {
    Input {
        size: u32,
    },
    Conv {
        in_channels: u32,
        out_channels: u32,
        kernel_size: u32,
        padding: u32,
        act: Activation,
    },
    Pool {
        kernel_size: u32,
        stride: u32,
    },
    Dense {
        in_features: u32,
        out_features: u32,
        act: Activation,
    },
}

/// What the training service receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub layers: IndexMap<String, LayerSpec>,
    pub training: TrainingConfig,
    /// Class names from a Classifier block, in output order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl ModelDescription {
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
