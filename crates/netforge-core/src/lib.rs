pub mod block;
pub mod config;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;

// Re-export commonly used types
pub use block::{BlockKind, BlockSpec, Family, ParamDomain, ParamSpec, ParamValue, RegistryEntry};
pub use config::ShapeConfig;
pub use edge::Edge;
pub use error::CoreError;
pub use graph::{ArchitectureGraph, GraphDocument};
pub use id::{EdgeId, NodeId};
pub use node::{BlockParams, Node, Position, TrainingConfig};
