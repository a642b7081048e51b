//! Shape propagation for the architecture graph.
//!
//! Provides:
//! - [`apply_edit`]: validated single-parameter edit with forward cascade
//!   (eager per-edit propagation).
//! - [`reconcile`] / [`reconcile_in_place`]: full-graph pass restoring the
//!   chain, pass-through and derived-size invariants in one sweep.
//! - [`insert_block`]: adds a block with position-appropriate defaults.
//! - [`validate_graph`]: reports every shape violation without mutating.

pub mod diagnostics;
pub mod insert;
pub mod propagate;
pub mod reconcile;
pub mod spatial;

pub use diagnostics::{validate_graph, ShapeViolation};
pub use insert::insert_block;
pub use propagate::{apply_edit, EditOutcome};
pub use reconcile::{reconcile, reconcile_in_place, Adjustment};
pub use spatial::{derived_input_features, reduce_dim, spatial_dims};
