//! Persistence for netforge projects.
//!
//! A project is an architecture graph plus its training configuration,
//! owned by a user. [`ProjectStore`] is the storage contract; the
//! [`InMemoryStore`] and [`SqliteStore`] backends implement it with the
//! same semantics.
//!
//! The API has two layers:
//! - **Row-level CRUD** (`insert_node`, `delete_edge`, ...) writes one block
//!   or connection at a time.
//! - **Whole-project** methods (`save_project`, `load_project`) decompose
//!   and rebuild the full graph.

pub mod convert;
pub mod error;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use hash::{hash_graph, hash_node_content, revision};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::ProjectStore;
pub use types::{Project, ProjectId, ProjectSummary};
