//! HTTP/JSON API server for the netforge architecture editor.
//!
//! Exposes the block registry, project storage, shape-propagating graph
//! edits and model compilation over REST, and forwards compiled models to
//! an external training service whose progress is polled in the
//! background.

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
pub mod training;
