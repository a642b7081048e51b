//! Request and response types for the netforge API.

pub mod graph;
pub mod projects;
pub mod training;
