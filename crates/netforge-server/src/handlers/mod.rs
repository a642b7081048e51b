//! HTTP handler modules for the netforge API.
//!
//! Handlers parse requests, take the service lock, delegate to
//! [`ProjectService`](crate::service::ProjectService) and return JSON. No
//! business logic lives here.

pub mod blocks;
pub mod compile;
pub mod graph;
pub mod projects;
pub mod training;
