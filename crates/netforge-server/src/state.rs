//! Application state shared by all handlers.
//!
//! The [`ProjectService`] sits behind `Arc<tokio::sync::Mutex<>>` so handlers
//! await the lock without blocking the runtime. Handlers that call the
//! training service drop the lock before awaiting the network.

use std::sync::Arc;
use std::time::Duration;

use netforge_storage::{InMemoryStore, SqliteStore};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::jobs::{JobRegistry, PollSettings};
use crate::service::ProjectService;
use crate::training::TrainingClient;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<tokio::sync::Mutex<ProjectService>>,
    pub training: TrainingClient,
    pub jobs: Arc<JobRegistry>,
    pub poll: PollSettings,
}

impl AppState {
    /// State backed by the SQLite database at `config.db_path`.
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        let store = SqliteStore::new(&config.db_path)
            .map_err(|e| ApiError::InternalError(format!("failed to open store: {}", e)))?;
        let service = ProjectService::new(Box::new(store), config.shape)?;
        Ok(Self::with_service(service, config))
    }

    /// State backed by an in-memory store (for testing).
    pub fn in_memory(config: &ServerConfig) -> Result<Self, ApiError> {
        let service = ProjectService::new(Box::new(InMemoryStore::new()), config.shape)?;
        Ok(Self::with_service(service, config))
    }

    /// Must run inside a tokio runtime: it starts the job retention sweep.
    fn with_service(service: ProjectService, config: &ServerConfig) -> Self {
        let jobs = Arc::new(JobRegistry::new());
        jobs.start_retention_sweep(Duration::from_secs(60), config.job_retention);
        AppState {
            service: Arc::new(tokio::sync::Mutex::new(service)),
            training: TrainingClient::new(config.training_url.clone())
                .with_request_timeout(config.request_timeout),
            jobs,
            poll: config.poll,
        }
    }
}
