//! Background polling of submitted training jobs.
//!
//! Every submitted job gets a tokio task that asks the training service for
//! its status at a fixed interval and records the latest answer. Polling
//! ends when the service reports completion, when a status call fails, when
//! the timeout elapses, or when the job is cancelled. A status call still in
//! flight is abandoned at the deadline or on cancel. Cancelling is
//! idempotent; a cancelled job keeps the last status observed before it.
//!
//! Ended jobs stay queryable for a retention window, after which the sweep
//! started by [`JobRegistry::start_retention_sweep`] drops them.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use netforge_storage::ProjectId;

use crate::training::{TrainingClient, TrainingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// What the API reports about a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub training_id: String,
    pub project_id: ProjectId,
    pub state: JobState,
    pub status: Option<TrainingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct JobEntry {
    view: JobView,
    cancel: watch::Sender<bool>,
    /// Set when the job leaves `Running`.
    ended_at: Option<Instant>,
}

impl JobEntry {
    fn end(&mut self, state: JobState, error: Option<String>) {
        self.view.state = state;
        self.view.error = error;
        self.ended_at = Some(Instant::now());
    }
}

/// Registry of submitted jobs, keyed by training id.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `training_id` and spawns its poll task.
    pub fn start(
        self: &Arc<Self>,
        client: TrainingClient,
        training_id: String,
        project_id: ProjectId,
        settings: PollSettings,
    ) -> JobView {
        let (cancel, cancelled) = watch::channel(false);
        let view = JobView {
            training_id: training_id.clone(),
            project_id,
            state: JobState::Running,
            status: None,
            error: None,
        };
        self.jobs.insert(
            training_id.clone(),
            JobEntry {
                view: view.clone(),
                cancel,
                ended_at: None,
            },
        );

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.poll(client, training_id, cancelled, settings).await;
        });
        view
    }

    pub fn get(&self, training_id: &str) -> Option<JobView> {
        self.jobs.get(training_id).map(|entry| entry.view.clone())
    }

    /// Stops polling. Returns `None` only for an unknown id; cancelling a
    /// job that already ended leaves it as it is.
    pub fn cancel(&self, training_id: &str) -> Option<JobView> {
        let mut entry = self.jobs.get_mut(training_id)?;
        if entry.view.state == JobState::Running {
            entry.end(JobState::Cancelled, None);
            // The poll task may already be gone.
            let _ = entry.cancel.send(true);
            tracing::info!("training {} cancelled", training_id);
        }
        Some(entry.view.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drops jobs that ended more than `retention` ago and returns their ids.
    pub fn sweep_ended(&self, retention: Duration) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| entry.ended_at.is_some_and(|at| now.duration_since(at) >= retention))
            .map(|entry| entry.key().clone())
            .collect();
        for id in &expired {
            self.jobs.remove(id);
        }
        expired
    }

    /// Spawns a background task that calls [`sweep_ended`](Self::sweep_ended)
    /// every `interval`.
    pub fn start_retention_sweep(self: &Arc<Self>, interval: Duration, retention: Duration) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                let dropped = registry.sweep_ended(retention);
                if !dropped.is_empty() {
                    tracing::info!("dropped {} ended training job(s)", dropped.len());
                }
            }
        });
    }

    async fn poll(
        &self,
        client: TrainingClient,
        training_id: String,
        mut cancelled: watch::Receiver<bool>,
        settings: PollSettings,
    ) {
        let now = Instant::now();
        let deadline = now + settings.timeout;
        // First status call one interval after submission.
        let mut tick = tokio::time::interval_at(now + settings.interval, settings.interval);

        loop {
            tokio::select! {
                _ = cancelled.changed() => return,
                _ = tokio::time::sleep_until(deadline) => {
                    self.time_out(&training_id, settings.timeout);
                    return;
                }
                _ = tick.tick() => {}
            }

            let polled = tokio::select! {
                _ = cancelled.changed() => return,
                polled = tokio::time::timeout_at(deadline, client.status(&training_id)) => polled,
            };
            match polled {
                Err(_) => {
                    self.time_out(&training_id, settings.timeout);
                    return;
                }
                Ok(Ok(status)) => {
                    let done = status.is_complete;
                    self.record(&training_id, status);
                    if done {
                        tracing::info!("training {} complete", training_id);
                        self.finish(&training_id, JobState::Completed, None);
                        return;
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!("status poll for training {} failed: {}", training_id, err);
                    self.finish(&training_id, JobState::Failed, Some(err.to_string()));
                    return;
                }
            }
        }
    }

    fn time_out(&self, training_id: &str, timeout: Duration) {
        tracing::warn!(
            "training {} still incomplete after {:?}, giving up",
            training_id,
            timeout
        );
        self.finish(training_id, JobState::TimedOut, None);
    }

    /// Stores a status unless the job already ended; a response that
    /// arrives after cancellation is dropped.
    fn record(&self, training_id: &str, status: TrainingStatus) {
        if let Some(mut entry) = self.jobs.get_mut(training_id) {
            if entry.view.state == JobState::Running {
                entry.view.status = Some(status);
            }
        }
    }

    fn finish(&self, training_id: &str, state: JobState, error: Option<String>) {
        if let Some(mut entry) = self.jobs.get_mut(training_id) {
            if entry.view.state == JobState::Running {
                entry.end(state, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> TrainingClient {
        // Port 9 (discard) on localhost refuses connections.
        TrainingClient::new("http://127.0.0.1:9")
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let registry = Arc::new(JobRegistry::new());
        let settings = PollSettings {
            interval: Duration::from_secs(3600),
            timeout: Duration::from_secs(3600),
        };
        registry.start(unreachable_client(), "t1".into(), ProjectId(1), settings);

        let first = registry.cancel("t1").unwrap();
        let second = registry.cancel("t1").unwrap();
        assert_eq!(first.state, JobState::Cancelled);
        assert_eq!(second.state, JobState::Cancelled);
        assert!(registry.cancel("missing").is_none());
    }

    #[tokio::test]
    async fn test_failed_poll_marks_job_failed() {
        let registry = Arc::new(JobRegistry::new());
        let settings = PollSettings {
            interval: Duration::from_millis(5),
            timeout: Duration::from_secs(30),
        };
        registry.start(unreachable_client(), "t2".into(), ProjectId(1), settings);

        let mut state = JobState::Running;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            state = registry.get("t2").unwrap().state;
            if state != JobState::Running {
                break;
            }
        }
        assert_eq!(state, JobState::Failed);
        assert!(registry.get("t2").unwrap().error.is_some());
        // Cancelling after the fact changes nothing.
        assert_eq!(registry.cancel("t2").unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_timeout_ends_polling() {
        let registry = Arc::new(JobRegistry::new());
        let settings = PollSettings {
            interval: Duration::from_secs(3600),
            timeout: Duration::from_millis(20),
        };
        registry.start(unreachable_client(), "t3".into(), ProjectId(1), settings);

        let mut state = JobState::Running;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            state = registry.get("t3").unwrap().state;
            if state != JobState::Running {
                break;
            }
        }
        assert_eq!(state, JobState::TimedOut);
    }

    /// Accepts connections and never answers.
    async fn silent_service() -> TrainingClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        TrainingClient::new(format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_hung_status_call_still_times_out() {
        let registry = Arc::new(JobRegistry::new());
        let settings = PollSettings {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(200),
        };
        registry.start(silent_service().await, "t4".into(), ProjectId(1), settings);

        let mut state = JobState::Running;
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            state = registry.get("t4").unwrap().state;
            if state != JobState::Running {
                break;
            }
        }
        assert_eq!(state, JobState::TimedOut);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_ended_jobs() {
        let registry = Arc::new(JobRegistry::new());
        let settings = PollSettings {
            interval: Duration::from_secs(3600),
            timeout: Duration::from_secs(3600),
        };
        registry.start(unreachable_client(), "ended".into(), ProjectId(1), settings);
        registry.start(unreachable_client(), "running".into(), ProjectId(1), settings);
        registry.cancel("ended");

        assert!(registry.sweep_ended(Duration::from_secs(3600)).is_empty());
        assert_eq!(registry.sweep_ended(Duration::ZERO), vec!["ended".to_string()]);
        assert!(registry.get("ended").is_none());
        assert_eq!(registry.get("running").unwrap().state, JobState::Running);
        assert_eq!(registry.len(), 1);
    }
}
