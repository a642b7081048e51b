//! Client for the external training and inference service.
//!
//! - `POST {base}/train` with a model description returns `{ trainingId }`.
//! - `GET {base}/training-status/{id}` returns the job's progress.
//! - `POST {base}/classify/{modelId}` with raw image bytes returns the
//!   predicted class and the top candidates.
//!
//! Every call is bounded by the client's request timeout (30 s unless
//! changed). Failed calls are reported, never retried.

use std::time::Duration;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use netforge_compiler::ModelDescription;

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub loss: f64,
}

/// Present once training has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelData {
    pub model_url: String,
    pub final_accuracy: f64,
    pub final_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub training_id: String,
    /// 0 to 100.
    pub progress: f64,
    pub current_epoch: u32,
    pub total_epochs: u32,
    pub metrics: Metrics,
    pub is_complete: bool,
    #[serde(default)]
    pub model_data: Option<ModelData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub class: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub class: String,
    pub confidence: f64,
    /// Highest confidence first.
    #[serde(default)]
    pub top_classes: Vec<ClassScore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    training_id: String,
}

/// The service may wrap the prediction in `{ success, prediction }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyReply {
    Wrapped { prediction: Classification },
    Bare(Classification),
}

#[derive(Debug, Clone)]
pub struct TrainingClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl TrainingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        TrainingClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits a compiled model and returns the service's training id.
    pub async fn submit(&self, model: &ModelDescription) -> Result<String, TrainingError> {
        let response = self
            .http
            .post(format!("{}/train", self.base_url))
            .timeout(self.request_timeout)
            .json(model)
            .send()
            .await?;
        let reply: SubmitReply = read_json(response).await?;
        Ok(reply.training_id)
    }

    pub async fn status(&self, training_id: &str) -> Result<TrainingStatus, TrainingError> {
        let response = self
            .http
            .get(format!("{}/training-status/{}", self.base_url, training_id))
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }

    /// Forwards an image to the inference endpoint of a trained model.
    pub async fn classify(
        &self,
        model_id: &str,
        image: Bytes,
        content_type: Option<&str>,
    ) -> Result<Classification, TrainingError> {
        let mut request = self
            .http
            .post(format!("{}/classify/{}", self.base_url, model_id))
            .timeout(self.request_timeout)
            .body(image);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        let reply: ClassifyReply = read_json(request.send().await?).await?;
        let mut classification = match reply {
            ClassifyReply::Wrapped { prediction } => prediction,
            ClassifyReply::Bare(c) => c,
        };
        classification
            .top_classes
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(classification)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TrainingError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TrainingError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}
