//! Training submission and status types.

use serde::Serialize;

use crate::jobs::JobView;

/// `POST /projects/{id}/train`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    pub training_id: String,
    pub layers: usize,
    pub job: JobView,
}
