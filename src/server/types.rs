use crate::model::artifact::InputShape;
use crate::model::store::{HealthState, ModelStore};
use crate::observability::metrics::MetricsRegistry;
use crate::observability::request_log::RequestLog;
use crate::predictor::Predictor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared Application State
pub struct AppState {
    pub store: Arc<ModelStore>,
    pub predictor: Predictor,
    pub metrics: Arc<MetricsRegistry>,
    pub request_log: Arc<RequestLog>,
}

impl AppState {
    pub fn new(
        store: Arc<ModelStore>,
        metrics: Arc<MetricsRegistry>,
        request_log: Arc<RequestLog>,
    ) -> Self {
        let predictor = Predictor::new(Arc::clone(&store));
        metrics.set_model_loaded(store.is_ready());
        Self {
            store,
            predictor,
            metrics,
            request_log,
        }
    }
}

// --- DTOs (Data Transfer Objects) ---

#[derive(Deserialize)]
pub struct PredictRequest {
    /// Base64 encoded image data
    pub image: String,
    /// Declared content type of the payload, e.g. "image/jpeg".
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthState,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize)]
pub struct ModelInfoResponse {
    pub format_version: u32,
    pub classes: Vec<String>,
    pub input: InputShape,
}
