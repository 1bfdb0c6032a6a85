use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

use crate::error::PredictError;
use crate::observability::metrics::{RequestEvent, RequestOutcome};
use crate::observability::request_log::RequestLogEntry;
use crate::predictor::Prediction;
use crate::server::types::{AppState, HealthResponse, ModelInfoResponse, PredictRequest};

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "predict": "/predict",
            "metrics": "/metrics",
            "model_info": "/model-info",
        }
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let health = state.store.health();

    let body = HealthResponse {
        status: health,
        model_loaded: state.store.is_ready(),
        detail: state.store.failure_cause(),
    };
    let status = if state.store.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    log_request(&state, "/health", started.elapsed(), health.as_str());
    (status, Json(body)).into_response()
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let body = state.metrics.render();
    log_request(&state, "/metrics", started.elapsed(), "success");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

pub async fn model_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelInfoResponse>, PredictError> {
    let started = Instant::now();
    match state.store.ready() {
        Some(model) => {
            log_request(&state, "/model-info", started.elapsed(), "success");
            Ok(Json(ModelInfoResponse {
                format_version: model.manifest.format_version,
                classes: model.manifest.classes.clone(),
                input: model.manifest.input,
            }))
        }
        None => {
            log_request(&state, "/model-info", started.elapsed(), "model_not_ready");
            Err(PredictError::ModelNotReady)
        }
    }
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<Prediction>, PredictError> {
    let pending = PendingPrediction::begin(Arc::clone(&state));

    if let Some(content_type) = payload.content_type.as_deref() {
        if !content_type.starts_with("image/") {
            return Err(pending.fail(PredictError::InvalidImage(format!(
                "unsupported content type: {content_type}"
            ))));
        }
    }

    let image_bytes = match general_purpose::STANDARD.decode(&payload.image) {
        Ok(bytes) => bytes,
        Err(err) => {
            return Err(pending.fail(PredictError::InvalidImage(format!(
                "base64 decode failed: {err}"
            ))))
        }
    };

    // Decode + forward pass are CPU-bound; keep them off the dispatch loop.
    let predictor = state.predictor.clone();
    let joined = task::spawn_blocking(move || predictor.predict(&image_bytes)).await;
    let result = match joined {
        Ok(result) => result,
        Err(err) => Err(PredictError::InternalInference {
            detail: format!("inference task failed: {err}"),
        }),
    };

    match result {
        Ok(prediction) => {
            tracing::info!(
                label = %prediction.label,
                confidence = prediction.confidence,
                time_ms = prediction.inference_time_ms,
                "prediction served"
            );
            pending.succeed(&prediction);
            Ok(Json(prediction))
        }
        Err(err) => Err(pending.fail(err)),
    }
}

fn log_request(state: &AppState, endpoint: &'static str, duration: Duration, outcome: &'static str) {
    state
        .request_log
        .append(&RequestLogEntry::new(endpoint, duration, outcome));
}

/// One in-flight prediction's accounting. Exactly one outcome is recorded
/// per request: if the future is dropped before a result is produced, the
/// drop records `cancelled` instead of losing the request.
struct PendingPrediction {
    state: Arc<AppState>,
    started: Instant,
    finished: bool,
}

impl PendingPrediction {
    fn begin(state: Arc<AppState>) -> Self {
        Self {
            state,
            started: Instant::now(),
            finished: false,
        }
    }

    fn succeed(mut self, prediction: &Prediction) {
        self.finish(RequestOutcome::Success, Some(prediction));
    }

    fn fail(mut self, err: PredictError) -> PredictError {
        self.finish(RequestOutcome::from(&err), None);
        err
    }

    fn finish(&mut self, outcome: RequestOutcome, prediction: Option<&Prediction>) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.started.elapsed();

        self.state.metrics.record(RequestEvent {
            outcome,
            latency: elapsed,
            class_index: prediction.map(|p| p.class_index),
        });

        let mut entry = RequestLogEntry::new("/predict", elapsed, outcome.as_str());
        if let Some(prediction) = prediction {
            entry = entry.with_prediction(&prediction.label, prediction.confidence);
        }
        self.state.request_log.append(&entry);
    }
}

impl Drop for PendingPrediction {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(RequestOutcome::Cancelled, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::metrics::MetricsRegistry;
    use crate::observability::request_log::RequestLog;
    use crate::testutil;

    fn app_state() -> Arc<AppState> {
        let store = Arc::new(testutil::ready_store(vec![2.0, -1.0]));
        let metrics = Arc::new(MetricsRegistry::new(&[
            "cat".to_string(),
            "dog".to_string(),
        ]));
        let request_log = Arc::new(RequestLog::to_writer(Box::new(std::io::sink())));
        Arc::new(AppState::new(store, metrics, request_log))
    }

    #[test]
    fn test_dropped_pending_prediction_records_cancelled() {
        let state = app_state();

        let pending = PendingPrediction::begin(Arc::clone(&state));
        drop(pending);

        assert_eq!(state.metrics.requests_for(RequestOutcome::Cancelled), 1);
        assert_eq!(state.metrics.requests_for(RequestOutcome::Success), 0);
    }

    #[test]
    fn test_finished_prediction_is_recorded_once() {
        let state = app_state();

        let pending = PendingPrediction::begin(Arc::clone(&state));
        let err = pending.fail(PredictError::ModelNotReady);
        assert!(matches!(err, PredictError::ModelNotReady));

        // fail() consumed the guard; its Drop must not double count.
        assert_eq!(state.metrics.requests_for(RequestOutcome::ModelNotReady), 1);
        assert_eq!(state.metrics.requests_for(RequestOutcome::Cancelled), 0);
    }
}
