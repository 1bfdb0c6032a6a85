use crate::error::PredictError;
use crate::model::store::ModelStore;
use crate::preprocessing::image::TransformError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Result of one classification call. Immutable once produced.
#[derive(Serialize, Clone, Debug)]
pub struct Prediction {
    /// Winning class label, from the manifest's ordered class list.
    pub label: String,
    pub class_index: usize,
    /// Maximum of the normalized probability distribution, in [0, 1].
    pub confidence: f32,
    /// Full distribution over all classes, summing to 1.
    pub probabilities: BTreeMap<String, f32>,
    pub inference_time_ms: f64,
}

/// Turns raw image bytes into a `Prediction` by composing the transform and
/// the model held by the store.
///
/// This is the reclassification boundary of the error taxonomy: decode
/// failures become `InvalidImage`, a store that is not `ready` becomes
/// `ModelNotReady`, and everything else becomes an opaque
/// `InternalInference` whose cause is logged here and goes no further.
#[derive(Clone)]
pub struct Predictor {
    store: Arc<ModelStore>,
}

impl Predictor {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    /// Classify one image. No retries: a failed call is reported as-is.
    pub fn predict(&self, buffer: &[u8]) -> Result<Prediction, PredictError> {
        let model = self.store.ready().ok_or(PredictError::ModelNotReady)?;
        let started = Instant::now();

        let tensor = model.transform.transform(buffer).map_err(|err| match err {
            TransformError::Decode(cause) => PredictError::InvalidImage(cause.to_string()),
            TransformError::Shape(detail) => internal(detail),
        })?;

        let raw = model
            .backend
            .infer(tensor)
            .map_err(|err| internal(err.to_string()))?;

        let classes = &model.manifest.classes;
        if raw.len() != classes.len() {
            return Err(internal(format!(
                "model produced {} outputs for {} classes",
                raw.len(),
                classes.len()
            )));
        }

        // Normalization over raw outputs is our job, not the model's.
        let probs = softmax(&raw);
        let (class_index, confidence) = argmax(&probs);

        let probabilities: BTreeMap<String, f32> = classes
            .iter()
            .cloned()
            .zip(probs.iter().copied())
            .collect();

        Ok(Prediction {
            label: classes[class_index].clone(),
            class_index,
            confidence,
            probabilities,
            inference_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

fn internal(detail: String) -> PredictError {
    tracing::error!(detail = %detail, "inference failed");
    PredictError::InternalInference { detail }
}

/// Convert raw model outputs to a probability distribution.
/// Max-subtracted for numerical stability.
fn softmax(values: &[f32]) -> Vec<f32> {
    let max_val = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_values: Vec<f32> = values.iter().map(|&x| (x - max_val).exp()).collect();
    let sum: f32 = exp_values.iter().sum();
    exp_values.into_iter().map(|v| v / sum).collect()
}

fn argmax(probs: &[f32]) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (i, &p) in probs.iter().enumerate() {
        if p > best.1 {
            best = (i, p);
        }
    }
    best
}
