use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the prediction path.
///
/// Everything below the `Predictor` boundary is reclassified into one of
/// these three variants before it reaches the HTTP layer.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("model is not ready")]
    ModelNotReady,

    /// Unexpected failure inside the forward pass. The display string is
    /// opaque; `detail` is logged server-side and never sent to the caller.
    #[error("internal inference error")]
    InternalInference { detail: String },
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            PredictError::InvalidImage(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            PredictError::ModelNotReady => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            PredictError::InternalInference { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_image_display() {
        let error = PredictError::InvalidImage("not a PNG".to_string());
        assert_eq!(error.to_string(), "invalid image: not a PNG");
    }

    #[test]
    fn test_model_not_ready_display() {
        let error = PredictError::ModelNotReady;
        assert_eq!(error.to_string(), "model is not ready");
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let error = PredictError::InternalInference {
            detail: "session run failed: tensor type mismatch".to_string(),
        };
        // The detail must never leak through Display.
        assert_eq!(error.to_string(), "internal inference error");
    }

    #[test]
    fn test_into_response_invalid_image() {
        let error = PredictError::InvalidImage("truncated file".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_into_response_model_not_ready() {
        let error = PredictError::ModelNotReady;
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_into_response_internal() {
        let error = PredictError::InternalInference {
            detail: "boom".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
