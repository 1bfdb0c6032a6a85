use ndarray::{Array4, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("model not found at path: {0}")]
    ModelNotFound(String),

    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

// Initialize the global environment for ORT (only needed once)
pub fn init_ort() -> Result<(), BackendError> {
    ort::init().with_name("pawnnx").commit()?;
    Ok(())
}

/// A loaded network. Implementations hold the weights read-only for the
/// lifetime of the process and must be shareable across concurrent requests.
pub trait InferenceBackend: Send + Sync {
    /// Run one forward pass over a `[1, C, H, W]` tensor and return the raw
    /// (unnormalized) per-class outputs.
    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>, BackendError>;
}

/// ONNX Runtime session. Runs are serialized on an internal lock; the input
/// tensor is call-local so concurrent requests never share buffers.
pub struct OnnxBackend {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxBackend {
    /// Loads an ONNX model from disk and creates an inference session.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(BackendError::ModelNotFound(path.display().to_string()));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)? // Parallelism within an op
            .commit_from_file(path)?;

        let input_name = session.inputs[0].name.clone();
        tracing::info!(path = %path.display(), input = %input_name, "loaded ONNX session");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>, BackendError> {
        let shape = input.shape().to_vec();
        let (data, _offset) = input.into_raw_vec_and_offset();
        let input_value = Value::from_array((shape, data.into_boxed_slice()))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session.run(ort::inputs![self.input_name.clone() => input_value])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let output = ndarray::ArrayViewD::from_shape(dims.as_slice(), data)?;

        // Models may or may not carry a batch axis on the output.
        let raw: Vec<f32> = if output.ndim() <= 1 {
            output.iter().copied().collect()
        } else {
            output.index_axis(Axis(0), 0).iter().copied().collect()
        };

        Ok(raw)
    }
}
