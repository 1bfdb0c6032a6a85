//! Shared fixtures for the test suites.

use crate::model::artifact::ArtifactManifest;
use crate::model::backend::{BackendError, InferenceBackend};
use crate::model::store::ModelStore;
use ndarray::Array4;
use std::io::Cursor;

pub const MANIFEST_YAML: &str = r#"
format_version: 1
input:
  height: 224
  width: 224
  channels: 3
classes: [cat, dog]
normalization:
  mean: [0.485, 0.456, 0.406]
  std: [0.229, 0.224, 0.225]
"#;

pub fn manifest() -> ArtifactManifest {
    ArtifactManifest::from_yaml(MANIFEST_YAML).unwrap()
}

/// Backend that returns fixed raw outputs regardless of the input.
pub struct StubBackend {
    pub raw_outputs: Vec<f32>,
}

impl InferenceBackend for StubBackend {
    fn infer(&self, _input: Array4<f32>) -> Result<Vec<f32>, BackendError> {
        Ok(self.raw_outputs.clone())
    }
}

/// Backend whose forward pass always fails.
pub struct FailingBackend;

impl InferenceBackend for FailingBackend {
    fn infer(&self, _input: Array4<f32>) -> Result<Vec<f32>, BackendError> {
        Err(BackendError::Ort(ort::Error::new("forward pass exploded")))
    }
}

/// A ready store over a `StubBackend` with the cat/dog manifest.
pub fn ready_store(raw_outputs: Vec<f32>) -> ModelStore {
    ModelStore::with_backend(manifest(), Box::new(StubBackend { raw_outputs }))
}

/// A ready store whose backend errors on every call.
pub fn failing_store() -> ModelStore {
    ModelStore::with_backend(manifest(), Box::new(FailingBackend))
}

/// A small valid PNG payload.
pub fn png_fixture() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb([120, 80, 40]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    buffer
}
