use crate::model::artifact::{ArtifactManifest, ManifestError};
use crate::model::backend::{BackendError, InferenceBackend, OnnxBackend};
use crate::preprocessing::image::ImageTransform;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Readiness of the serving process, derived from the artifact load phase on
/// each query.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Starting,
    Ready,
    Failed,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Ready => "ready",
            HealthState::Failed => "failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A fully loaded artifact: the manifest, the transform derived from it, and
/// the network itself. Shared read-only between all in-flight requests.
pub struct ReadyModel {
    pub manifest: ArtifactManifest,
    pub transform: ImageTransform,
    pub backend: Box<dyn InferenceBackend>,
}

enum Phase {
    Starting,
    Ready(Arc<ReadyModel>),
    Failed(String),
}

/// Owns the model artifact for the lifetime of the process.
///
/// The phase moves `starting -> ready` or `starting -> failed` exactly once,
/// at startup. Both failure outcomes are terminal for this process instance;
/// a bad prediction never moves a ready store out of `ready`.
pub struct ModelStore {
    phase: RwLock<Phase>,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStore {
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(Phase::Starting),
        }
    }

    /// Construct a store that is already serving the given network, skipping
    /// the artifact files. Used when the network is provided by the embedder.
    pub fn with_backend(manifest: ArtifactManifest, backend: Box<dyn InferenceBackend>) -> Self {
        let transform = ImageTransform::from_manifest(&manifest);
        let model = ReadyModel {
            manifest,
            transform,
            backend,
        };
        Self {
            phase: RwLock::new(Phase::Ready(Arc::new(model))),
        }
    }

    /// Read the artifact pair from disk and transition out of `starting`.
    ///
    /// Load failures are captured into the terminal `failed` phase rather
    /// than propagated, so startup probing keeps working against a broken
    /// artifact. Calling this on a store that already left `starting` is a
    /// no-op.
    pub fn load(&self, model_path: &Path, manifest_path: &Path) {
        let mut phase = self.phase.write().unwrap();
        if !matches!(*phase, Phase::Starting) {
            tracing::warn!("model store load called more than once; ignoring");
            return;
        }

        match Self::try_load(model_path, manifest_path) {
            Ok(model) => {
                tracing::info!(
                    classes = ?model.manifest.classes,
                    height = model.manifest.input.height,
                    width = model.manifest.input.width,
                    "model artifact loaded"
                );
                *phase = Phase::Ready(Arc::new(model));
            }
            Err(err) => {
                tracing::error!(error = %err, "model artifact failed to load");
                *phase = Phase::Failed(err.to_string());
            }
        }
    }

    fn try_load(model_path: &Path, manifest_path: &Path) -> Result<ReadyModel, LoadError> {
        let manifest = ArtifactManifest::from_file(manifest_path)?;
        let backend = OnnxBackend::load(model_path)?;
        let transform = ImageTransform::from_manifest(&manifest);
        Ok(ReadyModel {
            manifest,
            transform,
            backend: Box::new(backend),
        })
    }

    /// Cheap, side-effect-free readiness probe.
    pub fn health(&self) -> HealthState {
        match *self.phase.read().unwrap() {
            Phase::Starting => HealthState::Starting,
            Phase::Ready(_) => HealthState::Ready,
            Phase::Failed(_) => HealthState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.health() == HealthState::Ready
    }

    /// Cause recorded by a failed load, if any.
    pub fn failure_cause(&self) -> Option<String> {
        match *self.phase.read().unwrap() {
            Phase::Failed(ref cause) => Some(cause.clone()),
            _ => None,
        }
    }

    /// Snapshot of the loaded model, or `None` while not `ready`. One lock
    /// read per request; the returned handle stays valid for the whole call.
    pub fn ready(&self) -> Option<Arc<ReadyModel>> {
        match *self.phase.read().unwrap() {
            Phase::Ready(ref model) => Some(Arc::clone(model)),
            _ => None,
        }
    }
}
