use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// Architecture descriptor written by the training pipeline next to the
/// serialized network.
///
/// The manifest is the single source of truth for the input shape, the class
/// label ordering, and the normalization constants. Serving never hard-codes
/// any of these; a mismatch between training and serving can therefore only
/// come from loading the wrong artifact pair, not from drifted constants.
#[derive(Deserialize, Clone, Debug)]
pub struct ArtifactManifest {
    pub format_version: u32,
    pub input: InputShape,
    /// Ordered class labels. The model's output index i corresponds to
    /// `classes[i]`.
    pub classes: Vec<String>,
    pub normalization: Normalization,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct InputShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

/// Per-channel `(x / 255 - mean) / std` constants, in RGB order.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Manifest format revisions this build can serve.
const SUPPORTED_FORMAT_VERSION: u32 = 1;

impl ArtifactManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ManifestError> {
        let manifest: ArtifactManifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ManifestError::Invalid(format!(
                "unsupported format_version {} (expected {})",
                self.format_version, SUPPORTED_FORMAT_VERSION
            )));
        }
        if self.classes.len() < 2 {
            return Err(ManifestError::Invalid(format!(
                "expected at least 2 classes, got {}",
                self.classes.len()
            )));
        }
        if self.input.channels != 3 {
            return Err(ManifestError::Invalid(format!(
                "only 3-channel RGB input is supported, got {} channels",
                self.input.channels
            )));
        }
        if self.input.height == 0 || self.input.width == 0 {
            return Err(ManifestError::Invalid(format!(
                "input dimensions must be non-zero, got {}x{}",
                self.input.height, self.input.width
            )));
        }
        if self.normalization.std.iter().any(|&s| s == 0.0) {
            return Err(ManifestError::Invalid(
                "normalization std must not contain zeros".to_string(),
            ));
        }
        Ok(())
    }
}
