use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub request_log: RequestLogConfig,
}

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Locations of the files produced by the offline training pipeline.
#[derive(Deserialize, Clone)]
pub struct ArtifactConfig {
    /// Serialized network (.onnx).
    pub model: PathBuf,
    /// Architecture descriptor (input shape, class order, normalization).
    pub manifest: PathBuf,
}

#[derive(Deserialize, Clone, Default)]
pub struct RequestLogConfig {
    /// Append target for JSONL request records. Stderr when absent.
    pub path: Option<PathBuf>,
}
