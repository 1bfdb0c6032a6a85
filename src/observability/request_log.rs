use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One line in the request log.
#[derive(Serialize, Debug)]
pub struct RequestLogEntry {
    pub timestamp_ms: u64,
    pub endpoint: &'static str,
    pub duration_ms: f64,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RequestLogEntry {
    pub fn new(endpoint: &'static str, duration: Duration, outcome: &'static str) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            timestamp_ms,
            endpoint,
            duration_ms: duration.as_secs_f64() * 1000.0,
            outcome,
            label: None,
            confidence: None,
        }
    }

    pub fn with_prediction(mut self, label: &str, confidence: f32) -> Self {
        self.label = Some(label.to_string());
        self.confidence = Some(confidence);
        self
    }
}

/// Append-only, line-oriented request record sink: one JSON object per
/// request, ordered by call sequence.
///
/// Logging must never break the request it is recording, so `append`
/// swallows sink failures and reports them through the process log only.
pub struct RequestLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl RequestLog {
    pub fn to_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::to_writer(Box::new(file)))
    }

    pub fn to_stderr() -> Self {
        Self::to_writer(Box::new(io::stderr()))
    }

    pub fn to_writer(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Append one record. Failures are swallowed.
    pub fn append(&self, entry: &RequestLogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "request log serialization failed");
                return;
            }
        };

        let mut sink = self.sink.lock().unwrap();
        if let Err(err) = writeln!(sink, "{line}").and_then(|_| sink.flush()) {
            tracing::warn!(error = %err, "request log write failed");
        }
    }
}
