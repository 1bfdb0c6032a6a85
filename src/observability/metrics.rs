use crate::error::PredictError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Classification of a prediction request's outcome, used as the label on
/// the request counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestOutcome {
    Success,
    InvalidImage,
    ModelNotReady,
    InternalError,
    /// The caller abandoned the request before the result was produced.
    Cancelled,
}

impl RequestOutcome {
    pub const ALL: [RequestOutcome; 5] = [
        RequestOutcome::Success,
        RequestOutcome::InvalidImage,
        RequestOutcome::ModelNotReady,
        RequestOutcome::InternalError,
        RequestOutcome::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::InvalidImage => "invalid_image",
            RequestOutcome::ModelNotReady => "model_not_ready",
            RequestOutcome::InternalError => "internal_error",
            RequestOutcome::Cancelled => "cancelled",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl From<&PredictError> for RequestOutcome {
    fn from(err: &PredictError) -> Self {
        match err {
            PredictError::InvalidImage(_) => RequestOutcome::InvalidImage,
            PredictError::ModelNotReady => RequestOutcome::ModelNotReady,
            PredictError::InternalInference { .. } => RequestOutcome::InternalError,
        }
    }
}

/// One prediction request's contribution to the counters. Applied exactly
/// once per request.
#[derive(Debug)]
pub struct RequestEvent {
    pub outcome: RequestOutcome,
    pub latency: Duration,
    /// Winning class for successful predictions.
    pub class_index: Option<usize>,
}

/// Upper bucket bounds for the latency histogram, in seconds.
const LATENCY_BUCKETS: [f64; 10] = [
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

const METRIC_PREFIX: &str = "pawnnx";

/// Process-wide counters and histograms for the prediction path.
///
/// An explicit handle rather than a global recorder: the registry is owned
/// by the application state and passed to whoever records into it. All
/// mutation is a single atomic increment, so writers never block each other
/// and a snapshot never pauses them.
pub struct MetricsRegistry {
    requests: [AtomicU64; RequestOutcome::ALL.len()],
    classes: Vec<String>,
    predictions: Vec<AtomicU64>,
    latency_buckets: [AtomicU64; LATENCY_BUCKETS.len() + 1],
    latency_sum_micros: AtomicU64,
    latency_count: AtomicU64,
    model_loaded: AtomicU64,
}

impl MetricsRegistry {
    /// `classes` drives the per-class prediction counters; the order is the
    /// artifact manifest's class order.
    pub fn new(classes: &[String]) -> Self {
        Self {
            requests: std::array::from_fn(|_| AtomicU64::new(0)),
            classes: classes.to_vec(),
            predictions: classes.iter().map(|_| AtomicU64::new(0)).collect(),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            model_loaded: AtomicU64::new(0),
        }
    }

    /// Fold one finished request into the counters.
    pub fn record(&self, event: RequestEvent) {
        self.requests[event.outcome.index()].fetch_add(1, Ordering::Relaxed);

        let seconds = event.latency.as_secs_f64();
        let bucket = LATENCY_BUCKETS
            .iter()
            .position(|&le| seconds <= le)
            .unwrap_or(LATENCY_BUCKETS.len());
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_micros
            .fetch_add(event.latency.as_micros() as u64, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);

        if let Some(class_index) = event.class_index {
            if let Some(counter) = self.predictions.get(class_index) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded
            .store(if loaded { 1 } else { 0 }, Ordering::Relaxed);
    }

    pub fn requests_for(&self, outcome: RequestOutcome) -> u64 {
        self.requests[outcome.index()].load(Ordering::Relaxed)
    }

    pub fn predictions_for(&self, class_index: usize) -> u64 {
        self.predictions
            .get(class_index)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render all counters in Prometheus exposition format. Output ordering
    /// is fixed, so identical states render to identical text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "# HELP {p}_requests_total Prediction requests by outcome.\n\
             # TYPE {p}_requests_total counter\n",
            p = METRIC_PREFIX
        ));
        for outcome in RequestOutcome::ALL {
            out.push_str(&format!(
                "{p}_requests_total{{outcome=\"{}\"}} {}\n",
                outcome.as_str(),
                self.requests_for(outcome),
                p = METRIC_PREFIX
            ));
        }

        out.push_str(&format!(
            "# HELP {p}_predictions_total Successful predictions by class.\n\
             # TYPE {p}_predictions_total counter\n",
            p = METRIC_PREFIX
        ));
        for (class, counter) in self.classes.iter().zip(&self.predictions) {
            out.push_str(&format!(
                "{p}_predictions_total{{class=\"{}\"}} {}\n",
                class,
                counter.load(Ordering::Relaxed),
                p = METRIC_PREFIX
            ));
        }

        out.push_str(&format!(
            "# HELP {p}_inference_latency_seconds Prediction request latency.\n\
             # TYPE {p}_inference_latency_seconds histogram\n",
            p = METRIC_PREFIX
        ));
        let mut cumulative = 0u64;
        for (i, &le) in LATENCY_BUCKETS.iter().enumerate() {
            cumulative += self.latency_buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!(
                "{p}_inference_latency_seconds_bucket{{le=\"{le}\"}} {cumulative}\n",
                p = METRIC_PREFIX
            ));
        }
        cumulative += self.latency_buckets[LATENCY_BUCKETS.len()].load(Ordering::Relaxed);
        out.push_str(&format!(
            "{p}_inference_latency_seconds_bucket{{le=\"+Inf\"}} {cumulative}\n",
            p = METRIC_PREFIX
        ));
        out.push_str(&format!(
            "{p}_inference_latency_seconds_sum {}\n",
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            p = METRIC_PREFIX
        ));
        out.push_str(&format!(
            "{p}_inference_latency_seconds_count {}\n",
            self.latency_count.load(Ordering::Relaxed),
            p = METRIC_PREFIX
        ));

        out.push_str(&format!(
            "# HELP {p}_model_loaded Whether the model artifact is loaded.\n\
             # TYPE {p}_model_loaded gauge\n\
             {p}_model_loaded {}\n",
            self.model_loaded.load(Ordering::Relaxed),
            p = METRIC_PREFIX
        ));

        out
    }
}
