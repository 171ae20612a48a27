//! Predictive evaluator adapter
//!
//! Wraps a [`CellClassifier`] with feature extraction, a hard timeout,
//! output validation and the priority-dependent confidence gate.

use super::{CellClassifier, FeatureExtractor, OutputInterpreter};
use crate::models::{CellId, MeasurementSnapshot, ServiceProfile, MAX_PRIORITY, MIN_PRIORITY};
use crate::registry::UeTrackerState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum classifier latency before the call is abandoned
pub const DEFAULT_PREDICTOR_TIMEOUT: Duration = Duration::from_millis(100);

const BASE_CONFIDENCE: f64 = 0.5;
const CONFIDENCE_SPAN: f64 = 0.45;

/// Confidence a prediction needs for a UE of the given priority
///
/// Linear from 0.5 at priority 1 to 0.95 at priority 10. Out-of-range
/// priorities are clamped.
pub fn required_confidence(priority: u8) -> f64 {
    let p = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
    BASE_CONFIDENCE
        + (p - MIN_PRIORITY) as f64 / (MAX_PRIORITY - MIN_PRIORITY) as f64 * CONFIDENCE_SPAN
}

/// Why a prediction could not be used
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("confidence {confidence:.3} for {candidate} below required {required:.3}")]
    InsufficientConfidence {
        candidate: CellId,
        confidence: f64,
        required: f64,
    },
    #[error("predictor unavailable: {0}")]
    PredictorUnavailable(String),
}

/// A prediction that cleared the confidence gate
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub candidate_cell: CellId,
    pub confidence: f64,
    pub required_confidence: f64,
    pub model_version: String,
    pub latency: Duration,
}

/// Counters for adapter calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictorStats {
    pub calls: u64,
    pub accepted: u64,
    pub insufficient_confidence: u64,
    pub unavailable: u64,
    pub timeouts: u64,
}

/// Bounded, validated access to the external classifier
pub struct PredictiveAdapter {
    classifier: Arc<dyn CellClassifier>,
    extractor: FeatureExtractor,
    interpreter: OutputInterpreter,
    timeout: Duration,
    calls: AtomicU64,
    accepted: AtomicU64,
    insufficient: AtomicU64,
    unavailable: AtomicU64,
    timeouts: AtomicU64,
}

impl PredictiveAdapter {
    pub fn new(classifier: Arc<dyn CellClassifier>, timeout: Duration) -> Self {
        Self::with_extractor(classifier, timeout, FeatureExtractor::default())
    }

    pub fn with_extractor(
        classifier: Arc<dyn CellClassifier>,
        timeout: Duration,
        extractor: FeatureExtractor,
    ) -> Self {
        Self {
            classifier,
            extractor,
            interpreter: OutputInterpreter::new(),
            timeout,
            calls: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            insufficient: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn model_version(&self) -> String {
        self.classifier.model_version()
    }

    /// Predict a target cell for one UE tick
    pub async fn evaluate(
        &self,
        snapshot: &MeasurementSnapshot,
        profile: &ServiceProfile,
        tracker: &UeTrackerState,
    ) -> Result<Prediction, PredictionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let features = match self.extractor.extract(snapshot, profile, tracker) {
            Some(f) => f,
            None => return Err(self.unavailable("no usable measurements".to_string())),
        };
        if let Err(e) = features.validate() {
            return Err(self.unavailable(format!("invalid features: {}", e)));
        }

        let distribution =
            match tokio::time::timeout(self.timeout, self.classifier.classify(&features)).await {
                Ok(Ok(d)) => d,
                Ok(Err(e)) => {
                    warn!(error = %e, "Classifier error");
                    return Err(self.unavailable(format!("classifier error: {}", e)));
                }
                Err(_) => {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "Classifier timeout");
                    return Err(self.unavailable(format!(
                        "classifier timed out after {}ms",
                        self.timeout.as_millis()
                    )));
                }
            };

        let top = self
            .interpreter
            .top_candidate(&distribution, &features)
            .map_err(|e| self.unavailable(format!("invalid output: {}", e)))?;

        let required = required_confidence(profile.priority);
        let latency = start.elapsed();
        debug!(
            candidate = %top.cell_id,
            confidence = top.confidence,
            required,
            latency_us = latency.as_micros() as u64,
            "Prediction computed"
        );

        if top.confidence < required {
            self.insufficient.fetch_add(1, Ordering::Relaxed);
            return Err(PredictionError::InsufficientConfidence {
                candidate: top.cell_id,
                confidence: top.confidence,
                required,
            });
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(Prediction {
            candidate_cell: top.cell_id,
            confidence: top.confidence,
            required_confidence: required,
            model_version: self.classifier.model_version(),
            latency,
        })
    }

    pub fn stats(&self) -> PredictorStats {
        PredictorStats {
            calls: self.calls.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            insufficient_confidence: self.insufficient.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    fn unavailable(&self, reason: String) -> PredictionError {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
        PredictionError::PredictorUnavailable(reason)
    }
}
