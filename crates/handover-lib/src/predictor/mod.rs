//! Predictive evaluation of handover candidates

mod adapter;
mod features;
mod inference;
mod output;

pub use adapter::{
    required_confidence, Prediction, PredictionError, PredictiveAdapter, PredictorStats,
    DEFAULT_PREDICTOR_TIMEOUT,
};
pub use features::{
    CandidateFeatures, FeatureExtractor, HandoverFeatures, FEATURE_VERSION, NUM_FEATURES,
};
pub use inference::{HeuristicClassifier, OnnxClassifier};
pub use output::{OutputInterpreter, TopCandidate};

use crate::models::CellId;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Probability distribution over candidate cells returned by a classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellDistribution {
    pub probabilities: Vec<(CellId, f64)>,
}

impl CellDistribution {
    pub fn new(probabilities: Vec<(CellId, f64)>) -> Self {
        Self { probabilities }
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn probability(&self, cell_id: &CellId) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(c, _)| c == cell_id)
            .map(|(_, p)| *p)
    }
}

/// External classifier producing a per-cell distribution
#[async_trait]
pub trait CellClassifier: Send + Sync {
    /// Score every candidate in `features`
    async fn classify(&self, features: &HandoverFeatures) -> Result<CellDistribution>;

    /// Version label of the model in use
    fn model_version(&self) -> String;
}
