//! Classifier output interpretation
//!
//! Validates a returned distribution against the features it was computed
//! from and reduces it to the top candidate and its confidence.

use super::{CellDistribution, HandoverFeatures};
use crate::models::CellId;
use std::cmp::Ordering;

/// Allowed slack when checking that probabilities sum to at most one
const SUM_TOLERANCE: f64 = 0.01;

/// Arg-max of a classifier distribution
#[derive(Debug, Clone, PartialEq)]
pub struct TopCandidate {
    pub cell_id: CellId,
    pub confidence: f64,
}

/// Reduces classifier output to a single candidate
#[derive(Debug, Clone, Default)]
pub struct OutputInterpreter;

impl OutputInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Pick the most probable cell
    ///
    /// Ties prefer the serving cell, then the lowest cell id. Any malformed
    /// output is an error so the caller can treat the predictor as
    /// unavailable.
    pub fn top_candidate(
        &self,
        distribution: &CellDistribution,
        features: &HandoverFeatures,
    ) -> Result<TopCandidate, String> {
        if distribution.is_empty() {
            return Err("empty distribution".to_string());
        }

        let mut sum = 0.0;
        for (cell_id, p) in &distribution.probabilities {
            if !p.is_finite() || *p < 0.0 || *p > 1.0 {
                return Err(format!("probability for {} out of range: {}", cell_id, p));
            }
            if features.candidate(cell_id).is_none() {
                return Err(format!("cell {} was not a candidate", cell_id));
            }
            sum += p;
        }
        if sum > 1.0 + SUM_TOLERANCE {
            return Err(format!("probabilities sum to {:.4}", sum));
        }

        let serving = &features.serving_cell;
        let best = distribution
            .probabilities
            .iter()
            .max_by(|(ca, pa), (cb, pb)| {
                pa.partial_cmp(pb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| (ca == serving).cmp(&(cb == serving)))
                    .then_with(|| cb.cmp(ca))
            })
            .map(|(c, p)| TopCandidate {
                cell_id: c.clone(),
                confidence: *p,
            });

        best.ok_or_else(|| "empty distribution".to_string())
    }
}
