use crate::models::CellId;
use crate::pingpong::SuppressionReason;
use crate::predictor::PredictionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a tick derives its candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Rule,
    Predictive,
}

impl EvaluationMode {
    /// Predictive once the topology has `min_antennas` cells
    pub fn for_cell_count(cell_count: usize, min_antennas: usize) -> Self {
        if cell_count >= min_antennas {
            EvaluationMode::Predictive
        } else {
            EvaluationMode::Rule
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::Rule => "rule",
            EvaluationMode::Predictive => "predictive",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a tick did not change the serving cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoChange,
    Suppressed(SuppressionReason),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoChange => f.write_str("no_change"),
            SkipReason::Suppressed(reason) => fmt::Display::fmt(reason, f),
        }
    }
}

/// Why the predictive path handed over to the rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    InsufficientConfidence {
        candidate: CellId,
        confidence: f64,
        required: f64,
    },
    PredictorUnavailable {
        detail: String,
    },
}

impl FallbackReason {
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::InsufficientConfidence { .. } => "insufficient_confidence",
            FallbackReason::PredictorUnavailable { .. } => "predictor_unavailable",
        }
    }
}

impl From<PredictionError> for FallbackReason {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::InsufficientConfidence {
                candidate,
                confidence,
                required,
            } => FallbackReason::InsufficientConfidence {
                candidate,
                confidence,
                required,
            },
            PredictionError::PredictorUnavailable(detail) => {
                FallbackReason::PredictorUnavailable { detail }
            }
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InsufficientConfidence {
                candidate,
                confidence,
                required,
            } => write!(
                f,
                "insufficient confidence {:.3} < {:.3} for {}",
                confidence, required, candidate
            ),
            FallbackReason::PredictorUnavailable { detail } => {
                write!(f, "predictor unavailable: {}", detail)
            }
        }
    }
}

/// What became of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    Applied {
        target_cell: CellId,
        /// `None` for rule-derived handovers
        confidence: Option<f64>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl Resolution {
    pub fn into_outcome(self, mode: EvaluationMode) -> DecisionOutcome {
        match self {
            Resolution::Applied {
                target_cell,
                confidence,
            } => DecisionOutcome::Applied {
                target_cell,
                confidence,
                mode,
            },
            Resolution::Skipped { reason } => DecisionOutcome::Skipped { reason },
        }
    }

    pub fn applied_cell(&self) -> Option<&CellId> {
        match self {
            Resolution::Applied { target_cell, .. } => Some(target_cell),
            Resolution::Skipped { .. } => None,
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Applied {
        target_cell: CellId,
        confidence: Option<f64>,
        mode: EvaluationMode,
    },
    Skipped {
        reason: SkipReason,
    },
    /// Predictive mode could not be used; `rule_result` is what the rule did
    FallenBack {
        reason: FallbackReason,
        mode: EvaluationMode,
        rule_result: Resolution,
    },
}

impl DecisionOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            DecisionOutcome::Applied { .. } => "applied",
            DecisionOutcome::Skipped { .. } => "skipped",
            DecisionOutcome::FallenBack { .. } => "fallen_back",
        }
    }

    /// Cell the UE was handed over to on this tick, if any
    pub fn committed_cell(&self) -> Option<&CellId> {
        match self {
            DecisionOutcome::Applied { target_cell, .. } => Some(target_cell),
            DecisionOutcome::Skipped { .. } => None,
            DecisionOutcome::FallenBack { rule_result, .. } => rule_result.applied_cell(),
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionOutcome::Applied {
                target_cell,
                confidence: Some(c),
                mode,
            } => write!(f, "applied {} ({}, {:.2})", target_cell, mode, c),
            DecisionOutcome::Applied {
                target_cell, mode, ..
            } => write!(f, "applied {} ({})", target_cell, mode),
            DecisionOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            DecisionOutcome::FallenBack {
                reason,
                rule_result,
                ..
            } => match rule_result {
                Resolution::Applied { target_cell, .. } => {
                    write!(f, "fallback [{}] -> applied {}", reason.label(), target_cell)
                }
                Resolution::Skipped { reason: skip } => {
                    write!(f, "fallback [{}] -> skipped ({})", reason.label(), skip)
                }
            },
        }
    }
}
