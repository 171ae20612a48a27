//! Feature extraction for handover classification
//!
//! Turns a measurement snapshot, the UE's service profile and its tracker
//! state into an explicit, versioned feature struct. All values are
//! normalized so the classifier sees bounded inputs.

use crate::models::{CellId, MeasurementSnapshot, ServiceProfile, MAX_PRIORITY, MIN_PRIORITY};
use crate::registry::UeTrackerState;
use serde::{Deserialize, Serialize};

/// Layout version of [`HandoverFeatures`]
pub const FEATURE_VERSION: u16 = 2;

/// Number of values in one candidate row fed to the model
pub const NUM_FEATURES: usize = 9;

/// Signal strength normalization bounds (dBm), roughly the RSRP range
const MIN_SIGNAL_DBM: f64 = -140.0;
const MAX_SIGNAL_DBM: f64 = -44.0;

/// Signal quality normalization bounds (dB)
const MIN_QUALITY_DB: f64 = -20.0;
const MAX_QUALITY_DB: f64 = 30.0;

/// Margin at which the margin feature saturates (dB)
const MARGIN_SCALE_DB: f64 = 30.0;

/// Latency budget that maps to 1.0 (ms)
const MAX_LATENCY_BUDGET_MS: f64 = 1000.0;

/// Per-candidate features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFeatures {
    pub cell_id: CellId,
    pub signal_strength: f32,
    pub signal_quality: f32,
    pub interference_ratio: f32,
    /// Signal advantage over the serving cell, in -1..1
    pub margin: f32,
    /// 1.0 for the serving cell
    pub is_serving: f32,
}

/// Versioned feature set for one UE tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverFeatures {
    pub version: u16,
    pub serving_cell: CellId,
    pub candidates: Vec<CandidateFeatures>,
    pub priority: f32,
    /// Service latency ceiling relative to one second; lower is tighter
    pub latency_budget: f32,
    /// Handovers in the trailing rate window, relative to a 10-per-window ceiling
    pub handover_rate: f32,
    /// Seconds since the last handover relative to one minute; 1.0 if none
    pub time_since_last_handover: f32,
}

impl HandoverFeatures {
    /// Model input row for one candidate
    pub fn row(&self, candidate: &CandidateFeatures) -> [f32; NUM_FEATURES] {
        [
            candidate.signal_strength,
            candidate.signal_quality,
            candidate.interference_ratio,
            candidate.margin,
            candidate.is_serving,
            self.priority,
            self.latency_budget,
            self.handover_rate,
            self.time_since_last_handover,
        ]
    }

    pub fn candidate(&self, cell_id: &CellId) -> Option<&CandidateFeatures> {
        self.candidates.iter().find(|c| &c.cell_id == cell_id)
    }

    /// Check version, presence and ranges before the classifier sees the struct
    pub fn validate(&self) -> Result<(), String> {
        if self.version != FEATURE_VERSION {
            return Err(format!(
                "feature version {} unsupported (expected {})",
                self.version, FEATURE_VERSION
            ));
        }
        if self.candidates.is_empty() {
            return Err("no candidate cells".to_string());
        }
        let unit = |name: &str, v: f32| -> Result<(), String> {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(format!("{} out of range: {}", name, v))
            }
        };
        unit("priority", self.priority)?;
        unit("latency_budget", self.latency_budget)?;
        unit("handover_rate", self.handover_rate)?;
        unit("time_since_last_handover", self.time_since_last_handover)?;
        for c in &self.candidates {
            unit("signal_strength", c.signal_strength)?;
            unit("signal_quality", c.signal_quality)?;
            unit("interference_ratio", c.interference_ratio)?;
            unit("is_serving", c.is_serving)?;
            if !c.margin.is_finite() || !(-1.0..=1.0).contains(&c.margin) {
                return Err(format!("margin out of range for {}: {}", c.cell_id, c.margin));
            }
        }
        Ok(())
    }
}

/// Builds [`HandoverFeatures`] from raw inputs
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    rate_window_s: f64,
}

impl FeatureExtractor {
    pub fn new(rate_window_s: f64) -> Self {
        Self { rate_window_s }
    }

    /// Returns `None` when the snapshot has no usable measurement
    pub fn extract(
        &self,
        snapshot: &MeasurementSnapshot,
        profile: &ServiceProfile,
        tracker: &UeTrackerState,
    ) -> Option<HandoverFeatures> {
        let usable: Vec<_> = snapshot
            .measurements
            .iter()
            .filter(|m| m.signal_strength_dbm.is_finite() && m.signal_quality_db.is_finite())
            .collect();
        if usable.is_empty() {
            return None;
        }

        let serving_cell = tracker.current_cell();
        let serving_signal = usable
            .iter()
            .find(|m| &m.cell_id == serving_cell)
            .map(|m| m.signal_strength_dbm)
            .unwrap_or(MIN_SIGNAL_DBM);

        let candidates = usable
            .iter()
            .map(|m| CandidateFeatures {
                cell_id: m.cell_id.clone(),
                signal_strength: normalize(m.signal_strength_dbm, MIN_SIGNAL_DBM, MAX_SIGNAL_DBM),
                signal_quality: normalize(m.signal_quality_db, MIN_QUALITY_DB, MAX_QUALITY_DB),
                interference_ratio: clamp_unit(m.interference_ratio),
                margin: ((m.signal_strength_dbm - serving_signal) / MARGIN_SCALE_DB).clamp(-1.0, 1.0)
                    as f32,
                is_serving: if &m.cell_id == serving_cell { 1.0 } else { 0.0 },
            })
            .collect();

        let now = snapshot.timestamp;
        let cutoff = now - self.rate_window_s;
        let recent = tracker
            .recent_handover_timestamps()
            .filter(|ts| *ts >= cutoff)
            .count();

        let time_since_last_handover = tracker
            .last_handover_time()
            .map(|t| clamp_unit((now - t) / 60.0))
            .unwrap_or(1.0);

        Some(HandoverFeatures {
            version: FEATURE_VERSION,
            serving_cell: serving_cell.clone(),
            candidates,
            priority: ((profile.priority.clamp(MIN_PRIORITY, MAX_PRIORITY) - MIN_PRIORITY) as f64
                / (MAX_PRIORITY - MIN_PRIORITY) as f64) as f32,
            latency_budget: clamp_unit(profile.effective_qos().max_latency_ms / MAX_LATENCY_BUDGET_MS),
            handover_rate: clamp_unit(recent as f64 / 10.0),
            time_since_last_handover,
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(60.0)
    }
}

fn normalize(value: f64, min: f64, max: f64) -> f32 {
    ((value - min) / (max - min)).clamp(0.0, 1.0) as f32
}

fn clamp_unit(value: f64) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}
