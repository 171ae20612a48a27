//! Deterministic A3-style handover rule
//!
//! A target cell must beat the serving cell by more than the hysteresis
//! margin, continuously, for at least the time-to-trigger before the rule
//! fires. Mixed mode also requires the target's signal quality to clear a
//! threshold while the margin holds.

use crate::error::HandoverError;
use crate::models::{CellId, CellMeasurement, MeasurementSnapshot};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default hysteresis margin (dB)
pub const DEFAULT_HYSTERESIS_DB: f64 = 3.0;

/// Default time-to-trigger (seconds)
pub const DEFAULT_TIME_TO_TRIGGER_S: f64 = 0.64;

/// Rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Margin the target must exceed the serving cell by (dB)
    #[serde(default = "default_hysteresis")]
    pub hysteresis_db: f64,
    /// Duration the condition must hold before firing (seconds)
    #[serde(default = "default_time_to_trigger")]
    pub time_to_trigger_s: f64,
    /// Minimum target quality for mixed mode (dB); `None` is pure A3
    #[serde(default)]
    pub quality_threshold_db: Option<f64>,
}

fn default_hysteresis() -> f64 {
    DEFAULT_HYSTERESIS_DB
}

fn default_time_to_trigger() -> f64 {
    DEFAULT_TIME_TO_TRIGGER_S
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            hysteresis_db: DEFAULT_HYSTERESIS_DB,
            time_to_trigger_s: DEFAULT_TIME_TO_TRIGGER_S,
            quality_threshold_db: None,
        }
    }
}

/// Per-UE trigger timer
///
/// Tracks which target the margin condition currently holds for and since
/// when. Any tick where the condition fails clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerTimer {
    target: Option<CellId>,
    started_at: Option<f64>,
}

impl TriggerTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.target = None;
        self.started_at = None;
    }

    pub fn target(&self) -> Option<&CellId> {
        self.target.as_ref()
    }

    /// Accumulated time at `now`, zero when idle
    pub fn elapsed(&self, now: f64) -> f64 {
        self.started_at.map(|s| (now - s).max(0.0)).unwrap_or(0.0)
    }

    fn hold(&mut self, target: &CellId, now: f64) -> f64 {
        if self.target.as_ref() != Some(target) {
            self.target = Some(target.clone());
            self.started_at = Some(now);
        }
        self.elapsed(now)
    }
}

/// Result of one rule evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum RuleVerdict {
    /// Condition held long enough; hand over to this cell
    Fire(CellId),
    /// Condition holds but time-to-trigger has not elapsed
    Pending { target: CellId, elapsed_s: f64 },
    /// No neighbour satisfies the condition
    NotMet,
}

impl RuleVerdict {
    pub fn fired(&self) -> Option<&CellId> {
        match self {
            RuleVerdict::Fire(cell) => Some(cell),
            _ => None,
        }
    }
}

/// Hysteresis + time-to-trigger evaluator
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    config: RuleConfig,
}

impl RuleEvaluator {
    /// Validate the configuration; negative or non-finite values are rejected
    pub fn new(config: RuleConfig) -> Result<Self, HandoverError> {
        if !config.hysteresis_db.is_finite() || config.hysteresis_db < 0.0 {
            return Err(HandoverError::InvalidParameter(format!(
                "hysteresis_db must be >= 0, got {}",
                config.hysteresis_db
            )));
        }
        if !config.time_to_trigger_s.is_finite() || config.time_to_trigger_s < 0.0 {
            return Err(HandoverError::InvalidParameter(format!(
                "time_to_trigger_s must be >= 0, got {}",
                config.time_to_trigger_s
            )));
        }
        if let Some(q) = config.quality_threshold_db {
            if !q.is_finite() {
                return Err(HandoverError::InvalidParameter(format!(
                    "quality_threshold_db must be finite, got {}",
                    q
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Whether `target` satisfies the entry condition against `serving`.
    /// A missing serving measurement counts as a lost serving cell.
    pub fn condition_met(&self, serving: Option<&CellMeasurement>, target: &CellMeasurement) -> bool {
        let serving_signal = serving
            .map(|s| s.signal_strength_dbm)
            .unwrap_or(f64::NEG_INFINITY);
        let margin_ok = target.signal_strength_dbm - serving_signal > self.config.hysteresis_db;
        let quality_ok = self
            .config
            .quality_threshold_db
            .map(|q| target.signal_quality_db >= q)
            .unwrap_or(true);
        margin_ok && quality_ok
    }

    /// Evaluate one serving/target pair, advancing or clearing `timer`
    pub fn evaluate(
        &self,
        timer: &mut TriggerTimer,
        serving: Option<&CellMeasurement>,
        target: &CellMeasurement,
        now: f64,
    ) -> RuleVerdict {
        if !self.condition_met(serving, target) {
            timer.reset();
            return RuleVerdict::NotMet;
        }

        let elapsed_s = timer.hold(&target.cell_id, now);
        if elapsed_s >= self.config.time_to_trigger_s {
            timer.reset();
            RuleVerdict::Fire(target.cell_id.clone())
        } else {
            RuleVerdict::Pending {
                target: target.cell_id.clone(),
                elapsed_s,
            }
        }
    }

    /// Pick the strongest neighbour in the snapshot and evaluate it
    pub fn evaluate_snapshot(
        &self,
        timer: &mut TriggerTimer,
        serving_cell: &CellId,
        snapshot: &MeasurementSnapshot,
    ) -> RuleVerdict {
        let serving = snapshot.get(serving_cell);
        match best_neighbour(snapshot, serving_cell) {
            Some(target) => self.evaluate(timer, serving, target, snapshot.timestamp),
            None => {
                timer.reset();
                RuleVerdict::NotMet
            }
        }
    }
}

/// Strongest non-serving cell; ties break on quality, then on cell id
pub fn best_neighbour<'a>(
    snapshot: &'a MeasurementSnapshot,
    serving_cell: &CellId,
) -> Option<&'a CellMeasurement> {
    snapshot
        .measurements
        .iter()
        .filter(|m| &m.cell_id != serving_cell && m.signal_strength_dbm.is_finite())
        .max_by(|a, b| {
            a.signal_strength_dbm
                .partial_cmp(&b.signal_strength_dbm)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.signal_quality_db
                        .partial_cmp(&b.signal_quality_db)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| b.cell_id.cmp(&a.cell_id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meas(cell: &str, signal: f64, quality: f64) -> CellMeasurement {
        CellMeasurement::new(cell, signal, quality)
    }

    fn evaluator(hysteresis: f64, ttt: f64, quality: Option<f64>) -> RuleEvaluator {
        RuleEvaluator::new(RuleConfig {
            hysteresis_db: hysteresis,
            time_to_trigger_s: ttt,
            quality_threshold_db: quality,
        })
        .unwrap()
    }

    #[test]
    fn test_negative_parameters_rejected() {
        assert!(matches!(
            RuleEvaluator::new(RuleConfig {
                hysteresis_db: -1.0,
                ..Default::default()
            }),
            Err(HandoverError::InvalidParameter(_))
        ));
        assert!(matches!(
            RuleEvaluator::new(RuleConfig {
                time_to_trigger_s: -0.1,
                ..Default::default()
            }),
            Err(HandoverError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_ttt_fires_immediately() {
        let rule = evaluator(3.0, 0.0, None);
        let mut timer = TriggerTimer::new();
        let verdict = rule.evaluate(&mut timer, Some(&meas("A", -90.0, 5.0)), &meas("B", -85.0, 5.0), 1.0);
        assert_eq!(verdict, RuleVerdict::Fire(CellId::from("B")));
    }

    #[test]
    fn test_margin_must_exceed_hysteresis() {
        let rule = evaluator(3.0, 0.0, None);
        let mut timer = TriggerTimer::new();
        // Exactly at the margin is not enough
        let verdict = rule.evaluate(&mut timer, Some(&meas("A", -90.0, 5.0)), &meas("B", -87.0, 5.0), 1.0);
        assert_eq!(verdict, RuleVerdict::NotMet);
    }

    #[test]
    fn test_time_to_trigger_accumulates() {
        let rule = evaluator(3.0, 2.0, None);
        let mut timer = TriggerTimer::new();
        let serving = meas("A", -90.0, 5.0);
        let target = meas("B", -80.0, 5.0);

        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &target, 0.0),
            RuleVerdict::Pending { .. }
        ));
        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &target, 1.0),
            RuleVerdict::Pending { .. }
        ));
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &target, 2.0),
            RuleVerdict::Fire(CellId::from("B"))
        );
    }

    #[test]
    fn test_interruption_resets_timer() {
        let rule = evaluator(3.0, 2.0, None);
        let mut timer = TriggerTimer::new();
        let serving = meas("A", -90.0, 5.0);

        rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 0.0);
        rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 1.5);
        // Condition drops for one tick
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -89.0, 5.0), 1.8),
            RuleVerdict::NotMet
        );
        assert_eq!(timer.elapsed(1.8), 0.0);
        // No partial credit: restarts from zero
        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 2.0),
            RuleVerdict::Pending { .. }
        ));
        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 3.5),
            RuleVerdict::Pending { .. }
        ));
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 4.0),
            RuleVerdict::Fire(CellId::from("B"))
        );
    }

    #[test]
    fn test_target_change_restarts_timer() {
        let rule = evaluator(3.0, 1.0, None);
        let mut timer = TriggerTimer::new();
        let serving = meas("A", -90.0, 5.0);

        rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 5.0), 0.0);
        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &meas("C", -80.0, 5.0), 1.0),
            RuleVerdict::Pending { .. }
        ));
        assert_eq!(timer.target(), Some(&CellId::from("C")));
    }

    #[test]
    fn test_mixed_mode_requires_both_conditions() {
        let rule = evaluator(3.0, 0.0, Some(10.0));
        let mut timer = TriggerTimer::new();
        let serving = meas("A", -90.0, 5.0);

        // Margin holds, quality too low
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 8.0), 0.0),
            RuleVerdict::NotMet
        );
        // Quality holds, margin too small
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -89.0, 15.0), 1.0),
            RuleVerdict::NotMet
        );
        // Both hold
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 15.0), 2.0),
            RuleVerdict::Fire(CellId::from("B"))
        );
    }

    #[test]
    fn test_mixed_mode_quality_drop_resets_timer() {
        let rule = evaluator(3.0, 1.0, Some(10.0));
        let mut timer = TriggerTimer::new();
        let serving = meas("A", -90.0, 5.0);

        rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 12.0), 0.0);
        assert_eq!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 9.0), 0.5),
            RuleVerdict::NotMet
        );
        assert!(matches!(
            rule.evaluate(&mut timer, Some(&serving), &meas("B", -80.0, 12.0), 1.0),
            RuleVerdict::Pending { .. }
        ));
    }

    #[test]
    fn test_missing_serving_measurement() {
        let rule = evaluator(3.0, 0.0, None);
        let mut timer = TriggerTimer::new();
        assert_eq!(
            rule.evaluate(&mut timer, None, &meas("B", -110.0, 0.0), 0.0),
            RuleVerdict::Fire(CellId::from("B"))
        );
    }

    #[test]
    fn test_best_neighbour_selection() {
        let snapshot = MeasurementSnapshot::new(
            0.0,
            vec![
                meas("A", -70.0, 10.0),
                meas("B", -80.0, 5.0),
                meas("C", -80.0, 7.0),
                meas("D", -95.0, 20.0),
            ],
        );
        let best = best_neighbour(&snapshot, &CellId::from("A")).unwrap();
        assert_eq!(best.cell_id, CellId::from("C"));
    }

    #[test]
    fn test_best_neighbour_tie_prefers_lower_id() {
        let snapshot = MeasurementSnapshot::new(0.0, vec![meas("C", -80.0, 5.0), meas("B", -80.0, 5.0)]);
        let best = best_neighbour(&snapshot, &CellId::from("A")).unwrap();
        assert_eq!(best.cell_id, CellId::from("B"));
    }

    #[test]
    fn test_evaluate_snapshot_without_neighbours() {
        let rule = evaluator(3.0, 0.0, None);
        let mut timer = TriggerTimer::new();
        let snapshot = MeasurementSnapshot::new(0.0, vec![meas("A", -70.0, 10.0)]);
        assert_eq!(
            rule.evaluate_snapshot(&mut timer, &CellId::from("A"), &snapshot),
            RuleVerdict::NotMet
        );
    }
}
