//! Decision orchestration
//!
//! One call to [`DecisionOrchestrator::tick`] resolves one UE's measurement
//! snapshot into a [`DecisionOutcome`]:
//!
//! - pick the evaluation mode from the registered cell count
//! - derive a candidate (rule, or predictor with rule fallback)
//! - run a differing candidate through the ping-pong gates
//! - commit allowed handovers to the registry

mod config;
mod outcome;

pub use config::HandoverConfig;
pub use outcome::{DecisionOutcome, EvaluationMode, FallbackReason, Resolution, SkipReason};

use crate::error::Result;
use crate::health::HealthRegistry;
use crate::models::{CellId, MeasurementSnapshot, ServiceProfile, UeId};
use crate::observability::{HandoverMetrics, StructuredLogger};
use crate::pingpong::PingPongSuppressor;
use crate::predictor::{CellClassifier, PredictionError, PredictiveAdapter};
use crate::registry::{StateRegistry, UeTrackerState};
use crate::rule::RuleEvaluator;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Confidence used when gating rule-derived candidates
const RULE_GATING_CONFIDENCE: f64 = 0.0;

const MODE_UNKNOWN: u8 = 0;
const MODE_RULE: u8 = 1;
const MODE_PREDICTIVE: u8 = 2;

/// Per-tick handover decision pipeline
pub struct DecisionOrchestrator {
    registry: Arc<StateRegistry>,
    rule: RuleEvaluator,
    adapter: Option<PredictiveAdapter>,
    suppressor: PingPongSuppressor,
    min_antennas_for_predictive: usize,
    last_mode: AtomicU8,
    metrics: HandoverMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl DecisionOrchestrator {
    /// Build the pipeline; invalid configuration is rejected here, never per tick
    pub fn new(
        registry: Arc<StateRegistry>,
        classifier: Option<Arc<dyn CellClassifier>>,
        config: HandoverConfig,
    ) -> Result<Self> {
        config.validate()?;
        let rule = RuleEvaluator::new(config.rule.clone())?;
        let suppressor = PingPongSuppressor::new(config.pingpong.clone())?;
        let adapter = classifier.map(|c| {
            PredictiveAdapter::with_extractor(c, config.predictor_timeout(), config.feature_extractor())
        });

        Ok(Self {
            registry,
            rule,
            adapter,
            suppressor,
            min_antennas_for_predictive: config.min_antennas_for_predictive,
            last_mode: AtomicU8::new(MODE_UNKNOWN),
            metrics: HandoverMetrics::new(),
            logger: StructuredLogger::new("handover-core"),
            health: None,
        })
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Report predictor health into `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn registry(&self) -> &Arc<StateRegistry> {
        &self.registry
    }

    pub fn predictor(&self) -> Option<&PredictiveAdapter> {
        self.adapter.as_ref()
    }

    /// Mode a tick would use with the current topology
    pub fn current_mode(&self) -> EvaluationMode {
        EvaluationMode::for_cell_count(self.registry.cell_count(), self.min_antennas_for_predictive)
    }

    /// Evaluate one tick for one UE
    ///
    /// Only `UnknownUe` and registry errors are returned; predictor problems
    /// resolve into `FallenBack` outcomes.
    pub async fn tick(&self, ue_id: &UeId, snapshot: &MeasurementSnapshot) -> Result<DecisionOutcome> {
        let tracker = self.registry.get_tracker(ue_id)?;
        let profile = self.registry.service_profile(ue_id)?;
        let snapshot = self.registered_only(snapshot);
        let mode = self.observe_mode();

        debug!(
            ue_id = %ue_id,
            serving = %tracker.current_cell(),
            mode = %mode,
            measurements = snapshot.measurements.len(),
            timestamp = snapshot.timestamp,
            "Evaluating tick"
        );

        let outcome = match mode {
            EvaluationMode::Rule => self
                .rule_resolution(ue_id, tracker, &snapshot)?
                .into_outcome(mode),
            EvaluationMode::Predictive => {
                self.predictive_tick(ue_id, tracker, &profile, &snapshot)
                    .await?
            }
        };

        self.metrics.inc_decision(outcome.label(), mode.as_str());
        self.metrics
            .set_topology(self.registry.cell_count(), self.registry.ue_count());
        Ok(outcome)
    }

    async fn predictive_tick(
        &self,
        ue_id: &UeId,
        tracker: UeTrackerState,
        profile: &ServiceProfile,
        snapshot: &MeasurementSnapshot,
    ) -> Result<DecisionOutcome> {
        let mode = EvaluationMode::Predictive;
        let prediction = match &self.adapter {
            Some(adapter) => {
                let start = Instant::now();
                let result = adapter.evaluate(snapshot, profile, &tracker).await;
                self.metrics
                    .observe_predictor_latency(start.elapsed().as_secs_f64());
                result
            }
            None => Err(PredictionError::PredictorUnavailable(
                "no classifier configured".to_string(),
            )),
        };

        match prediction {
            Ok(prediction) => {
                self.report_predictor(None).await;
                // The rule did not see this tick, so its condition did not hold continuously
                self.registry
                    .with_entry_mut(ue_id, |entry| entry.rule_timer.reset())?;
                let resolution = self.resolve(
                    ue_id,
                    tracker,
                    prediction.candidate_cell,
                    Some(prediction.confidence),
                    mode,
                    snapshot.timestamp,
                )?;
                Ok(resolution.into_outcome(mode))
            }
            Err(err) => {
                let reason = FallbackReason::from(err);
                match &reason {
                    FallbackReason::PredictorUnavailable { detail } => {
                        self.report_predictor(Some(detail.as_str())).await
                    }
                    // An on-time answer, however unsure, means the predictor is reachable
                    FallbackReason::InsufficientConfidence { .. } => {
                        self.report_predictor(None).await
                    }
                }
                self.metrics.inc_fallback(reason.label());
                self.logger
                    .log_predictor_fallback(ue_id.as_str(), reason.label(), &reason.to_string());

                let rule_result = self.rule_resolution(ue_id, tracker, snapshot)?;
                Ok(DecisionOutcome::FallenBack {
                    reason,
                    mode,
                    rule_result,
                })
            }
        }
    }

    /// Run the rule and resolve whatever it fires
    fn rule_resolution(
        &self,
        ue_id: &UeId,
        tracker: UeTrackerState,
        snapshot: &MeasurementSnapshot,
    ) -> Result<Resolution> {
        match self.rule_candidate(ue_id, &tracker, snapshot)? {
            Some(target) => self.resolve(
                ue_id,
                tracker,
                target,
                None,
                EvaluationMode::Rule,
                snapshot.timestamp,
            ),
            None => Ok(Resolution::Skipped {
                reason: SkipReason::NoChange,
            }),
        }
    }

    /// Advance the UE's trigger timer and return the fired target, if any
    fn rule_candidate(
        &self,
        ue_id: &UeId,
        tracker: &UeTrackerState,
        snapshot: &MeasurementSnapshot,
    ) -> Result<Option<CellId>> {
        let serving = tracker.current_cell().clone();
        let verdict = self.registry.with_entry_mut(ue_id, |entry| {
            self.rule
                .evaluate_snapshot(&mut entry.rule_timer, &serving, snapshot)
        })?;
        debug!(ue_id = %ue_id, verdict = ?verdict, "Rule evaluated");
        Ok(verdict.fired().cloned())
    }

    /// Gate a candidate and commit it if allowed
    ///
    /// Gating runs on the caller's tracker copy, so a suppressed or
    /// unchanged candidate leaves the registry untouched.
    fn resolve(
        &self,
        ue_id: &UeId,
        mut tracker: UeTrackerState,
        candidate: CellId,
        confidence: Option<f64>,
        mode: EvaluationMode,
        now: f64,
    ) -> Result<Resolution> {
        if &candidate == tracker.current_cell() {
            return Ok(Resolution::Skipped {
                reason: SkipReason::NoChange,
            });
        }

        let gating_confidence = confidence.unwrap_or(RULE_GATING_CONFIDENCE);
        if let Some(reason) = self
            .suppressor
            .evaluate(&mut tracker, &candidate, gating_confidence, now)
        {
            self.metrics.inc_suppression(reason.as_str());
            self.logger.log_handover_suppressed(
                ue_id.as_str(),
                candidate.as_str(),
                reason.as_str(),
                gating_confidence,
                now,
            );
            return Ok(Resolution::Skipped {
                reason: SkipReason::Suppressed(reason),
            });
        }

        let from = tracker.current_cell().clone();
        self.registry.commit_handover(ue_id, candidate.clone(), now)?;
        self.logger.log_handover_applied(
            ue_id.as_str(),
            from.as_str(),
            candidate.as_str(),
            mode.as_str(),
            confidence,
            now,
        );
        Ok(Resolution::Applied {
            target_cell: candidate,
            confidence,
        })
    }

    /// Recompute the mode and log transitions
    fn observe_mode(&self) -> EvaluationMode {
        let cell_count = self.registry.cell_count();
        let mode = EvaluationMode::for_cell_count(cell_count, self.min_antennas_for_predictive);
        let encoded = match mode {
            EvaluationMode::Rule => MODE_RULE,
            EvaluationMode::Predictive => MODE_PREDICTIVE,
        };
        let previous = self.last_mode.swap(encoded, Ordering::AcqRel);
        if previous != encoded {
            let from = match previous {
                MODE_RULE => "rule",
                MODE_PREDICTIVE => "predictive",
                _ => "none",
            };
            self.logger.log_mode_changed(from, mode.as_str(), cell_count);
            self.metrics
                .set_predictive_mode(mode == EvaluationMode::Predictive);
        }
        mode
    }

    /// Drop measurements for cells the registry does not know
    fn registered_only(&self, snapshot: &MeasurementSnapshot) -> MeasurementSnapshot {
        MeasurementSnapshot::new(
            snapshot.timestamp,
            snapshot
                .measurements
                .iter()
                .filter(|m| self.registry.has_cell(&m.cell_id))
                .cloned()
                .collect(),
        )
    }

    async fn report_predictor(&self, failure: Option<&str>) {
        if let Some(health) = &self.health {
            match failure {
                Some(detail) => health.report_predictor_failure(detail).await,
                None => health.report_predictor_ok().await,
            }
        }
    }
}

mod tests;
