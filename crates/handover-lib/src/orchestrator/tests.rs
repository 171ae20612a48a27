//! Tick-level tests for the decision orchestrator
//!
//! Classifiers are scripted so each tick's prediction is controlled by the
//! test.

#[cfg(test)]
mod tick_tests {
    use crate::error::HandoverError;
    use crate::health::{components, ComponentStatus, HealthRegistry};
    use crate::models::{Cell, CellId, CellMeasurement, MeasurementSnapshot, ServiceProfile, ServiceType, UeId};
    use crate::orchestrator::{
        DecisionOrchestrator, DecisionOutcome, EvaluationMode, FallbackReason, HandoverConfig,
        Resolution, SkipReason,
    };
    use crate::pingpong::SuppressionReason;
    use crate::predictor::{CellClassifier, CellDistribution, HandoverFeatures};
    use crate::registry::StateRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Returns whatever distribution the test last set
    struct ScriptedClassifier {
        output: Mutex<Vec<(CellId, f64)>>,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        fn new(output: &[(&str, f64)]) -> Arc<Self> {
            let classifier = Arc::new(Self {
                output: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            });
            classifier.set(output);
            classifier
        }

        fn set(&self, output: &[(&str, f64)]) {
            *self.output.lock().unwrap() =
                output.iter().map(|(c, p)| (CellId::from(*c), *p)).collect();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CellClassifier for ScriptedClassifier {
        async fn classify(&self, _: &HandoverFeatures) -> anyhow::Result<CellDistribution> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CellDistribution::new(self.output.lock().unwrap().clone()))
        }

        fn model_version(&self) -> String {
            "scripted".to_string()
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl CellClassifier for BrokenClassifier {
        async fn classify(&self, _: &HandoverFeatures) -> anyhow::Result<CellDistribution> {
            anyhow::bail!("inference backend offline")
        }

        fn model_version(&self) -> String {
            "broken".to_string()
        }
    }

    fn registry(cells: &[&str]) -> Arc<StateRegistry> {
        let registry = StateRegistry::new();
        for (i, id) in cells.iter().enumerate() {
            registry
                .register_cell(Cell::new(*id, i as f64 * 600.0, 0.0, 500.0))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn register_ue(registry: &StateRegistry, priority: u8) -> UeId {
        let ue = UeId::from("ue-1");
        registry
            .register_ue(
                ue.clone(),
                CellId::from("A"),
                ServiceProfile::new(ServiceType::Default, priority).unwrap(),
                0.0,
            )
            .unwrap();
        ue
    }

    fn instant_rule() -> HandoverConfig {
        let mut config = HandoverConfig::default();
        config.rule.time_to_trigger_s = 0.0;
        config
    }

    fn snapshot(ts: f64, signals: &[(&str, f64)]) -> MeasurementSnapshot {
        MeasurementSnapshot::new(
            ts,
            signals
                .iter()
                .map(|(c, s)| CellMeasurement::new(*c, *s, 10.0))
                .collect(),
        )
    }

    fn is_predictive_apply(outcome: &DecisionOutcome) -> bool {
        matches!(
            outcome,
            DecisionOutcome::Applied {
                mode: EvaluationMode::Predictive,
                ..
            }
        )
    }

    #[tokio::test]
    async fn test_rule_mode_waits_for_time_to_trigger() {
        let registry = registry(&["A", "B"]);
        let ue = register_ue(&registry, 5);
        let orchestrator =
            DecisionOrchestrator::new(registry.clone(), None, HandoverConfig::default()).unwrap();

        let signals = [("A", -100.0), ("B", -90.0)];
        let first = orchestrator.tick(&ue, &snapshot(1.0, &signals)).await.unwrap();
        assert_eq!(
            first,
            DecisionOutcome::Skipped {
                reason: SkipReason::NoChange
            }
        );

        let second = orchestrator.tick(&ue, &snapshot(1.7, &signals)).await.unwrap();
        assert_eq!(
            second,
            DecisionOutcome::Applied {
                target_cell: CellId::from("B"),
                confidence: None,
                mode: EvaluationMode::Rule,
            }
        );
        assert_eq!(
            registry.get_tracker(&ue).unwrap().current_cell(),
            &CellId::from("B")
        );
    }

    #[tokio::test]
    async fn test_mode_switches_at_third_cell() {
        let registry = registry(&["A", "B"]);
        let ue = register_ue(&registry, 5);
        let classifier = ScriptedClassifier::new(&[("A", 0.01), ("B", 0.01), ("C", 0.98)]);
        let orchestrator = DecisionOrchestrator::new(
            registry.clone(),
            Some(classifier.clone()),
            HandoverConfig::default(),
        )
        .unwrap();

        let signals = [("A", -90.0), ("B", -95.0), ("C", -92.0)];
        for i in 0..3 {
            assert_eq!(orchestrator.current_mode(), EvaluationMode::Rule);
            let outcome = orchestrator
                .tick(&ue, &snapshot(1.0 + i as f64, &signals))
                .await
                .unwrap();
            assert!(!is_predictive_apply(&outcome));
        }
        assert_eq!(classifier.calls(), 0);

        registry.register_cell(Cell::new("C", 1200.0, 0.0, 500.0)).unwrap();
        assert_eq!(orchestrator.current_mode(), EvaluationMode::Predictive);

        let outcome = orchestrator.tick(&ue, &snapshot(5.0, &signals)).await.unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::Applied {
                target_cell: CellId::from("C"),
                confidence: Some(0.98),
                mode: EvaluationMode::Predictive,
            }
        );
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_falls_back_to_rule() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        let classifier = ScriptedClassifier::new(&[("A", 0.35), ("B", 0.40), ("C", 0.25)]);
        let orchestrator =
            DecisionOrchestrator::new(registry.clone(), Some(classifier), instant_rule()).unwrap();

        let signals = [("A", -100.0), ("B", -90.0), ("C", -105.0)];
        let outcome = orchestrator.tick(&ue, &snapshot(1.0, &signals)).await.unwrap();
        match &outcome {
            DecisionOutcome::FallenBack {
                reason: FallbackReason::InsufficientConfidence {
                    candidate,
                    confidence,
                    required,
                },
                mode,
                rule_result,
            } => {
                assert_eq!(candidate, &CellId::from("B"));
                assert!((confidence - 0.40).abs() < 1e-12);
                assert!(*required > 0.69);
                assert_eq!(*mode, EvaluationMode::Predictive);
                assert_eq!(
                    rule_result,
                    &Resolution::Applied {
                        target_cell: CellId::from("B"),
                        confidence: None
                    }
                );
            }
            other => panic!("expected fallback, got {:?}", other),
        }

        // Keep ticking; the predictor never wins at 0.40
        for i in 1..10 {
            let outcome = orchestrator
                .tick(&ue, &snapshot(1.0 + i as f64 * 3.0, &signals))
                .await
                .unwrap();
            assert!(!is_predictive_apply(&outcome));
            assert!(matches!(outcome, DecisionOutcome::FallenBack { .. }));
        }
    }

    #[tokio::test]
    async fn test_predictor_failure_degrades_health() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        let health = HealthRegistry::new();
        health.register_defaults().await;
        let orchestrator =
            DecisionOrchestrator::new(registry.clone(), Some(Arc::new(BrokenClassifier)), instant_rule())
                .unwrap()
                .with_health(health.clone());

        let signals = [("A", -90.0), ("B", -95.0), ("C", -99.0)];
        let outcome = orchestrator.tick(&ue, &snapshot(1.0, &signals)).await.unwrap();
        match outcome {
            DecisionOutcome::FallenBack {
                reason: FallbackReason::PredictorUnavailable { detail },
                rule_result,
                ..
            } => {
                assert!(detail.contains("offline"));
                assert_eq!(
                    rule_result,
                    Resolution::Skipped {
                        reason: SkipReason::NoChange
                    }
                );
            }
            other => panic!("expected unavailable fallback, got {:?}", other),
        }

        let predictor = health.component(components::PREDICTOR).await.unwrap();
        assert_eq!(predictor.status, ComponentStatus::Degraded);
        assert_eq!(predictor.consecutive_failures, 1);
        assert_eq!(orchestrator.predictor().unwrap().stats().unavailable, 1);
    }

    #[tokio::test]
    async fn test_under_confident_answer_restores_predictor_health() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        let health = HealthRegistry::new();
        health.register_defaults().await;
        health.report_predictor_failure("predictor timed out").await;
        let classifier = ScriptedClassifier::new(&[("A", 0.35), ("B", 0.40), ("C", 0.25)]);
        let orchestrator = DecisionOrchestrator::new(registry.clone(), Some(classifier), instant_rule())
            .unwrap()
            .with_health(health.clone());

        let outcome = orchestrator
            .tick(&ue, &snapshot(1.0, &[("A", -90.0), ("B", -95.0), ("C", -99.0)]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DecisionOutcome::FallenBack {
                reason: FallbackReason::InsufficientConfidence { .. },
                ..
            }
        ));

        let predictor = health.component(components::PREDICTOR).await.unwrap();
        assert_eq!(predictor.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_rule_timer_restarts_after_confident_predictions() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        let mut config = HandoverConfig::default();
        config.rule.time_to_trigger_s = 2.0;
        let unsure = [("A", 0.35), ("B", 0.40), ("C", 0.25)];
        let confident = [("A", 0.90), ("B", 0.05), ("C", 0.05)];
        let classifier = ScriptedClassifier::new(&unsure);
        let orchestrator =
            DecisionOrchestrator::new(registry.clone(), Some(classifier.clone()), config).unwrap();

        let b_strong = [("A", -100.0), ("B", -90.0), ("C", -110.0)];
        let b_weak = [("A", -100.0), ("B", -120.0), ("C", -110.0)];

        // Fallback starts the rule timer for B
        let outcome = orchestrator.tick(&ue, &snapshot(1.0, &b_strong)).await.unwrap();
        assert!(matches!(
            outcome,
            DecisionOutcome::FallenBack {
                rule_result: Resolution::Skipped {
                    reason: SkipReason::NoChange
                },
                ..
            }
        ));

        // Confident stays on A while B drops far below the margin
        classifier.set(&confident);
        for ts in [1.5, 2.0, 2.5] {
            let outcome = orchestrator.tick(&ue, &snapshot(ts, &b_weak)).await.unwrap();
            assert_eq!(
                outcome,
                DecisionOutcome::Skipped {
                    reason: SkipReason::NoChange
                }
            );
        }

        // B is back above the margin, but its run only starts now
        classifier.set(&unsure);
        let outcome = orchestrator.tick(&ue, &snapshot(3.0, &b_strong)).await.unwrap();
        match outcome {
            DecisionOutcome::FallenBack { rule_result, .. } => assert_eq!(
                rule_result,
                Resolution::Skipped {
                    reason: SkipReason::NoChange
                }
            ),
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(registry.get_tracker(&ue).unwrap().current_cell(), &CellId::from("A"));

        // Consecutive fallbacks keep accumulating
        let outcome = orchestrator.tick(&ue, &snapshot(5.0, &b_strong)).await.unwrap();
        assert_eq!(outcome.committed_cell(), Some(&CellId::from("B")));
    }

    #[tokio::test]
    async fn test_predictive_mode_without_classifier_falls_back() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        let orchestrator = DecisionOrchestrator::new(registry.clone(), None, instant_rule()).unwrap();

        let outcome = orchestrator
            .tick(&ue, &snapshot(1.0, &[("A", -100.0), ("C", -80.0)]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DecisionOutcome::FallenBack {
                reason: FallbackReason::PredictorUnavailable { .. },
                rule_result: Resolution::Applied { .. },
                ..
            }
        ));
        assert_eq!(outcome.committed_cell(), Some(&CellId::from("C")));
    }

    #[tokio::test]
    async fn test_suppression_sequence() {
        // Priority 1 needs 0.5, so 0.80 clears the confidence gate and reaches the suppressor
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 1);
        registry.commit_handover(&ue, CellId::from("B"), 5.0).unwrap();

        let classifier = ScriptedClassifier::new(&[("A", 0.80), ("B", 0.15), ("C", 0.05)]);
        let orchestrator = DecisionOrchestrator::new(
            registry.clone(),
            Some(classifier.clone()),
            HandoverConfig::default(),
        )
        .unwrap();
        let signals = [("A", -92.0), ("B", -90.0), ("C", -99.0)];

        let at_6 = orchestrator.tick(&ue, &snapshot(6.0, &signals)).await.unwrap();
        assert_eq!(
            at_6,
            DecisionOutcome::Skipped {
                reason: SkipReason::Suppressed(SuppressionReason::TooRecent)
            }
        );

        let at_8 = orchestrator.tick(&ue, &snapshot(8.0, &signals)).await.unwrap();
        assert_eq!(
            at_8,
            DecisionOutcome::Skipped {
                reason: SkipReason::Suppressed(SuppressionReason::ImmediateReturn)
            }
        );

        classifier.set(&[("A", 0.97), ("B", 0.02), ("C", 0.01)]);
        let confident = orchestrator.tick(&ue, &snapshot(8.0, &signals)).await.unwrap();
        assert_eq!(
            confident,
            DecisionOutcome::Applied {
                target_cell: CellId::from("A"),
                confidence: Some(0.97),
                mode: EvaluationMode::Predictive,
            }
        );
    }

    #[tokio::test]
    async fn test_high_priority_return_applied_with_high_confidence() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 10);
        registry.commit_handover(&ue, CellId::from("B"), 5.0).unwrap();

        let classifier = ScriptedClassifier::new(&[("A", 0.97), ("B", 0.02), ("C", 0.01)]);
        let orchestrator =
            DecisionOrchestrator::new(registry.clone(), Some(classifier), HandoverConfig::default())
                .unwrap();

        let outcome = orchestrator
            .tick(&ue, &snapshot(8.0, &[("A", -92.0), ("B", -90.0), ("C", -99.0)]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::Applied {
                target_cell: CellId::from("A"),
                confidence: Some(0.97),
                mode: EvaluationMode::Predictive,
            }
        );
        let tracker = registry.get_tracker(&ue).unwrap();
        assert_eq!(tracker.current_cell(), &CellId::from("A"));
        assert_eq!(tracker.last_handover_time(), Some(8.0));
    }

    #[tokio::test]
    async fn test_minimum_interval_between_applied() {
        let registry = registry(&["A", "B", "C", "D"]);
        let ue = register_ue(&registry, 5);
        let mut config = instant_rule();
        config.min_antennas_for_predictive = 10;
        let orchestrator = DecisionOrchestrator::new(registry.clone(), None, config).unwrap();

        let cells = ["A", "B", "C", "D"];
        let mut applied_at = Vec::new();
        for step in 0..120 {
            let now = step as f64 * 0.5;
            let strongest = cells[(step / 2) % cells.len()];
            let signals: Vec<(&str, f64)> = cells
                .iter()
                .map(|c| (*c, if *c == strongest { -70.0 } else { -100.0 }))
                .collect();
            let outcome = orchestrator.tick(&ue, &snapshot(now, &signals)).await.unwrap();
            if outcome.committed_cell().is_some() {
                applied_at.push(now);
            }
        }

        assert!(applied_at.len() >= 2, "only {} handovers", applied_at.len());
        for pair in applied_at.windows(2) {
            assert!(pair[1] - pair[0] >= 2.0, "handovers at {:?}", pair);
        }
    }

    #[tokio::test]
    async fn test_no_op_ticks_leave_tracker_untouched() {
        let registry = registry(&["A", "B", "C"]);
        let ue = register_ue(&registry, 5);
        registry.commit_handover(&ue, CellId::from("B"), 5.0).unwrap();
        let before = registry.get_tracker(&ue).unwrap();

        // Prediction equals the serving cell
        let classifier = ScriptedClassifier::new(&[("A", 0.05), ("B", 0.9), ("C", 0.05)]);
        let orchestrator = DecisionOrchestrator::new(
            registry.clone(),
            Some(classifier.clone()),
            HandoverConfig::default(),
        )
        .unwrap();
        let signals = [("A", -95.0), ("B", -90.0), ("C", -99.0)];
        let outcome = orchestrator.tick(&ue, &snapshot(50.0, &signals)).await.unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::Skipped {
                reason: SkipReason::NoChange
            }
        );
        assert_eq!(registry.get_tracker(&ue).unwrap(), before);

        // Suppressed ticks leave it alone too, including the expired t=5 window entry
        for (cell, ts) in [("A", 92.0), ("B", 94.0), ("A", 98.0)] {
            registry.commit_handover(&ue, CellId::from(cell), ts).unwrap();
        }
        classifier.set(&[("A", 0.1), ("B", 0.8), ("C", 0.1)]);
        let before = registry.get_tracker(&ue).unwrap();
        let outcome = orchestrator.tick(&ue, &snapshot(101.5, &signals)).await.unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::Skipped {
                reason: SkipReason::Suppressed(SuppressionReason::TooMany)
            }
        );
        assert_eq!(registry.get_tracker(&ue).unwrap(), before);
        assert_eq!(before.recent_handover_timestamps().count(), 4);
    }

    #[tokio::test]
    async fn test_unregistered_cells_are_ignored() {
        let registry = registry(&["A", "B"]);
        let ue = register_ue(&registry, 5);
        let orchestrator = DecisionOrchestrator::new(registry.clone(), None, instant_rule()).unwrap();

        let outcome = orchestrator
            .tick(&ue, &snapshot(1.0, &[("A", -100.0), ("B", -99.0), ("Z", -50.0)]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::Skipped {
                reason: SkipReason::NoChange
            }
        );
    }

    #[tokio::test]
    async fn test_mixed_rule_requires_both_conditions() {
        let registry = registry(&["A", "B"]);
        let ue = register_ue(&registry, 5);
        let mut config = instant_rule();
        config.rule.quality_threshold_db = Some(5.0);
        let orchestrator = DecisionOrchestrator::new(registry.clone(), None, config).unwrap();

        // Margin holds, quality does not
        let poor_quality = MeasurementSnapshot::new(
            1.0,
            vec![
                CellMeasurement::new("A", -100.0, 10.0),
                CellMeasurement::new("B", -90.0, 2.0),
            ],
        );
        assert_eq!(
            orchestrator.tick(&ue, &poor_quality).await.unwrap(),
            DecisionOutcome::Skipped {
                reason: SkipReason::NoChange
            }
        );

        let both = MeasurementSnapshot::new(
            2.0,
            vec![
                CellMeasurement::new("A", -100.0, 10.0),
                CellMeasurement::new("B", -90.0, 8.0),
            ],
        );
        assert_eq!(
            orchestrator.tick(&ue, &both).await.unwrap().committed_cell(),
            Some(&CellId::from("B"))
        );
    }

    #[test]
    fn test_unknown_ue() {
        let registry = registry(&["A"]);
        let orchestrator =
            DecisionOrchestrator::new(registry, None, HandoverConfig::default()).unwrap();
        let result = tokio_test::block_on(
            orchestrator.tick(&UeId::from("ghost"), &snapshot(1.0, &[("A", -90.0)])),
        );
        assert!(matches!(result, Err(HandoverError::UnknownUe(_))));
    }

    #[test]
    fn test_invalid_configuration_rejected_at_construction() {
        let mut config = HandoverConfig::default();
        config.rule.hysteresis_db = -1.0;
        let result = DecisionOrchestrator::new(registry(&["A"]), None, config);
        assert!(matches!(result, Err(HandoverError::InvalidParameter(_))));

        let mut config = HandoverConfig::default();
        config.pingpong.immediate_threshold = 2.0;
        assert!(DecisionOrchestrator::new(registry(&["A"]), None, config).is_err());
    }
}
