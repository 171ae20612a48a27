//! Drives a scenario through the per-UE tick dispatcher
//!
//! Ticks for different UEs run concurrently. Topology events wait for every
//! outstanding tick to finish first, so each tick sees the topology that was
//! in place when it was submitted.

use anyhow::{Context, Result};
use handover_lib::{
    scenario::{Scenario, ScenarioEvent},
    DecisionOrchestrator, MeasurementSnapshot, TickDispatcher, TickResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Per-label outcome counts of a driven scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveReport {
    pub ticks: usize,
    pub errors: usize,
    pub outcomes: BTreeMap<&'static str, usize>,
}

/// Run every event of `scenario`; the topology must already be applied
pub async fn drive(
    orchestrator: Arc<DecisionOrchestrator>,
    scenario: &Scenario,
    queue_depth: usize,
) -> Result<DriveReport> {
    let registry = orchestrator.registry().clone();
    let (dispatcher, results) = TickDispatcher::with_queue_depth(orchestrator, queue_depth);
    let (done_tx, mut done_rx) = watch::channel(0usize);
    let collector = tokio::spawn(collect(results, done_tx));

    let mut submitted = 0usize;
    for event in &scenario.events {
        match event {
            ScenarioEvent::Tick {
                ue_id,
                timestamp,
                measurements,
            } => {
                let snapshot = MeasurementSnapshot::new(*timestamp, measurements.clone());
                dispatcher.submit(ue_id, snapshot).await?;
                submitted += 1;
            }
            ScenarioEvent::RegisterCell { cell } => {
                done_rx
                    .wait_for(|done| *done >= submitted)
                    .await
                    .context("Result collector stopped")?;
                registry.register_cell(cell.clone())?;
                info!(cell_id = %cell.id, cells = registry.cell_count(), "Cell registered");
            }
            ScenarioEvent::DeregisterUe { ue_id } => {
                dispatcher.remove_ue(ue_id).await;
                done_rx
                    .wait_for(|done| *done >= submitted)
                    .await
                    .context("Result collector stopped")?;
                if registry.deregister_ue(ue_id).is_none() {
                    warn!(ue_id = %ue_id, "Deregistering unknown UE");
                }
            }
        }
    }

    dispatcher.shutdown().await;
    collector.await.context("Result collector panicked")
}

async fn collect(mut results: mpsc::Receiver<TickResult>, done: watch::Sender<usize>) -> DriveReport {
    let mut report = DriveReport::default();
    while let Some(result) = results.recv().await {
        report.ticks += 1;
        match (&result.outcome, &result.error) {
            (Some(outcome), _) => {
                debug!(
                    ue_id = %result.ue_id,
                    timestamp = result.timestamp,
                    outcome = %outcome,
                    duration_us = result.duration_us,
                    "Tick evaluated"
                );
                *report.outcomes.entry(outcome.label()).or_default() += 1;
            }
            (None, error) => {
                warn!(
                    ue_id = %result.ue_id,
                    timestamp = result.timestamp,
                    error = ?error,
                    "Tick rejected"
                );
                report.errors += 1;
            }
        }
        let _ = done.send(report.ticks);
    }
    report
}
