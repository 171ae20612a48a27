//! Scenario files for offline replay
//!
//! A scenario is a JSON document describing an initial topology, the UEs
//! attached to it and an ordered list of events. Replaying it drives the
//! orchestrator exactly as a simulation driver would.

use crate::error::{HandoverError, Result as CoreResult};
use crate::models::{Cell, CellId, CellMeasurement, MeasurementSnapshot, ServiceProfile, UeId};
use crate::orchestrator::{DecisionOrchestrator, DecisionOutcome, HandoverConfig, SkipReason};
use crate::registry::StateRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// UE attached at scenario start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioUe {
    pub ue_id: UeId,
    pub initial_cell: CellId,
    #[serde(default)]
    pub profile: ServiceProfile,
    #[serde(default)]
    pub registered_at: f64,
}

/// One step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    RegisterCell {
        cell: Cell,
    },
    Tick {
        ue_id: UeId,
        timestamp: f64,
        measurements: Vec<CellMeasurement>,
    },
    DeregisterUe {
        ue_id: UeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Overrides for the core configuration; absent fields take defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HandoverConfig>,
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub ues: Vec<ScenarioUe>,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("Invalid scenario {:?}", path))
    }

    /// Configuration to run this scenario with
    pub fn handover_config(&self) -> HandoverConfig {
        self.config.clone().unwrap_or_default()
    }

    pub fn tick_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScenarioEvent::Tick { .. }))
            .count()
    }

    /// Static consistency checks; an empty list means the scenario is replayable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(config) = &self.config {
            if let Err(e) = config.validate() {
                problems.push(format!("config: {}", e));
            }
        }

        let mut cells: HashSet<&CellId> = HashSet::new();
        for cell in &self.cells {
            if !cells.insert(&cell.id) {
                problems.push(format!("duplicate cell {}", cell.id));
            }
        }

        let mut ues: HashSet<&UeId> = HashSet::new();
        for ue in &self.ues {
            if !ues.insert(&ue.ue_id) {
                problems.push(format!("duplicate UE {}", ue.ue_id));
            }
            if !cells.contains(&ue.initial_cell) {
                problems.push(format!(
                    "UE {} starts on unknown cell {}",
                    ue.ue_id, ue.initial_cell
                ));
            }
            if let Err(e) = ue.profile.validate() {
                problems.push(format!("UE {}: {}", ue.ue_id, e));
            }
        }

        let mut last_tick: HashMap<&UeId, f64> = HashMap::new();
        for (i, event) in self.events.iter().enumerate() {
            match event {
                ScenarioEvent::RegisterCell { cell } => {
                    if !cells.insert(&cell.id) {
                        problems.push(format!("event {}: duplicate cell {}", i, cell.id));
                    }
                }
                ScenarioEvent::Tick { ue_id, timestamp, .. } => {
                    if !ues.contains(ue_id) {
                        problems.push(format!("event {}: tick for unknown UE {}", i, ue_id));
                    }
                    if !timestamp.is_finite() {
                        problems.push(format!("event {}: non-finite timestamp", i));
                    }
                    if let Some(prev) = last_tick.insert(ue_id, *timestamp) {
                        if *timestamp < prev {
                            problems.push(format!(
                                "event {}: timestamp {} for UE {} goes backwards from {}",
                                i, timestamp, ue_id, prev
                            ));
                        }
                    }
                }
                ScenarioEvent::DeregisterUe { ue_id } => {
                    if !ues.remove(ue_id) {
                        problems.push(format!("event {}: deregistering unknown UE {}", i, ue_id));
                    }
                }
            }
        }

        problems
    }

    /// Register the initial cells and UEs
    pub fn apply_topology(&self, registry: &StateRegistry) -> CoreResult<()> {
        for cell in &self.cells {
            registry.register_cell(cell.clone())?;
        }
        for ue in &self.ues {
            registry.register_ue(
                ue.ue_id.clone(),
                ue.initial_cell.clone(),
                ue.profile.clone(),
                ue.registered_at,
            )?;
        }
        info!(
            scenario = %self.name,
            cells = registry.cell_count(),
            ues = registry.ue_count(),
            "Scenario topology applied"
        );
        Ok(())
    }
}

/// Outcome of one replayed tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub ue_id: UeId,
    pub timestamp: f64,
    pub serving_before: CellId,
    pub outcome: DecisionOutcome,
}

/// Replay `scenario` against `orchestrator`
///
/// The topology is applied to the orchestrator's registry first. Events run
/// sequentially; the first surfaced error aborts the replay.
pub async fn replay(
    orchestrator: &DecisionOrchestrator,
    scenario: &Scenario,
) -> CoreResult<Vec<ReplayRecord>> {
    let registry = orchestrator.registry();
    scenario.apply_topology(registry)?;

    let mut records = Vec::with_capacity(scenario.tick_count());
    for event in &scenario.events {
        match event {
            ScenarioEvent::RegisterCell { cell } => {
                registry.register_cell(cell.clone())?;
            }
            ScenarioEvent::DeregisterUe { ue_id } => {
                if registry.deregister_ue(ue_id).is_none() {
                    return Err(HandoverError::UnknownUe(ue_id.clone()));
                }
            }
            ScenarioEvent::Tick {
                ue_id,
                timestamp,
                measurements,
            } => {
                let serving_before = registry.get_tracker(ue_id)?.current_cell().clone();
                let snapshot = MeasurementSnapshot::new(*timestamp, measurements.clone());
                let outcome = orchestrator.tick(ue_id, &snapshot).await?;
                debug!(ue_id = %ue_id, timestamp, outcome = %outcome, "Replayed tick");
                records.push(ReplayRecord {
                    ue_id: ue_id.clone(),
                    timestamp: *timestamp,
                    serving_before,
                    outcome,
                });
            }
        }
    }
    Ok(records)
}

/// Aggregate counts over a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub applied: usize,
    pub skipped: usize,
    pub fallen_back: usize,
    /// Committed handovers, including rule handovers after a fallback
    pub handovers: usize,
    pub suppressed: BTreeMap<String, usize>,
    pub fallbacks: BTreeMap<String, usize>,
}

impl ReplaySummary {
    pub fn from_records(records: &[ReplayRecord]) -> Self {
        let mut summary = Self {
            ticks: records.len(),
            ..Self::default()
        };
        for record in records {
            if record.outcome.committed_cell().is_some() {
                summary.handovers += 1;
            }
            match &record.outcome {
                DecisionOutcome::Applied { .. } => summary.applied += 1,
                DecisionOutcome::Skipped { reason } => {
                    summary.skipped += 1;
                    if let SkipReason::Suppressed(r) = reason {
                        *summary.suppressed.entry(r.to_string()).or_default() += 1;
                    }
                }
                DecisionOutcome::FallenBack { reason, .. } => {
                    summary.fallen_back += 1;
                    *summary
                        .fallbacks
                        .entry(reason.label().to_string())
                        .or_default() += 1;
                }
            }
        }
        summary
    }
}
