//! Per-UE tick dispatch
//!
//! Each UE gets its own task fed by an ordered queue, so ticks for one UE
//! are evaluated strictly in arrival order while different UEs proceed
//! concurrently. Outcomes are reported on a shared channel.

use crate::models::{MeasurementSnapshot, UeId};
use crate::orchestrator::{DecisionOrchestrator, DecisionOutcome};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default depth of each UE's tick queue
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Capacity of the shared results channel
const RESULTS_CAPACITY: usize = 1024;

/// Outcome of one dispatched tick
#[derive(Debug, Clone)]
pub struct TickResult {
    pub ue_id: UeId,
    pub timestamp: f64,
    pub outcome: Option<DecisionOutcome>,
    /// Set when the tick failed, e.g. the UE was deregistered mid-queue
    pub error: Option<String>,
    pub duration_us: u64,
}

struct Worker {
    queue: mpsc::Sender<MeasurementSnapshot>,
    handle: JoinHandle<()>,
}

/// Routes snapshots to per-UE worker tasks
pub struct TickDispatcher {
    orchestrator: Arc<DecisionOrchestrator>,
    workers: DashMap<UeId, Worker>,
    results_tx: mpsc::Sender<TickResult>,
    queue_depth: usize,
}

impl TickDispatcher {
    pub fn new(orchestrator: Arc<DecisionOrchestrator>) -> (Self, mpsc::Receiver<TickResult>) {
        Self::with_queue_depth(orchestrator, DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_queue_depth(
        orchestrator: Arc<DecisionOrchestrator>,
        queue_depth: usize,
    ) -> (Self, mpsc::Receiver<TickResult>) {
        let (tx, rx) = mpsc::channel(RESULTS_CAPACITY);
        let dispatcher = Self {
            orchestrator,
            workers: DashMap::new(),
            results_tx: tx,
            queue_depth: queue_depth.max(1),
        };
        (dispatcher, rx)
    }

    /// Queue a snapshot for `ue_id`, starting its worker on first use
    ///
    /// Waits if the UE's queue is full.
    pub async fn submit(&self, ue_id: &UeId, snapshot: MeasurementSnapshot) -> Result<()> {
        let queue = self
            .workers
            .entry(ue_id.clone())
            .or_insert_with(|| self.spawn_worker(ue_id.clone()))
            .queue
            .clone();

        queue
            .send(snapshot)
            .await
            .with_context(|| format!("Worker for UE {} has stopped", ue_id))
    }

    /// Stop a UE's worker after it drains its queue
    pub async fn remove_ue(&self, ue_id: &UeId) {
        if let Some((_, worker)) = self.workers.remove(ue_id) {
            drop(worker.queue);
            if let Err(e) = worker.handle.await {
                warn!(ue_id = %ue_id, error = %e, "Worker task failed");
            }
        }
    }

    /// UEs with a running worker, ordered
    pub fn active_ues(&self) -> Vec<UeId> {
        let mut ids: Vec<UeId> = self.workers.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Close every queue and wait for the workers to drain
    pub async fn shutdown(self) {
        let ue_ids: Vec<UeId> = self.workers.iter().map(|r| r.key().clone()).collect();
        info!(workers = ue_ids.len(), "Shutting down tick dispatcher");
        for ue_id in ue_ids {
            self.remove_ue(&ue_id).await;
        }
    }

    fn spawn_worker(&self, ue_id: UeId) -> Worker {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        debug!(ue_id = %ue_id, "Starting UE worker");
        let handle = tokio::spawn(run_worker(
            ue_id,
            self.orchestrator.clone(),
            rx,
            self.results_tx.clone(),
        ));
        Worker { queue: tx, handle }
    }
}

async fn run_worker(
    ue_id: UeId,
    orchestrator: Arc<DecisionOrchestrator>,
    mut queue: mpsc::Receiver<MeasurementSnapshot>,
    results: mpsc::Sender<TickResult>,
) {
    while let Some(snapshot) = queue.recv().await {
        let start = Instant::now();
        let (outcome, error) = match orchestrator.tick(&ue_id, &snapshot).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                warn!(ue_id = %ue_id, error = %e, "Tick failed");
                (None, Some(e.to_string()))
            }
        };

        let result = TickResult {
            ue_id: ue_id.clone(),
            timestamp: snapshot.timestamp,
            outcome,
            error,
            duration_us: start.elapsed().as_micros() as u64,
        };
        if results.send(result).await.is_err() {
            debug!(ue_id = %ue_id, "Results channel closed, stopping worker");
            break;
        }
    }
    debug!(ue_id = %ue_id, "UE worker stopped");
}
