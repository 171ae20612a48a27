//! Per-UE handover tracking
//!
//! Keeps the bounded cell history and the sliding window of recent handover
//! timestamps that the ping-pong gates read.

use crate::models::{CellId, HandoverRecord, UeId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of history records kept per UE
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Handover tracking state for a single UE
#[derive(Debug, Clone, PartialEq)]
pub struct UeTrackerState {
    ue_id: UeId,
    current_cell: CellId,
    /// Oldest first; the initial attachment is seeded as the first record
    cell_history: VecDeque<HandoverRecord>,
    /// Timestamps of committed handovers, oldest first
    recent_handover_timestamps: VecDeque<f64>,
    last_handover_time: Option<f64>,
    /// Handovers committed since registration
    handover_count: u64,
    history_capacity: usize,
}

impl UeTrackerState {
    /// Create tracking state for a UE attached to `initial_cell`
    pub fn new(ue_id: UeId, initial_cell: CellId, registered_at: f64, history_capacity: usize) -> Self {
        let history_capacity = history_capacity.max(1);
        let mut cell_history = VecDeque::with_capacity(history_capacity);
        cell_history.push_back(HandoverRecord {
            cell_id: initial_cell.clone(),
            timestamp: registered_at,
        });
        Self {
            ue_id,
            current_cell: initial_cell,
            cell_history,
            recent_handover_timestamps: VecDeque::new(),
            last_handover_time: None,
            handover_count: 0,
            history_capacity,
        }
    }

    pub fn ue_id(&self) -> &UeId {
        &self.ue_id
    }

    pub fn current_cell(&self) -> &CellId {
        &self.current_cell
    }

    pub fn last_handover_time(&self) -> Option<f64> {
        self.last_handover_time
    }

    pub fn handover_count(&self) -> u64 {
        self.handover_count
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// History records, oldest first
    pub fn cell_history(&self) -> impl Iterator<Item = &HandoverRecord> {
        self.cell_history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.cell_history.len()
    }

    /// Raw recent-handover timestamps, including any not yet pruned
    pub fn recent_handover_timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.recent_handover_timestamps.iter().copied()
    }

    /// Record a serving-cell change
    pub fn record_handover(&mut self, cell_id: CellId, timestamp: f64) {
        self.cell_history.push_back(HandoverRecord {
            cell_id: cell_id.clone(),
            timestamp,
        });
        self.recent_handover_timestamps.push_back(timestamp);

        // FIFO eviction; a timestamp leaves the rate window together with its record
        while self.cell_history.len() > self.history_capacity {
            if let Some(evicted) = self.cell_history.pop_front() {
                if self.recent_handover_timestamps.front() == Some(&evicted.timestamp) {
                    self.recent_handover_timestamps.pop_front();
                }
            }
        }

        self.current_cell = cell_id;
        self.last_handover_time = Some(timestamp);
        self.handover_count += 1;
    }

    /// Count handovers within the trailing `window_s`, dropping older entries
    pub fn handovers_within(&mut self, now: f64, window_s: f64) -> usize {
        let cutoff = now - window_s;
        while let Some(ts) = self.recent_handover_timestamps.front() {
            if *ts < cutoff {
                self.recent_handover_timestamps.pop_front();
            } else {
                break;
            }
        }
        self.recent_handover_timestamps.len()
    }

    /// Whether `cell_id` has a history record within the trailing `window_s`
    pub fn visited_within(&self, cell_id: &CellId, now: f64, window_s: f64) -> bool {
        let cutoff = now - window_s;
        self.cell_history
            .iter()
            .rev()
            .take_while(|r| r.timestamp >= cutoff)
            .any(|r| &r.cell_id == cell_id)
    }

    pub fn to_snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            ue_id: self.ue_id.clone(),
            current_cell: self.current_cell.clone(),
            cell_history: self.cell_history.iter().cloned().collect(),
            last_handover_time: self.last_handover_time,
            recent_handover_timestamps: self.recent_handover_timestamps.iter().copied().collect(),
            handover_count: self.handover_count,
        }
    }

    /// Rebuild tracking state from a persisted snapshot
    pub fn from_snapshot(snapshot: TrackerSnapshot, history_capacity: usize) -> Result<Self, String> {
        let history_capacity = history_capacity.max(1);
        let mut cell_history: VecDeque<HandoverRecord> = snapshot.cell_history.into();
        // The registration record survives only while history outnumbers handovers
        let mut seeded = match snapshot.last_handover_time {
            None => true,
            Some(_) if snapshot.handover_count == 0 => true,
            Some(_) => cell_history.len() as u64 > snapshot.handover_count,
        };
        while cell_history.len() > history_capacity {
            cell_history.pop_front();
            seeded = false;
        }

        match cell_history.back() {
            Some(last) if last.cell_id == snapshot.current_cell => {}
            Some(last) => {
                return Err(format!(
                    "UE {}: current cell {} does not match newest history record {}",
                    snapshot.ue_id, snapshot.current_cell, last.cell_id
                ))
            }
            None => {
                return Err(format!("UE {}: empty cell history", snapshot.ue_id));
            }
        }

        // Older snapshots may omit the window; rebuild it from the history
        let recent_handover_timestamps: VecDeque<f64> =
            if snapshot.recent_handover_timestamps.is_empty() {
                let skip = usize::from(seeded);
                cell_history.iter().skip(skip).map(|r| r.timestamp).collect()
            } else {
                snapshot.recent_handover_timestamps.into()
            };

        Ok(Self {
            ue_id: snapshot.ue_id,
            current_cell: snapshot.current_cell,
            cell_history,
            recent_handover_timestamps,
            last_handover_time: snapshot.last_handover_time,
            handover_count: snapshot.handover_count,
            history_capacity,
        })
    }
}

/// Serialized form of [`UeTrackerState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub ue_id: UeId,
    pub current_cell: CellId,
    pub cell_history: Vec<HandoverRecord>,
    pub last_handover_time: Option<f64>,
    #[serde(default)]
    pub recent_handover_timestamps: Vec<f64>,
    /// Zero in snapshots written before the count was kept
    #[serde(default)]
    pub handover_count: u64,
}
