//! Registry persistence
//!
//! Serializes the cell set plus per-UE tracker state so the ping-pong gates
//! behave identically after a restart. Rule trigger timers are not persisted;
//! they restart from zero.

use super::{StateRegistry, TrackerSnapshot, UeEntry, UeTrackerState};
use crate::error::HandoverError;
use crate::models::{Cell, ServiceProfile};
use crate::rule::TriggerTimer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Persisted form of a UE entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeSnapshot {
    pub tracker: TrackerSnapshot,
    pub profile: ServiceProfile,
}

/// Persisted form of the whole registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub cells: Vec<Cell>,
    pub ues: Vec<UeSnapshot>,
}

impl StateRegistry {
    /// Capture cells and UE trackers
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut ues: Vec<UeSnapshot> = self
            .ues
            .iter()
            .map(|r| UeSnapshot {
                tracker: r.tracker.to_snapshot(),
                profile: r.profile.clone(),
            })
            .collect();
        ues.sort_by(|a, b| a.tracker.ue_id.cmp(&b.tracker.ue_id));

        RegistrySnapshot {
            cells: self.cells(),
            ues,
        }
    }

    /// Replace the registry contents with `snapshot`
    ///
    /// Validates everything before mutating; on error the registry is left
    /// untouched.
    pub fn restore(&self, snapshot: RegistrySnapshot) -> Result<(), HandoverError> {
        let mut entries = Vec::with_capacity(snapshot.ues.len());
        for ue in snapshot.ues {
            ue.profile.validate()?;
            for record in &ue.tracker.cell_history {
                if !snapshot.cells.iter().any(|c| c.id == record.cell_id) {
                    return Err(HandoverError::UnknownCell(record.cell_id.clone()));
                }
            }
            let tracker = UeTrackerState::from_snapshot(ue.tracker, self.history_capacity)
                .map_err(HandoverError::Snapshot)?;
            entries.push(UeEntry {
                tracker,
                profile: ue.profile,
                rule_timer: TriggerTimer::new(),
            });
        }

        self.ues.clear();
        self.cells.clear();
        for cell in snapshot.cells {
            self.cells.insert(cell.id.clone(), cell);
        }
        for entry in entries {
            self.ues.insert(entry.tracker.ue_id().clone(), entry);
        }
        Ok(())
    }

    /// Write the registry snapshot to `path` as JSON
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let json =
            serde_json::to_vec_pretty(&self.snapshot()).context("Failed to serialize registry")?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
        file.write_all(&json).context("Failed to write registry snapshot")?;
        file.sync_all().context("Failed to sync registry snapshot")?;

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        info!(path = %path.display(), ues = self.ue_count(), "Registry snapshot saved");
        Ok(())
    }

    /// Load a snapshot from `path` and restore it
    pub fn restore_snapshot(&self, path: &Path) -> Result<()> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open snapshot {:?}", path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .context("Failed to read snapshot file")?;

        let snapshot: RegistrySnapshot =
            serde_json::from_slice(&data).context("Failed to deserialize snapshot")?;
        self.restore(snapshot)?;

        info!(
            path = %path.display(),
            cells = self.cell_count(),
            ues = self.ue_count(),
            "Registry restored from snapshot"
        );
        Ok(())
    }
}
