//! State registry for cells and UE tracking
//!
//! Holds the set of known cells and, per UE, its tracker, service profile
//! and rule trigger timer. Cells are read-mostly; UE entries are keyed by
//! UE id and mutated only by the task that owns that UE.

mod snapshot;
mod tracker;

pub use snapshot::{RegistrySnapshot, UeSnapshot};
pub use tracker::{TrackerSnapshot, UeTrackerState, DEFAULT_HISTORY_CAPACITY};

use crate::error::{HandoverError, Result};
use crate::models::{Cell, CellId, ServiceProfile, UeId};
use crate::rule::TriggerTimer;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Everything the registry owns for one UE
#[derive(Debug, Clone)]
pub struct UeEntry {
    pub tracker: UeTrackerState,
    pub profile: ServiceProfile,
    pub rule_timer: TriggerTimer,
}

/// Registry of cells and UE tracker state
pub struct StateRegistry {
    cells: DashMap<CellId, Cell>,
    ues: DashMap<UeId, UeEntry>,
    history_capacity: usize,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
            ues: DashMap::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with a custom per-UE history capacity
    pub fn with_history_capacity(history_capacity: usize) -> Result<Self> {
        if history_capacity == 0 {
            return Err(HandoverError::InvalidParameter(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            history_capacity,
            ..Self::default()
        })
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Register a new cell
    pub fn register_cell(&self, cell: Cell) -> Result<()> {
        if !cell.coverage_radius_m.is_finite() || cell.coverage_radius_m < 0.0 {
            return Err(HandoverError::InvalidParameter(format!(
                "cell {} has invalid coverage radius {}",
                cell.id, cell.coverage_radius_m
            )));
        }
        match self.cells.entry(cell.id.clone()) {
            Entry::Occupied(_) => Err(HandoverError::AlreadyRegistered(format!("cell {}", cell.id))),
            Entry::Vacant(slot) => {
                debug!(cell_id = %cell.id, "Registering cell");
                slot.insert(cell);
                Ok(())
            }
        }
    }

    /// Remove a cell from the topology
    pub fn deregister_cell(&self, cell_id: &CellId) -> Option<Cell> {
        debug!(cell_id = %cell_id, "Deregistering cell");
        self.cells.remove(cell_id).map(|(_, v)| v)
    }

    pub fn cell(&self, cell_id: &CellId) -> Option<Cell> {
        self.cells.get(cell_id).map(|r| r.clone())
    }

    pub fn has_cell(&self, cell_id: &CellId) -> bool {
        self.cells.contains_key(cell_id)
    }

    /// All registered cells, ordered by id
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.cells.iter().map(|r| r.value().clone()).collect();
        cells.sort_by(|a, b| a.id.cmp(&b.id));
        cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Register a UE attached to `initial_cell` at `registered_at`
    pub fn register_ue(
        &self,
        ue_id: UeId,
        initial_cell: CellId,
        profile: ServiceProfile,
        registered_at: f64,
    ) -> Result<()> {
        profile.validate()?;
        if !self.has_cell(&initial_cell) {
            return Err(HandoverError::UnknownCell(initial_cell));
        }
        match self.ues.entry(ue_id.clone()) {
            Entry::Occupied(_) => Err(HandoverError::AlreadyRegistered(format!("UE {}", ue_id))),
            Entry::Vacant(slot) => {
                debug!(ue_id = %ue_id, cell_id = %initial_cell, "Registering UE");
                slot.insert(UeEntry {
                    tracker: UeTrackerState::new(
                        ue_id,
                        initial_cell,
                        registered_at,
                        self.history_capacity,
                    ),
                    profile,
                    rule_timer: TriggerTimer::new(),
                });
                Ok(())
            }
        }
    }

    /// Drop a UE and its tracking state
    pub fn deregister_ue(&self, ue_id: &UeId) -> Option<UeTrackerState> {
        debug!(ue_id = %ue_id, "Deregistering UE");
        self.ues.remove(ue_id).map(|(_, entry)| entry.tracker)
    }

    pub fn has_ue(&self, ue_id: &UeId) -> bool {
        self.ues.contains_key(ue_id)
    }

    pub fn ue_count(&self) -> usize {
        self.ues.len()
    }

    /// Registered UE ids, ordered
    pub fn ue_ids(&self) -> Vec<UeId> {
        let mut ids: Vec<UeId> = self.ues.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Copy of a UE's tracker state
    pub fn get_tracker(&self, ue_id: &UeId) -> Result<UeTrackerState> {
        self.ues
            .get(ue_id)
            .map(|e| e.tracker.clone())
            .ok_or_else(|| HandoverError::UnknownUe(ue_id.clone()))
    }

    pub fn service_profile(&self, ue_id: &UeId) -> Result<ServiceProfile> {
        self.ues
            .get(ue_id)
            .map(|e| e.profile.clone())
            .ok_or_else(|| HandoverError::UnknownUe(ue_id.clone()))
    }

    /// Replace a UE's service profile wholesale
    pub fn set_service_profile(&self, ue_id: &UeId, profile: ServiceProfile) -> Result<()> {
        profile.validate()?;
        let mut entry = self
            .ues
            .get_mut(ue_id)
            .ok_or_else(|| HandoverError::UnknownUe(ue_id.clone()))?;
        entry.profile = profile;
        Ok(())
    }

    /// Record that `ue_id` now camps on `new_cell`
    pub fn commit_handover(&self, ue_id: &UeId, new_cell: CellId, timestamp: f64) -> Result<()> {
        if !self.has_cell(&new_cell) {
            return Err(HandoverError::UnknownCell(new_cell));
        }
        let mut entry = self
            .ues
            .get_mut(ue_id)
            .ok_or_else(|| HandoverError::UnknownUe(ue_id.clone()))?;
        debug!(
            ue_id = %ue_id,
            from = %entry.tracker.current_cell(),
            to = %new_cell,
            timestamp,
            "Committing handover"
        );
        entry.tracker.record_handover(new_cell, timestamp);
        entry.rule_timer.reset();
        Ok(())
    }

    /// Run `f` with exclusive access to a UE's entry
    pub(crate) fn with_entry_mut<R>(
        &self,
        ue_id: &UeId,
        f: impl FnOnce(&mut UeEntry) -> R,
    ) -> Result<R> {
        let mut entry = self
            .ues
            .get_mut(ue_id)
            .ok_or_else(|| HandoverError::UnknownUe(ue_id.clone()))?;
        Ok(f(entry.value_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceType;

    fn registry_with_cells(ids: &[&str]) -> StateRegistry {
        let registry = StateRegistry::new();
        for (i, id) in ids.iter().enumerate() {
            registry
                .register_cell(Cell::new(*id, i as f64 * 500.0, 0.0, 400.0))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_register_cells() {
        let registry = registry_with_cells(&["A", "B"]);
        assert_eq!(registry.cell_count(), 2);
        assert!(matches!(
            registry.register_cell(Cell::new("A", 0.0, 0.0, 100.0)),
            Err(HandoverError::AlreadyRegistered(_))
        ));
        assert!(registry
            .register_cell(Cell::new("C", 0.0, 0.0, -1.0))
            .is_err());
    }

    #[test]
    fn test_register_ue_requires_known_cell() {
        let registry = registry_with_cells(&["A"]);
        let result = registry.register_ue(
            UeId::from("ue-1"),
            CellId::from("Z"),
            ServiceProfile::default(),
            0.0,
        );
        assert!(matches!(result, Err(HandoverError::UnknownCell(_))));
    }

    #[test]
    fn test_duplicate_ue_rejected() {
        let registry = registry_with_cells(&["A"]);
        let ue = UeId::from("ue-1");
        registry
            .register_ue(ue.clone(), CellId::from("A"), ServiceProfile::default(), 0.0)
            .unwrap();
        assert!(matches!(
            registry.register_ue(ue, CellId::from("A"), ServiceProfile::default(), 0.0),
            Err(HandoverError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_commit_unknown_ue() {
        let registry = registry_with_cells(&["A", "B"]);
        let result = registry.commit_handover(&UeId::from("ghost"), CellId::from("B"), 1.0);
        assert!(matches!(result, Err(HandoverError::UnknownUe(_))));
        assert!(matches!(
            registry.get_tracker(&UeId::from("ghost")),
            Err(HandoverError::UnknownUe(_))
        ));
    }

    #[test]
    fn test_commit_updates_tracker() {
        let registry = registry_with_cells(&["A", "B"]);
        let ue = UeId::from("ue-1");
        registry
            .register_ue(ue.clone(), CellId::from("A"), ServiceProfile::default(), 0.0)
            .unwrap();
        registry.commit_handover(&ue, CellId::from("B"), 5.0).unwrap();

        let tracker = registry.get_tracker(&ue).unwrap();
        assert_eq!(tracker.current_cell(), &CellId::from("B"));
        assert_eq!(tracker.last_handover_time(), Some(5.0));
        assert_eq!(tracker.history_len(), 2);
    }

    #[test]
    fn test_history_capacity_enforced() {
        let registry = StateRegistry::with_history_capacity(4).unwrap();
        registry.register_cell(Cell::new("A", 0.0, 0.0, 100.0)).unwrap();
        registry.register_cell(Cell::new("B", 0.0, 0.0, 100.0)).unwrap();
        let ue = UeId::from("ue-1");
        registry
            .register_ue(ue.clone(), CellId::from("A"), ServiceProfile::default(), 0.0)
            .unwrap();
        for i in 1..20 {
            let cell = if i % 2 == 0 { "A" } else { "B" };
            registry
                .commit_handover(&ue, CellId::from(cell), i as f64 * 10.0)
                .unwrap();
            assert!(registry.get_tracker(&ue).unwrap().history_len() <= 4);
        }
        assert!(StateRegistry::with_history_capacity(0).is_err());
    }

    #[test]
    fn test_profile_replacement() {
        let registry = registry_with_cells(&["A"]);
        let ue = UeId::from("ue-1");
        registry
            .register_ue(ue.clone(), CellId::from("A"), ServiceProfile::default(), 0.0)
            .unwrap();
        let urllc = ServiceProfile::for_service(ServiceType::InteractiveLowLatency);
        registry.set_service_profile(&ue, urllc.clone()).unwrap();
        assert_eq!(registry.service_profile(&ue).unwrap(), urllc);

        let invalid = ServiceProfile {
            priority: 42,
            ..urllc
        };
        assert!(registry.set_service_profile(&ue, invalid).is_err());
    }

    #[test]
    fn test_deregister_ue() {
        let registry = registry_with_cells(&["A"]);
        let ue = UeId::from("ue-1");
        registry
            .register_ue(ue.clone(), CellId::from("A"), ServiceProfile::default(), 0.0)
            .unwrap();
        assert_eq!(registry.ue_count(), 1);
        assert!(registry.deregister_ue(&ue).is_some());
        assert_eq!(registry.ue_count(), 0);
        assert!(registry.deregister_ue(&ue).is_none());
    }
}
