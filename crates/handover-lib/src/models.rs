//! Core data models for the handover core

use crate::error::HandoverError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// UE identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UeId(pub String);

impl UeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Planar position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A radio cell known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub position: Position,
    pub coverage_radius_m: f64,
}

impl Cell {
    pub fn new(id: impl Into<String>, x: f64, y: f64, coverage_radius_m: f64) -> Self {
        Self {
            id: CellId::new(id),
            position: Position { x, y },
            coverage_radius_m,
        }
    }
}

/// Service category attached to a UE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// URLLC-like traffic
    InteractiveLowLatency,
    /// eMBB-like traffic
    Broadband,
    /// mMTC-like traffic
    MachineType,
    #[default]
    Default,
}

impl ServiceType {
    /// Priority assigned when a profile is built without an explicit one
    pub fn default_priority(&self) -> u8 {
        match self {
            ServiceType::InteractiveLowLatency => 9,
            ServiceType::Broadband => 5,
            ServiceType::MachineType => 2,
            ServiceType::Default => 5,
        }
    }

    pub fn default_qos(&self) -> QosRequirements {
        match self {
            ServiceType::InteractiveLowLatency => QosRequirements {
                max_latency_ms: 10.0,
                min_throughput_mbps: 1.0,
                max_jitter_ms: 2.0,
                max_loss_ratio: 0.001,
            },
            ServiceType::Broadband => QosRequirements {
                max_latency_ms: 50.0,
                min_throughput_mbps: 100.0,
                max_jitter_ms: 20.0,
                max_loss_ratio: 0.01,
            },
            ServiceType::MachineType => QosRequirements {
                max_latency_ms: 1000.0,
                min_throughput_mbps: 0.1,
                max_jitter_ms: 100.0,
                max_loss_ratio: 0.05,
            },
            ServiceType::Default => QosRequirements {
                max_latency_ms: 100.0,
                min_throughput_mbps: 10.0,
                max_jitter_ms: 30.0,
                max_loss_ratio: 0.02,
            },
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::InteractiveLowLatency => write!(f, "interactive_low_latency"),
            ServiceType::Broadband => write!(f, "broadband"),
            ServiceType::MachineType => write!(f, "machine_type"),
            ServiceType::Default => write!(f, "default"),
        }
    }
}

/// Explicit QoS overrides; unset fields fall back to the service defaults
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QosTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_throughput_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jitter_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_loss_ratio: Option<f64>,
}

/// Fully resolved QoS requirements for a UE
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosRequirements {
    pub max_latency_ms: f64,
    pub min_throughput_mbps: f64,
    pub max_jitter_ms: f64,
    pub max_loss_ratio: f64,
}

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Service profile attached to a UE at registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub service_type: ServiceType,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos: Option<QosTargets>,
}

impl ServiceProfile {
    /// Build a profile, rejecting priorities outside 1..=10
    pub fn new(service_type: ServiceType, priority: u8) -> Result<Self, HandoverError> {
        let profile = Self {
            service_type,
            priority,
            qos: None,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Profile with the service type's default priority
    pub fn for_service(service_type: ServiceType) -> Self {
        Self {
            service_type,
            priority: service_type.default_priority(),
            qos: None,
        }
    }

    pub fn with_qos(mut self, qos: QosTargets) -> Self {
        self.qos = Some(qos);
        self
    }

    pub fn validate(&self) -> Result<(), HandoverError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(HandoverError::InvalidParameter(format!(
                "priority {} outside {}..={}",
                self.priority, MIN_PRIORITY, MAX_PRIORITY
            )));
        }
        Ok(())
    }

    /// Service defaults with explicit overrides applied
    pub fn effective_qos(&self) -> QosRequirements {
        let mut qos = self.service_type.default_qos();
        if let Some(overrides) = &self.qos {
            if let Some(v) = overrides.max_latency_ms {
                qos.max_latency_ms = v;
            }
            if let Some(v) = overrides.min_throughput_mbps {
                qos.min_throughput_mbps = v;
            }
            if let Some(v) = overrides.max_jitter_ms {
                qos.max_jitter_ms = v;
            }
            if let Some(v) = overrides.max_loss_ratio {
                qos.max_loss_ratio = v;
            }
        }
        qos
    }
}

impl Default for ServiceProfile {
    fn default() -> Self {
        Self::for_service(ServiceType::Default)
    }
}

/// Radio measurement of one cell at the UE's position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMeasurement {
    pub cell_id: CellId,
    /// RSRP-like signal strength in dBm
    pub signal_strength_dbm: f64,
    /// RSRQ/SINR-like quality in dB
    pub signal_quality_db: f64,
    /// Interference ratio in 0..1
    #[serde(default)]
    pub interference_ratio: f64,
}

impl CellMeasurement {
    pub fn new(cell_id: impl Into<String>, signal_strength_dbm: f64, signal_quality_db: f64) -> Self {
        Self {
            cell_id: CellId::new(cell_id),
            signal_strength_dbm,
            signal_quality_db,
            interference_ratio: 0.0,
        }
    }
}

/// Per-tick measurements for a single UE, supplied by the mobility simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    /// Simulation time in seconds
    pub timestamp: f64,
    pub measurements: Vec<CellMeasurement>,
}

impl MeasurementSnapshot {
    pub fn new(timestamp: f64, measurements: Vec<CellMeasurement>) -> Self {
        Self {
            timestamp,
            measurements,
        }
    }

    pub fn get(&self, cell_id: &CellId) -> Option<&CellMeasurement> {
        self.measurements.iter().find(|m| &m.cell_id == cell_id)
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// One serving-cell change (or the initial attachment)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverRecord {
    pub cell_id: CellId,
    pub timestamp: f64,
}
