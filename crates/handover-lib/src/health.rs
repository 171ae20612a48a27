//! Health of the handover core
//!
//! The predictor is the only component expected to flap: rule mode keeps
//! deciding while it is out, so its failures degrade health without
//! affecting readiness. Readiness follows the topology; a core with no
//! registered cells cannot decide anything.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still deciding, with reduced capability
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures since the last success; only the predictor reports these
    #[serde(default, skip_serializing_if = "is_zero")]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>, consecutive_failures: u32) -> Self {
        Self {
            status,
            message,
            consecutive_failures,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<TopologyStatus>,
}

/// Topology size when it was last loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyStatus {
    pub cells: usize,
    pub ues: usize,
}

pub mod components {
    pub const REGISTRY: &str = "registry";
    pub const PREDICTOR: &str = "predictor";
    pub const DISPATCHER: &str = "dispatcher";
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<String, ComponentHealth>,
    topology: Option<TopologyStatus>,
}

/// Shared health state of the registry, predictor and dispatcher
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the registry, predictor and dispatcher as healthy
    pub async fn register_defaults(&self) {
        let mut state = self.state.write().await;
        for name in [components::REGISTRY, components::PREDICTOR, components::DISPATCHER] {
            state.components.insert(
                name.to_string(),
                ComponentHealth::new(ComponentStatus::Healthy, None, 0),
            );
        }
    }

    /// The predictor missed a tick; the rule decided instead
    pub async fn report_predictor_failure(&self, detail: &str) {
        let mut state = self.state.write().await;
        let failures = state
            .components
            .get(components::PREDICTOR)
            .map_or(0, |c| c.consecutive_failures)
            .saturating_add(1);
        state.components.insert(
            components::PREDICTOR.to_string(),
            ComponentHealth::new(ComponentStatus::Degraded, Some(detail.to_string()), failures),
        );
    }

    /// The predictor answered in time
    pub async fn report_predictor_ok(&self) {
        let mut state = self.state.write().await;
        state.components.insert(
            components::PREDICTOR.to_string(),
            ComponentHealth::new(ComponentStatus::Healthy, None, 0),
        );
    }

    /// A registry or dispatcher error that stops decisions
    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        let mut state = self.state.write().await;
        state.components.insert(
            name.to_string(),
            ComponentHealth::new(ComponentStatus::Unhealthy, Some(message.into()), 0),
        );
    }

    /// Record the topology the core will decide over
    pub async fn mark_topology_loaded(&self, cells: usize, ues: usize) {
        self.state.write().await.topology = Some(TopologyStatus { cells, ues });
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, s| match (worst, s) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            });
        HealthResponse { status, components }
    }

    pub async fn component(&self, name: &str) -> Option<ComponentHealth> {
        self.state.read().await.components.get(name).cloned()
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let topology = self.state.read().await.topology;
        let unhealthy = self.health().await.status == ComponentStatus::Unhealthy;
        let not_ready = |reason: &str| ReadinessResponse {
            ready: false,
            reason: Some(reason.to_string()),
            topology,
        };

        match topology {
            None => not_ready("Topology not yet loaded"),
            Some(t) if t.cells == 0 => not_ready("Topology has no cells"),
            Some(_) if unhealthy => not_ready("Critical component unhealthy"),
            Some(_) => ReadinessResponse {
                ready: true,
                reason: None,
                topology,
            },
        }
    }
}
