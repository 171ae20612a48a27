//! Handover decision core
//!
//! This crate provides the core functionality for:
//! - Cell and UE state tracking
//! - Deterministic A3-style handover rules
//! - Predictive candidate selection with confidence gating
//! - Ping-pong suppression
//! - Per-UE tick orchestration and dispatch
//! - Health checks and observability

pub mod dispatcher;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod pingpong;
pub mod predictor;
pub mod registry;
pub mod rule;
pub mod scenario;

pub use dispatcher::{TickDispatcher, TickResult};
pub use error::HandoverError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    TopologyStatus,
};
pub use models::*;
pub use observability::{HandoverMetrics, StructuredLogger};
pub use orchestrator::{DecisionOrchestrator, DecisionOutcome, EvaluationMode, HandoverConfig};
pub use registry::StateRegistry;
