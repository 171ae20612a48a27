//! Handover agent - runs the handover decision core for a simulation
//!
//! Loads a scenario, drives its ticks through the decision core and keeps
//! serving health, metrics and registry state until shut down.

use anyhow::{Context, Result};
use handover_lib::{
    health::{components, HealthRegistry},
    observability::{HandoverMetrics, StructuredLogger},
    predictor::{CellClassifier, HeuristicClassifier, OnnxClassifier},
    scenario::Scenario,
    DecisionOrchestrator, HandoverConfig,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod driver;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting handover-agent");

    let config = config::AgentConfig::load()?;
    info!(node_name = %config.node_name, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register_defaults().await;

    let scenario = match &config.scenario_path {
        Some(path) => Some(Scenario::load(Path::new(path))?),
        None => None,
    };
    if let Some(scenario) = &scenario {
        let problems = scenario.validate();
        if !problems.is_empty() {
            for problem in &problems {
                warn!(scenario = %scenario.name, problem = %problem, "Invalid scenario");
            }
            anyhow::bail!("Scenario has {} problem(s)", problems.len());
        }
    }

    let core_config = scenario
        .as_ref()
        .and_then(|s| s.config.clone())
        .or_else(|| config.core.clone())
        .unwrap_or_default();
    let registry = Arc::new(core_config.build_registry()?);

    let classifier = build_classifier(&config)?;
    let model_version = classifier.model_version();

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &model_version);

    let orchestrator = Arc::new(
        DecisionOrchestrator::new(registry.clone(), Some(classifier), core_config.clone())?
            .with_logger(logger.clone())
            .with_health(health_registry.clone()),
    );
    log_core_config(&core_config);

    let metrics = HandoverMetrics::new();
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        registry.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    if let Some(scenario) = &scenario {
        if let Err(e) = scenario.apply_topology(&registry) {
            health_registry
                .set_unhealthy(components::REGISTRY, e.to_string())
                .await;
            return Err(e).context("Failed to apply scenario topology");
        }
        metrics.set_topology(registry.cell_count(), registry.ue_count());
        health_registry
            .mark_topology_loaded(registry.cell_count(), registry.ue_count())
            .await;

        match driver::drive(orchestrator.clone(), scenario, config.queue_depth).await {
            Ok(report) => info!(
                scenario = %scenario.name,
                ticks = report.ticks,
                errors = report.errors,
                outcomes = ?report.outcomes,
                "Scenario complete"
            ),
            Err(e) => {
                health_registry
                    .set_unhealthy(components::DISPATCHER, e.to_string())
                    .await;
                warn!(error = %e, "Scenario aborted");
            }
        }

        if let Some(path) = &config.snapshot_path {
            registry.save_snapshot(Path::new(path))?;
        }
    } else {
        warn!("No scenario configured, serving an empty registry");
        health_registry.mark_topology_loaded(0, 0).await;
    }

    tokio::select! {
        result = api_handle => {
            result.context("API server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }
    info!("Shutting down");

    Ok(())
}

/// ONNX model when one is configured, otherwise the heuristic scorer
fn build_classifier(config: &config::AgentConfig) -> Result<Arc<dyn CellClassifier>> {
    match &config.model_path {
        Some(path) => {
            let classifier = OnnxClassifier::from_file(Path::new(path), config.model_sha256.as_deref())
                .with_context(|| format!("Failed to load model from {}", path))?;
            Ok(Arc::new(classifier))
        }
        None => {
            info!(
                temperature = config.heuristic_temperature,
                "No model configured, using heuristic classifier"
            );
            Ok(Arc::new(HeuristicClassifier::new(config.heuristic_temperature)))
        }
    }
}

fn log_core_config(config: &HandoverConfig) {
    info!(
        hysteresis_db = config.rule.hysteresis_db,
        time_to_trigger_s = config.rule.time_to_trigger_s,
        quality_threshold_db = ?config.rule.quality_threshold_db,
        min_antennas_for_predictive = config.min_antennas_for_predictive,
        predictor_timeout_ms = config.predictor_timeout_ms,
        "Handover core configured"
    );
}
