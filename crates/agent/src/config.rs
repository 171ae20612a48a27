//! Agent configuration

use anyhow::{Context, Result};
use handover_lib::HandoverConfig;
use serde::Deserialize;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "HANDOVER_CONFIG_FILE";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to structured log events
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Scenario to replay on startup
    #[serde(default)]
    pub scenario_path: Option<String>,

    /// ONNX model for predictive mode; the heuristic classifier is used otherwise
    #[serde(default)]
    pub model_path: Option<String>,

    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Softmax temperature of the heuristic classifier
    #[serde(default = "default_heuristic_temperature")]
    pub heuristic_temperature: f64,

    /// Where to persist the registry after the replay
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Per-UE tick queue depth
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Handover core settings; the scenario's own settings take precedence
    #[serde(default)]
    pub core: Option<HandoverConfig>,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "handover-node".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_heuristic_temperature() -> f64 {
    0.05
}

fn default_queue_depth() -> usize {
    handover_lib::dispatcher::DEFAULT_QUEUE_DEPTH
}

impl AgentConfig {
    /// Load configuration from the optional config file, then `HANDOVER_*`
    /// environment variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `HANDOVER_CORE__MIN_ANTENNAS_FOR_PREDICTIVE=4`.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("HANDOVER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build agent configuration")?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        if let Some(core) = &agent.core {
            core.validate()?;
        }
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let config = config::Config::builder().build().unwrap();
        let agent = AgentConfig::from_config(config).unwrap();
        assert_eq!(agent.api_port, 8080);
        assert_eq!(agent.queue_depth, 64);
        assert_eq!(agent.heuristic_temperature, 0.05);
        assert!(agent.scenario_path.is_none());
        assert!(agent.core.is_none());
    }

    #[test]
    fn test_nested_core_settings() {
        let config = config::Config::builder()
            .set_override("api_port", 9100)
            .unwrap()
            .set_override("core.min_antennas_for_predictive", 5)
            .unwrap()
            .set_override("core.rule.hysteresis_db", 2.5)
            .unwrap()
            .build()
            .unwrap();
        let agent = AgentConfig::from_config(config).unwrap();
        assert_eq!(agent.api_port, 9100);
        let core = agent.core.unwrap();
        assert_eq!(core.min_antennas_for_predictive, 5);
        assert_eq!(core.rule.hysteresis_db, 2.5);
        assert_eq!(core.pingpong.max_per_minute, 3);
    }

    #[test]
    fn test_invalid_core_settings_rejected() {
        let config = config::Config::builder()
            .set_override("core.min_antennas_for_predictive", 0)
            .unwrap()
            .build()
            .unwrap();
        assert!(AgentConfig::from_config(config).is_err());
    }
}
