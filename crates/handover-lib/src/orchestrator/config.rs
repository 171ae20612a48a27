use crate::error::{HandoverError, Result};
use crate::pingpong::PingPongConfig;
use crate::predictor::FeatureExtractor;
use crate::registry::{StateRegistry, DEFAULT_HISTORY_CAPACITY};
use crate::rule::RuleConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Full configuration surface of the handover core
///
/// Every field has a default, so an empty document deserializes to the
/// stock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverConfig {
    #[serde(default)]
    pub rule: RuleConfig,
    #[serde(default)]
    pub pingpong: PingPongConfig,
    /// Cell count at which predictive mode takes over
    #[serde(default = "default_min_antennas")]
    pub min_antennas_for_predictive: usize,
    #[serde(default = "default_predictor_timeout_ms")]
    pub predictor_timeout_ms: u64,
    /// Per-UE cell history capacity
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_min_antennas() -> usize {
    3
}

fn default_predictor_timeout_ms() -> u64 {
    100
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            rule: RuleConfig::default(),
            pingpong: PingPongConfig::default(),
            min_antennas_for_predictive: default_min_antennas(),
            predictor_timeout_ms: default_predictor_timeout_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl HandoverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_antennas_for_predictive == 0 {
            return Err(HandoverError::InvalidParameter(
                "min_antennas_for_predictive must be at least 1".to_string(),
            ));
        }
        if self.predictor_timeout_ms == 0 {
            return Err(HandoverError::InvalidParameter(
                "predictor_timeout_ms must be positive".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(HandoverError::InvalidParameter(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        self.pingpong.validate()
    }

    pub fn predictor_timeout(&self) -> Duration {
        Duration::from_millis(self.predictor_timeout_ms)
    }

    /// Feature extractor whose rate window matches the suppressor's
    pub fn feature_extractor(&self) -> FeatureExtractor {
        FeatureExtractor::new(self.pingpong.rate_window_s)
    }

    /// Empty registry sized for this configuration
    pub fn build_registry(&self) -> Result<StateRegistry> {
        StateRegistry::with_history_capacity(self.history_capacity)
    }
}
