//! Ping-pong suppression
//!
//! Ordered gates applied to a candidate cell that differs from the serving
//! cell. The first gate that matches suppresses the handover:
//!
//! 1. `too_recent`: last handover was less than `min_interval_s` ago
//! 2. `too_many`: rate window already holds `max_per_minute` handovers and
//!    confidence is below `boost_threshold`
//! 3. `immediate_return`: candidate was visited within `window_s` and
//!    confidence is below `immediate_threshold`

use crate::error::HandoverError;
use crate::models::CellId;
use crate::registry::UeTrackerState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suppressor thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPongConfig {
    /// Minimum time between consecutive handovers (seconds)
    #[serde(default = "default_min_interval")]
    pub min_interval_s: f64,
    /// Handovers per rate window before the rate gate engages
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: usize,
    #[serde(default = "default_rate_window")]
    pub rate_window_s: f64,
    /// Look-back for immediate returns (seconds)
    #[serde(default = "default_window")]
    pub window_s: f64,
    /// Confidence that overrides the rate gate
    #[serde(default = "default_boost_threshold")]
    pub boost_threshold: f64,
    /// Confidence that overrides the immediate-return gate
    #[serde(default = "default_immediate_threshold")]
    pub immediate_threshold: f64,
}

fn default_min_interval() -> f64 {
    2.0
}

fn default_max_per_minute() -> usize {
    3
}

fn default_rate_window() -> f64 {
    60.0
}

fn default_window() -> f64 {
    10.0
}

fn default_boost_threshold() -> f64 {
    0.9
}

fn default_immediate_threshold() -> f64 {
    0.95
}

impl Default for PingPongConfig {
    fn default() -> Self {
        Self {
            min_interval_s: default_min_interval(),
            max_per_minute: default_max_per_minute(),
            rate_window_s: default_rate_window(),
            window_s: default_window(),
            boost_threshold: default_boost_threshold(),
            immediate_threshold: default_immediate_threshold(),
        }
    }
}

impl PingPongConfig {
    pub fn validate(&self) -> Result<(), HandoverError> {
        let non_negative = [
            ("min_interval_s", self.min_interval_s),
            ("rate_window_s", self.rate_window_s),
            ("window_s", self.window_s),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(HandoverError::InvalidParameter(format!(
                    "{} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("boost_threshold", self.boost_threshold),
            ("immediate_threshold", self.immediate_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(HandoverError::InvalidParameter(format!(
                    "{} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Which gate suppressed a handover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    TooRecent,
    TooMany,
    ImmediateReturn,
}

impl SuppressionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressionReason::TooRecent => "too_recent",
            SuppressionReason::TooMany => "too_many",
            SuppressionReason::ImmediateReturn => "immediate_return",
        }
    }
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PingPongSuppressor {
    config: PingPongConfig,
}

impl PingPongSuppressor {
    pub fn new(config: PingPongConfig) -> Result<Self, HandoverError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PingPongConfig {
        &self.config
    }

    /// Check `candidate` against the gates
    ///
    /// Returns `None` when the handover may proceed, or when the candidate is
    /// the serving cell. Only prunes expired entries from the tracker's rate
    /// window.
    pub fn evaluate(
        &self,
        tracker: &mut UeTrackerState,
        candidate: &CellId,
        confidence: f64,
        now: f64,
    ) -> Option<SuppressionReason> {
        if candidate == tracker.current_cell() {
            return None;
        }

        if let Some(last) = tracker.last_handover_time() {
            if now - last < self.config.min_interval_s {
                return Some(SuppressionReason::TooRecent);
            }
        }

        let recent = tracker.handovers_within(now, self.config.rate_window_s);
        if recent >= self.config.max_per_minute && confidence < self.config.boost_threshold {
            return Some(SuppressionReason::TooMany);
        }

        if tracker.visited_within(candidate, now, self.config.window_s)
            && confidence < self.config.immediate_threshold
        {
            return Some(SuppressionReason::ImmediateReturn);
        }

        None
    }
}
