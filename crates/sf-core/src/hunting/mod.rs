//! Proactive threat hunting.
//!
//! The hunting engine collects raw events across all sources, prepares
//! per-user sign-in features, runs network detectors, generates
//! model-assisted hunting hypotheses, and executes each hunt. Detector
//! thresholds and prompt budgets live in [`HuntingConfig`].

pub mod detectors;
pub mod engine;
pub mod features;

use serde::{Deserialize, Serialize};

/// Hunting engine tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntingConfig {
    /// Default lookback window for event collection, in hours.
    pub lookback_hours: i64,
    /// Findings characters included in the hypothesis prompt.
    pub max_findings_chars: usize,
    /// Output budget for hypothesis generation.
    pub hypothesis_max_tokens: u32,
    /// Output budget for hunt execution.
    pub hunt_max_tokens: u32,
    /// Maximum inter-event gap for beaconing, in seconds.
    pub beacon_time_threshold_secs: i64,
    /// Minimum events per host pair for beaconing.
    pub beacon_count_threshold: usize,
    /// Allowed gap spread (max minus min) for beacon regularity, seconds.
    pub beacon_jitter_secs: i64,
    /// Outbound bytes per host above which exfiltration is flagged.
    pub exfil_byte_threshold: u64,
    /// Distinct destinations inside the window for lateral movement.
    pub lateral_min_connections: usize,
    /// Lateral-movement sliding window, in hours.
    pub lateral_window_hours: i64,
}

impl Default for HuntingConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            max_findings_chars: 3000,
            hypothesis_max_tokens: 3000,
            hunt_max_tokens: 1000,
            beacon_time_threshold_secs: 60,
            beacon_count_threshold: 10,
            beacon_jitter_secs: 5,
            exfil_byte_threshold: 10 * 1024 * 1024,
            lateral_min_connections: 3,
            lateral_window_hours: 1,
        }
    }
}

impl HuntingConfig {
    pub fn with_lookback_hours(mut self, hours: i64) -> Self {
        self.lookback_hours = hours;
        self
    }

    pub fn with_beacon_thresholds(
        mut self,
        time_threshold_secs: i64,
        count_threshold: usize,
        jitter_secs: i64,
    ) -> Self {
        self.beacon_time_threshold_secs = time_threshold_secs;
        self.beacon_count_threshold = count_threshold;
        self.beacon_jitter_secs = jitter_secs;
        self
    }

    pub fn with_exfil_byte_threshold(mut self, bytes: u64) -> Self {
        self.exfil_byte_threshold = bytes;
        self
    }

    pub fn with_lateral_thresholds(mut self, min_connections: usize, window_hours: i64) -> Self {
        self.lateral_min_connections = min_connections;
        self.lateral_window_hours = window_hours;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = HuntingConfig::default();
        assert_eq!(config.lookback_hours, 24);
        assert_eq!(config.beacon_time_threshold_secs, 60);
        assert_eq!(config.beacon_count_threshold, 10);
        assert_eq!(config.exfil_byte_threshold, 10 * 1024 * 1024);
        assert_eq!(config.lateral_min_connections, 3);
        assert_eq!(config.lateral_window_hours, 1);
    }

    #[test]
    fn test_builders() {
        let config = HuntingConfig::default()
            .with_lookback_hours(48)
            .with_beacon_thresholds(30, 5, 2)
            .with_exfil_byte_threshold(1024)
            .with_lateral_thresholds(2, 4);
        assert_eq!(config.lookback_hours, 48);
        assert_eq!(config.beacon_count_threshold, 5);
        assert_eq!(config.exfil_byte_threshold, 1024);
        assert_eq!(config.lateral_window_hours, 4);
    }
}
