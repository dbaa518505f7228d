//! Scheduler configuration.

use crate::error::{DacError, DacResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `start()` does when a session is already running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Begin a fresh session: new start time, cursor back to zero, first batch requested again.
    #[default]
    Reset,
    /// Keep the running session and treat the call as a no-op.
    Ignore,
}

/// Configuration for the streaming scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DacConfig {
    /// Fixed sample rate for every buffer handed to the sink (frames per second)
    pub sample_rate: u32,

    /// How much earlier than a batch's start time the next request is issued.
    ///
    /// Zero issues the request exactly when the just-scheduled batch starts playing.
    pub request_lead: Duration,

    /// Behaviour of `start()` while already running
    pub restart_policy: RestartPolicy,
}

impl Default for DacConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            request_lead: Duration::ZERO,
            restart_policy: RestartPolicy::Reset,
        }
    }
}

impl DacConfig {
    /// Create a configuration at the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Configuration for sources with jittery production times.
    ///
    /// Requests go out 5ms before the previous batch starts playing, at 48kHz.
    pub fn low_latency() -> Self {
        Self {
            sample_rate: 48000,
            request_lead: Duration::from_millis(5),
            restart_policy: RestartPolicy::Reset,
        }
    }

    /// Set sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set request lead
    pub fn with_request_lead(mut self, lead: Duration) -> Self {
        self.request_lead = lead;
        self
    }

    /// Set restart policy
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Check that the configuration can drive a scheduler.
    pub fn validate(&self) -> DacResult<()> {
        if self.sample_rate == 0 {
            return Err(DacError::invalid_parameter("sample_rate must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DacConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.request_lead, Duration::ZERO);
        assert_eq!(config.restart_policy, RestartPolicy::Reset);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let err = DacConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, DacError::InvalidParameter(_)));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: DacConfig =
            serde_json::from_str(r#"{ "sample_rate": 22050, "restart_policy": "ignore" }"#)
                .unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.restart_policy, RestartPolicy::Ignore);
        assert_eq!(config.request_lead, Duration::ZERO);
    }

    #[test]
    fn test_builders() {
        let config = DacConfig::new(8000)
            .with_request_lead(Duration::from_millis(3))
            .with_restart_policy(RestartPolicy::Ignore);
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.request_lead, Duration::from_millis(3));
        assert_eq!(config.restart_policy, RestartPolicy::Ignore);
    }
}
