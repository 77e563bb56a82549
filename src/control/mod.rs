// src/control/mod.rs - Inertia-aware heater control loop
pub mod context;
pub mod controller;
pub mod estimator;
pub mod service;
pub mod transition;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hardware::{ActuationError, SensorError};
use crate::tuning::InvalidParameter;

pub use context::ControllerContext;
pub use controller::{Controller, ControllerStatus};
pub use service::{ControlHandle, ControlRequest, ControlService};
pub use transition::{decide, Decision};

/// Thermal lag after switch-off: the enclosure keeps warming for this long.
pub const INERTIA_DURATION_SECS: f64 = 200.0;
/// Burst long enough to add roughly 0.5°C at the default heating rate.
pub const SMALL_BURST_SECS: f64 = 50.0;
/// Burst long enough to add roughly 1°C at the default heating rate.
pub const LARGE_BURST_SECS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlState {
    Off,
    InitialHeating,
    InertiaWait,
    Control,
    SmallBurst,
    LargeBurst,
}

impl ControlState {
    pub fn is_burst(self) -> bool {
        matches!(self, ControlState::SmallBurst | ControlState::LargeBurst)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlState::Off => "Off",
            ControlState::InitialHeating => "InitialHeating",
            ControlState::InertiaWait => "InertiaWait",
            ControlState::Control => "Control",
            ControlState::SmallBurst => "SmallBurst",
            ControlState::LargeBurst => "LargeBurst",
        };
        f.write_str(name)
    }
}

/// What a tick did, in words an operator can read in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "waiting")]
    Waiting,
    #[serde(rename = "idle, no target")]
    IdleNoTarget,
    #[serde(rename = "stopped, manual mode")]
    Stopped,
    #[serde(rename = "armed")]
    Armed,
    #[serde(rename = "heating, no overshoot predicted")]
    Heating,
    #[serde(rename = "overshoot predicted, coasting")]
    Coasting,
    #[serde(rename = "entering steady-state control")]
    EnterControl,
    #[serde(rename = "above target, idle")]
    AboveTarget,
    #[serde(rename = "small burst")]
    SmallBurst,
    #[serde(rename = "large burst")]
    LargeBurst,
    #[serde(rename = "burst complete, coasting")]
    BurstComplete,
    #[serde(rename = "target cleared")]
    TargetCleared,
    #[serde(rename = "automatic control resumed")]
    Resumed,
    #[serde(rename = "actuation failed, automatic control stopped")]
    ActuationFailed,
    #[serde(rename = "anomalous state")]
    Anomaly,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Waiting => "waiting",
            Action::IdleNoTarget => "idle, no target",
            Action::Stopped => "stopped, manual mode",
            Action::Armed => "armed",
            Action::Heating => "heating, no overshoot predicted",
            Action::Coasting => "overshoot predicted, coasting",
            Action::EnterControl => "entering steady-state control",
            Action::AboveTarget => "above target, idle",
            Action::SmallBurst => "small burst",
            Action::LargeBurst => "large burst",
            Action::BurstComplete => "burst complete, coasting",
            Action::TargetCleared => "target cleared",
            Action::Resumed => "automatic control resumed",
            Action::ActuationFailed => "actuation failed, automatic control stopped",
            Action::Anomaly => "anomalous state",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed timing of the enclosure. Set once at startup, never through the API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTiming {
    pub tick_interval: Duration,
    pub inertia_duration: f64,
    pub small_burst_duration: f64,
    pub large_burst_duration: f64,
    pub sensor_timeout: Duration,
    pub actuator_timeout: Duration,
}

impl Default for ControlTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            inertia_duration: INERTIA_DURATION_SECS,
            small_burst_duration: SMALL_BURST_SECS,
            large_burst_duration: LARGE_BURST_SECS,
            sensor_timeout: Duration::from_secs(5),
            actuator_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
    #[error("Actuation error: {0}")]
    Actuation(#[from] ActuationError),
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),
    #[error("manual heater control is only available while automatic control is stopped")]
    ManualOverrideRejected,
    #[error("control service is not running")]
    ServiceUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_text_matches_serde_name() {
        let all = [
            Action::Waiting,
            Action::IdleNoTarget,
            Action::Stopped,
            Action::Armed,
            Action::Heating,
            Action::Coasting,
            Action::EnterControl,
            Action::AboveTarget,
            Action::SmallBurst,
            Action::LargeBurst,
            Action::BurstComplete,
            Action::TargetCleared,
            Action::Resumed,
            Action::ActuationFailed,
            Action::Anomaly,
        ];
        for action in all {
            assert_eq!(serde_json::to_value(action).unwrap(), serde_json::json!(action.as_str()));
        }
    }

    #[test]
    fn test_state_serializes_by_name() {
        assert_eq!(serde_json::to_value(ControlState::InertiaWait).unwrap(), "InertiaWait");
        assert_eq!(ControlState::LargeBurst.to_string(), "LargeBurst");
        assert!(ControlState::SmallBurst.is_burst());
        assert!(!ControlState::Control.is_burst());
    }
}
