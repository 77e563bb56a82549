// src/control/context.rs - State owned by the controller
use chrono::{DateTime, Utc};

use super::ControlState;
use crate::tuning::Tuning;

/// Everything the decision function looks at. Only the controller mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerContext {
    pub target_temperature: Option<f64>,
    pub tolerance: f64,
    pub heating_rate_sec_per_degree: f64,
    pub cooling_rate_sec_per_degree: f64,
    pub state: ControlState,
    pub wait_remaining_sec: f64,
    pub heater_energized: bool,
    /// False once control is explicitly stopped (manual mode).
    pub automatic: bool,
    /// Last good reading.
    pub last_temperature: Option<f64>,
    /// Set while the most recent read failed.
    pub sensor_error: Option<String>,
    /// Time of the last tick that completed.
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl ControllerContext {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            target_temperature: tuning.target_temperature,
            tolerance: tuning.tolerance,
            heating_rate_sec_per_degree: tuning.heating_rate,
            cooling_rate_sec_per_degree: tuning.cooling_rate,
            state: ControlState::Off,
            wait_remaining_sec: 0.0,
            heater_energized: false,
            automatic: true,
            last_temperature: None,
            sensor_error: None,
            last_tick_at: None,
        }
    }

    pub fn apply_tuning(&mut self, tuning: &Tuning) {
        self.target_temperature = tuning.target_temperature;
        self.tolerance = tuning.tolerance;
        self.heating_rate_sec_per_degree = tuning.heating_rate;
        self.cooling_rate_sec_per_degree = tuning.cooling_rate;
    }

    /// `(lower, upper)` around the target, if one is set.
    pub fn thresholds(&self) -> Option<(f64, f64)> {
        self.target_temperature
            .map(|target| (target - self.tolerance, target + self.tolerance))
    }

    /// Force the machine back to `Off` with no pending wait.
    pub fn reset_to_off(&mut self) {
        self.state = ControlState::Off;
        self.wait_remaining_sec = 0.0;
    }
}
