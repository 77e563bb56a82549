//! Contains the data models for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::control::{ControlState, ControllerStatus};
use crate::events::history::HistoryPoint;

#[derive(Debug, Deserialize)]
pub struct SetpointRequest {
    /// `null` clears the target.
    pub temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetpointResponse {
    pub success: bool,
    pub target_temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ToleranceRequest {
    pub tolerance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatingRateRequest {
    pub heating_rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoolingRateRequest {
    pub cooling_rate: f64,
}

/// Generic acknowledgement, also used as the error body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaterState {
    On,
    Off,
}

impl From<bool> for HeaterState {
    fn from(energized: bool) -> Self {
        if energized { HeaterState::On } else { HeaterState::Off }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaterResponse {
    pub heater_state: HeaterState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub control_state: ControlState,
    pub automatic: bool,
}

/// What the dashboard polls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub heater_state: HeaterState,
    pub control_state: ControlState,
    pub target_temperature: Option<f64>,
    pub tolerance: f64,
    pub temperature: Option<f64>,
    pub heating_rate: f64,
    pub cooling_rate: f64,
    pub automatic: bool,
    pub wait_remaining: f64,
    pub sensor_error: Option<String>,
    pub last_tick: Option<DateTime<Utc>>,
    pub sink_failures: u64,
}

impl From<ControllerStatus> for StatusResponse {
    fn from(s: ControllerStatus) -> Self {
        Self {
            heater_state: s.heater_energized.into(),
            control_state: s.control_state,
            target_temperature: s.target_temperature,
            tolerance: s.tolerance,
            temperature: s.temperature,
            heating_rate: s.heating_rate,
            cooling_rate: s.cooling_rate,
            automatic: s.automatic,
            wait_remaining: s.wait_remaining_sec,
            sensor_error: s.sensor_error,
            last_tick: s.last_tick,
            sink_failures: s.sink_failures,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemperatureResponse {
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Minutes back from now.
    #[serde(default = "default_time_range")]
    pub time_range: u32,
    #[serde(default = "default_points")]
    pub points: usize,
}

fn default_time_range() -> u32 { 60 }
fn default_points() -> usize { 300 }

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub temperatures: Vec<HistoryPoint>,
}

/// An externally taken reading to add to the history.
#[derive(Debug, Deserialize)]
pub struct LogTemperatureRequest {
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub message: String,
}
