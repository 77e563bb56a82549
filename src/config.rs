//! # Heatbox Configuration
//!
//! A single TOML file describes the sensor, the relay, the control tuning and
//! where events are recorded. Every section and key is optional.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//!
//! [sensor]
//! kind = "ds18b20"
//! sensor_id = "28-0316a2794dff"
//!
//! [heater]
//! kind = "gpio"
//! pin = 2
//! active_low = true
//!
//! [control]
//! target = 22.0
//! tolerance = 0.5
//! heating_rate = 100.0
//!
//! [recorder]
//! kind = "jsonl"
//! data_dir = "/var/lib/heatbox"
//! ```

// src/config.rs - Single configuration file
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::ControlTiming;
use crate::hardware::simulated::EnclosureModel;
use crate::tuning::{InvalidParameter, Tuning};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<InvalidParameter> for ConfigError {
    fn from(e: InvalidParameter) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub heater: HeaterConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Simulated,
    Ds18b20,
}

/// Temperature probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,
    #[serde(default = "default_w1_base")]
    pub w1_base: PathBuf,
    #[serde(default)]
    pub sensor_id: String,
    #[serde(default = "default_sensor_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: default_sensor_kind(),
            w1_base: default_w1_base(),
            sensor_id: String::new(),
            timeout_ms: default_sensor_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaterKind {
    Simulated,
    Gpio,
}

/// Heater relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaterConfig {
    #[serde(default = "default_heater_kind")]
    pub kind: HeaterKind,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    #[serde(default = "default_pin")]
    pub pin: u32,
    #[serde(default = "default_active_low")]
    pub active_low: bool,
    #[serde(default = "default_heater_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            kind: default_heater_kind(),
            gpio_root: default_gpio_root(),
            pin: default_pin(),
            active_low: default_active_low(),
            timeout_ms: default_heater_timeout_ms(),
        }
    }
}

/// Initial tuning plus the fixed timing of the enclosure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: f64,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_heating_rate")]
    pub heating_rate: f64,
    #[serde(default = "default_cooling_rate")]
    pub cooling_rate: f64,
    #[serde(default = "default_inertia_secs")]
    pub inertia_secs: f64,
    #[serde(default = "default_small_burst_secs")]
    pub small_burst_secs: f64,
    #[serde(default = "default_large_burst_secs")]
    pub large_burst_secs: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            target: None,
            tolerance: default_tolerance(),
            heating_rate: default_heating_rate(),
            cooling_rate: default_cooling_rate(),
            inertia_secs: default_inertia_secs(),
            small_burst_secs: default_small_burst_secs(),
            large_burst_secs: default_large_burst_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderKind {
    Memory,
    Jsonl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    #[serde(default = "default_recorder_kind")]
    pub kind: RecorderKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Ring size per stream for the memory recorder.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            kind: default_recorder_kind(),
            data_dir: default_data_dir(),
            capacity: default_capacity(),
        }
    }
}

/// Simulated enclosure used when sensor or heater kind is `simulated`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_ambient")]
    pub ambient: f64,
    #[serde(default)]
    pub start_temperature: Option<f64>,
    #[serde(default = "default_noise")]
    pub noise: f64,
    #[serde(default = "default_speedup")]
    pub speedup: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ambient: default_ambient(),
            start_temperature: None,
            noise: default_noise(),
            speedup: default_speedup(),
        }
    }
}

impl Config {
    /// Reject values that would make the controller misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tuning()?;
        let c = &self.control;
        for (name, value) in [
            ("control.tick_interval_secs", c.tick_interval_secs),
            ("control.small_burst_secs", c.small_burst_secs),
            ("control.large_burst_secs", c.large_burst_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0, got {}", name, value)));
            }
        }
        // Zero inertia turns the controller into plain bang-bang.
        if !c.inertia_secs.is_finite() || c.inertia_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "control.inertia_secs must be >= 0, got {}",
                c.inertia_secs
            )));
        }
        if c.small_burst_secs > c.large_burst_secs {
            return Err(ConfigError::Invalid(
                "control.small_burst_secs must not exceed control.large_burst_secs".to_string(),
            ));
        }
        if self.sensor.timeout_ms == 0 || self.heater.timeout_ms == 0 {
            return Err(ConfigError::Invalid("sensor and heater timeouts must be > 0".to_string()));
        }
        if self.sensor.kind == SensorKind::Ds18b20 && self.sensor.sensor_id.is_empty() {
            return Err(ConfigError::Invalid("sensor.sensor_id is required for ds18b20".to_string()));
        }
        if self.recorder.kind == RecorderKind::Memory && self.recorder.capacity == 0 {
            return Err(ConfigError::Invalid("recorder.capacity must be > 0".to_string()));
        }
        if !self.simulation.speedup.is_finite() || self.simulation.speedup < 0.0 {
            return Err(ConfigError::Invalid("simulation.speedup must be >= 0".to_string()));
        }
        Ok(())
    }

    pub fn tuning(&self) -> Result<Tuning, InvalidParameter> {
        let c = &self.control;
        Tuning::new(c.target, c.tolerance, c.heating_rate, c.cooling_rate)
    }

    pub fn timing(&self) -> ControlTiming {
        let c = &self.control;
        ControlTiming {
            tick_interval: Duration::from_secs_f64(c.tick_interval_secs),
            inertia_duration: c.inertia_secs,
            small_burst_duration: c.small_burst_secs,
            large_burst_duration: c.large_burst_secs,
            sensor_timeout: Duration::from_millis(self.sensor.timeout_ms),
            actuator_timeout: Duration::from_millis(self.heater.timeout_ms),
        }
    }

    pub fn enclosure_model(&self) -> EnclosureModel {
        let s = &self.simulation;
        EnclosureModel {
            ambient: s.ambient,
            noise: s.noise,
            speedup: s.speedup,
            ..EnclosureModel::default()
        }
    }

    /// Force both ends onto the simulated enclosure (`--simulate`).
    pub fn force_simulation(&mut self) {
        self.sensor.kind = SensorKind::Simulated;
        self.heater.kind = HeaterKind::Simulated;
    }
}

// Default value functions
fn default_bind() -> String { "0.0.0.0:3000".to_string() }
fn default_sensor_kind() -> SensorKind { SensorKind::Simulated }
fn default_w1_base() -> PathBuf { PathBuf::from("/sys/bus/w1/devices") }
fn default_sensor_timeout_ms() -> u64 { 5000 }
fn default_heater_kind() -> HeaterKind { HeaterKind::Simulated }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
fn default_pin() -> u32 { 2 }
fn default_active_low() -> bool { true }
fn default_heater_timeout_ms() -> u64 { 2000 }
fn default_tick_interval_secs() -> f64 { 30.0 }
fn default_tolerance() -> f64 { 0.5 }
fn default_heating_rate() -> f64 { 100.0 }
fn default_cooling_rate() -> f64 { 600.0 }
fn default_inertia_secs() -> f64 { crate::control::INERTIA_DURATION_SECS }
fn default_small_burst_secs() -> f64 { crate::control::SMALL_BURST_SECS }
fn default_large_burst_secs() -> f64 { crate::control::LARGE_BURST_SECS }
fn default_recorder_kind() -> RecorderKind { RecorderKind::Memory }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_capacity() -> usize { 20_000 }
fn default_ambient() -> f64 { 18.0 }
fn default_noise() -> f64 { 0.05 }
fn default_speedup() -> f64 { 1.0 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
