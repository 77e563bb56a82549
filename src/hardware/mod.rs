// src/hardware/mod.rs - Sensor and heater relay interfaces
pub mod ds18b20;
pub mod gpio;
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

pub use ds18b20::Ds18b20Sensor;
pub use gpio::GpioRelay;
pub use simulated::SimulatedEnclosure;

/// A failed temperature read. Always treated as transient by the controller.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("IO error reading sensor: {0}")]
    Io(#[from] std::io::Error),
    #[error("sensor CRC check failed")]
    CrcMismatch,
    #[error("malformed sensor output: {0}")]
    Malformed(String),
    #[error("reading {0:.3}°C is outside the sensor range")]
    OutOfRange(f64),
    #[error("sensor read timed out after {0} ms")]
    Timeout(u64),
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// A failed relay command. Fatal to automatic control.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("IO error driving relay: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay command timed out after {0} ms")]
    Timeout(u64),
    #[error("relay driver fault: {0}")]
    Driver(String),
}

/// Source of point temperature samples in °C.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn read(&self) -> Result<f64, SensorError>;
}

/// Binary heater output. `set` must be idempotent.
#[async_trait]
pub trait HeaterActuator: Send + Sync {
    async fn set(&self, energized: bool) -> Result<(), ActuationError>;

    /// Leave the output de-energized and give the line back to the OS.
    async fn release(&self) -> Result<(), ActuationError> {
        self.set(false).await
    }
}

#[async_trait]
impl<T: TemperatureSource + ?Sized> TemperatureSource for std::sync::Arc<T> {
    async fn read(&self) -> Result<f64, SensorError> {
        (**self).read().await
    }
}

#[async_trait]
impl<T: HeaterActuator + ?Sized> HeaterActuator for std::sync::Arc<T> {
    async fn set(&self, energized: bool) -> Result<(), ActuationError> {
        (**self).set(energized).await
    }

    async fn release(&self) -> Result<(), ActuationError> {
        (**self).release().await
    }
}
