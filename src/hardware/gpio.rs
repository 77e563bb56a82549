// src/hardware/gpio.rs - Heater relay on a sysfs GPIO line
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ActuationError, HeaterActuator};

/// Relay driven through `/sys/class/gpio`.
///
/// Most relay boards are active-low: writing `0` closes the contact and
/// energizes the heater. `active_low` maps that for us.
#[derive(Debug, Clone)]
pub struct GpioRelay {
    gpio_root: PathBuf,
    pin: u32,
    active_low: bool,
}

impl GpioRelay {
    pub fn new(gpio_root: impl AsRef<Path>, pin: u32, active_low: bool) -> Self {
        Self {
            gpio_root: gpio_root.as_ref().to_path_buf(),
            pin,
            active_low,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.gpio_root.join(format!("gpio{}", self.pin))
    }

    fn level(&self, energized: bool) -> &'static str {
        if energized != self.active_low { "1" } else { "0" }
    }

    /// Export the pin if needed, configure it as an output and drive it off.
    pub async fn init(&self) -> Result<(), ActuationError> {
        if fs::metadata(self.pin_dir()).await.is_err() {
            tracing::info!("Exporting GPIO {}", self.pin);
            fs::write(self.gpio_root.join("export"), self.pin.to_string()).await?;
        }
        // Writing "high"/"low" sets direction and the initial level in one step,
        // so the relay never glitches on.
        let initial = if self.active_low { "high" } else { "low" };
        fs::write(self.pin_dir().join("direction"), initial).await?;
        tracing::info!("GPIO {} configured as heater relay (active_low={})", self.pin, self.active_low);
        Ok(())
    }
}

#[async_trait]
impl HeaterActuator for GpioRelay {
    async fn set(&self, energized: bool) -> Result<(), ActuationError> {
        fs::write(self.pin_dir().join("value"), self.level(energized)).await?;
        Ok(())
    }

    async fn release(&self) -> Result<(), ActuationError> {
        self.set(false).await?;
        fs::write(self.gpio_root.join("unexport"), self.pin.to_string()).await?;
        tracing::info!("Released GPIO {}", self.pin);
        Ok(())
    }
}
