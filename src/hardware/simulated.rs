// src/hardware/simulated.rs - Simulated enclosure for running without hardware
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;

use super::{ActuationError, HeaterActuator, SensorError, TemperatureSource};

/// Physical parameters of the simulated enclosure.
#[derive(Debug, Clone)]
pub struct EnclosureModel {
    /// Room temperature the box relaxes towards (°C).
    pub ambient: f64,
    /// Rate at which the energized element heats up (°C/s).
    pub element_gain: f64,
    /// Heat transfer from element to air (1/s).
    pub coupling: f64,
    /// Passive loss from air to ambient (1/s).
    pub loss: f64,
    /// Peak-to-peak sensor noise (°C).
    pub noise: f64,
    /// Simulated seconds per wall-clock second.
    pub speedup: f64,
}

impl Default for EnclosureModel {
    fn default() -> Self {
        Self {
            ambient: 18.0,
            element_gain: 0.012,
            coupling: 0.01,
            loss: 0.0004,
            noise: 0.0,
            speedup: 1.0,
        }
    }
}

#[derive(Debug)]
struct EnclosureState {
    model: EnclosureModel,
    air: f64,
    element: f64,
    energized: bool,
    last_update: Instant,
    failing_reads: u32,
    failing_actuation: bool,
    failing_commands: u32,
}

impl EnclosureState {
    fn step(&mut self, dt: f64) {
        let m = &self.model;
        if self.energized {
            self.element += m.element_gain * dt;
        }
        let transfer = m.coupling * (self.element - self.air) * dt;
        self.element -= transfer;
        self.air += transfer - m.loss * (self.air - m.ambient) * dt;
    }

    fn advance(&mut self, mut secs: f64) {
        // Fixed 1 s substeps keep the explicit integration stable.
        while secs > 0.0 {
            let dt = secs.min(1.0);
            self.step(dt);
            secs -= dt;
        }
    }

    fn catch_up(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64() * self.model.speedup;
        self.last_update = now;
        self.advance(elapsed);
    }
}

/// Two-node thermal model (heater element + enclosure air).
///
/// Residual heat in the element keeps warming the air after switch-off,
/// which is exactly the overshoot the controller has to anticipate.
/// Clones share the same enclosure, so one handle can serve as the sensor
/// and another as the relay.
#[derive(Debug, Clone)]
pub struct SimulatedEnclosure {
    inner: Arc<Mutex<EnclosureState>>,
}

impl SimulatedEnclosure {
    pub fn new(model: EnclosureModel) -> Self {
        let start = model.ambient;
        Self::with_temperature(model, start)
    }

    pub fn with_temperature(model: EnclosureModel, temperature: f64) -> Self {
        tracing::info!(
            "Simulated enclosure: ambient {:.1}°C, start {:.1}°C, speedup x{}",
            model.ambient,
            temperature,
            model.speedup
        );
        Self {
            inner: Arc::new(Mutex::new(EnclosureState {
                model,
                air: temperature,
                element: temperature,
                energized: false,
                last_update: Instant::now(),
                failing_reads: 0,
                failing_actuation: false,
                failing_commands: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EnclosureState> {
        // A poisoned lock only means a panicking test thread; the data is plain numbers.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance simulated time without waiting for the wall clock.
    pub fn advance(&self, secs: f64) {
        self.lock().advance(secs);
    }

    pub fn temperature(&self) -> f64 {
        self.lock().air
    }

    pub fn set_temperature(&self, temperature: f64) {
        let mut state = self.lock();
        state.air = temperature;
        state.element = temperature;
    }

    pub fn is_energized(&self) -> bool {
        self.lock().energized
    }

    /// Make the next `count` reads fail.
    pub fn fail_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// Make every relay command fail until cleared.
    pub fn fail_actuation(&self, failing: bool) {
        self.lock().failing_actuation = failing;
    }

    /// Fail the next `count` relay commands, then recover.
    pub fn fail_commands(&self, count: u32) {
        self.lock().failing_commands = count;
    }
}

#[async_trait]
impl TemperatureSource for SimulatedEnclosure {
    async fn read(&self) -> Result<f64, SensorError> {
        let mut state = self.lock();
        state.catch_up();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(SensorError::Unavailable("simulated read failure".to_string()));
        }
        let noise = if state.model.noise > 0.0 {
            state.model.noise * (rand::random::<f64>() - 0.5)
        } else {
            0.0
        };
        Ok(state.air + noise)
    }
}

#[async_trait]
impl HeaterActuator for SimulatedEnclosure {
    async fn set(&self, energized: bool) -> Result<(), ActuationError> {
        let mut state = self.lock();
        state.catch_up();
        if state.failing_actuation {
            return Err(ActuationError::Driver("simulated relay failure".to_string()));
        }
        if state.failing_commands > 0 {
            state.failing_commands -= 1;
            return Err(ActuationError::Driver("simulated transient relay failure".to_string()));
        }
        state.energized = energized;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frozen_model() -> EnclosureModel {
        // No wall-clock drift during tests.
        EnclosureModel { speedup: 0.0, ..EnclosureModel::default() }
    }

    #[tokio::test]
    async fn test_heating_raises_temperature() {
        let sim = SimulatedEnclosure::new(frozen_model());
        sim.set(true).await.unwrap();
        sim.advance(600.0);
        assert!(sim.read().await.unwrap() > 20.0);
    }

    #[tokio::test]
    async fn test_residual_heat_after_switch_off() {
        let sim = SimulatedEnclosure::new(frozen_model());
        sim.set(true).await.unwrap();
        sim.advance(300.0);
        sim.set(false).await.unwrap();
        let at_switch_off = sim.temperature();
        sim.advance(120.0);
        assert!(sim.temperature() > at_switch_off, "air should keep warming after switch-off");
    }

    #[tokio::test]
    async fn test_cools_towards_ambient() {
        let sim = SimulatedEnclosure::with_temperature(frozen_model(), 30.0);
        sim.advance(3600.0);
        let t = sim.temperature();
        assert!(t < 30.0 && t > 18.0);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let sim = SimulatedEnclosure::new(frozen_model());
        sim.fail_reads(1);
        assert!(sim.read().await.is_err());
        assert!(sim.read().await.is_ok());

        sim.fail_actuation(true);
        assert!(sim.set(true).await.is_err());
        assert!(!sim.is_energized());
        sim.fail_actuation(false);

        sim.fail_commands(1);
        assert!(sim.set(true).await.is_err());
        sim.set(true).await.unwrap();
        assert!(sim.is_energized());
    }
}
