// src/control/controller.rs - Owns the control context and runs one tick at a time
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::context::ControllerContext;
use super::transition::decide;
use super::{Action, ControlState, ControlTiming, ControllerError};
use crate::events::{EventSink, FaultEvent, FaultKind, Sample, TransitionEvent};
use crate::hardware::{ActuationError, HeaterActuator, SensorError, TemperatureSource};
use crate::tuning::TuningStore;

/// Point-in-time view of the controller for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub heater_energized: bool,
    pub control_state: ControlState,
    pub automatic: bool,
    pub target_temperature: Option<f64>,
    pub tolerance: f64,
    pub heating_rate: f64,
    pub cooling_rate: f64,
    /// Last good reading.
    pub temperature: Option<f64>,
    pub sensor_error: Option<String>,
    pub wait_remaining_sec: f64,
    pub last_tick: Option<DateTime<Utc>>,
    pub sink_failures: u64,
}

pub struct Controller<S, H, E> {
    source: S,
    heater: H,
    sink: E,
    tuning: TuningStore,
    timing: ControlTiming,
    ctx: ControllerContext,
    sink_failures: u64,
}

impl<S, H, E> Controller<S, H, E>
where
    S: TemperatureSource,
    H: HeaterActuator,
    E: EventSink,
{
    pub fn new(source: S, heater: H, sink: E, tuning: TuningStore, timing: ControlTiming) -> Self {
        let ctx = ControllerContext::new(&tuning.snapshot());
        Self {
            source,
            heater,
            sink,
            tuning,
            timing,
            ctx,
            sink_failures: 0,
        }
    }

    pub fn context(&self) -> &ControllerContext {
        &self.ctx
    }

    pub fn timing(&self) -> &ControlTiming {
        &self.timing
    }

    pub fn tuning(&self) -> &TuningStore {
        &self.tuning
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            heater_energized: self.ctx.heater_energized,
            control_state: self.ctx.state,
            automatic: self.ctx.automatic,
            target_temperature: self.ctx.target_temperature,
            tolerance: self.ctx.tolerance,
            heating_rate: self.ctx.heating_rate_sec_per_degree,
            cooling_rate: self.ctx.cooling_rate_sec_per_degree,
            temperature: self.ctx.last_temperature,
            sensor_error: self.ctx.sensor_error.clone(),
            wait_remaining_sec: self.ctx.wait_remaining_sec,
            last_tick: self.ctx.last_tick_at,
            sink_failures: self.sink_failures,
        }
    }

    /// Set or clear the target. Clearing forces `Off` and switches the heater off;
    /// setting a target while `Off` arms the machine for the next tick.
    pub async fn set_target(&mut self, target: Option<f64>) -> Result<(), ControllerError> {
        self.tuning.set_target(target)?;
        self.ctx.target_temperature = target;
        match target {
            Some(t) => {
                tracing::info!("Target temperature set to {:.1}°C (state {})", t, self.ctx.state);
                Ok(())
            }
            None => {
                tracing::info!("Target temperature cleared, heater off");
                let previous = self.ctx.state;
                self.ctx.reset_to_off();
                self.switch_off(previous, Action::TargetCleared).await
            }
        }
    }

    pub fn set_tolerance(&mut self, value: f64) -> Result<(), ControllerError> {
        self.tuning.set_tolerance(value)?;
        self.ctx.tolerance = value;
        tracing::info!("Tolerance set to {}°C", value);
        Ok(())
    }

    pub fn set_heating_rate(&mut self, value: f64) -> Result<(), ControllerError> {
        self.tuning.set_heating_rate(value)?;
        self.ctx.heating_rate_sec_per_degree = value;
        tracing::info!("Heating rate set to {} s/°C", value);
        Ok(())
    }

    pub fn set_cooling_rate(&mut self, value: f64) -> Result<(), ControllerError> {
        self.tuning.set_cooling_rate(value)?;
        self.ctx.cooling_rate_sec_per_degree = value;
        tracing::info!("Cooling rate set to {} s/°C", value);
        Ok(())
    }

    /// Resume automatic control. The next tick arms the machine if a target is set.
    /// A heater left on by a manual command is switched off first, so automatic
    /// control always resumes from a de-energized `Off`.
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        if self.ctx.automatic {
            return Ok(());
        }
        if self.ctx.heater_energized {
            self.switch_off(self.ctx.state, Action::Resumed).await?;
        }
        self.ctx.automatic = true;
        tracing::info!("Automatic control started");
        Ok(())
    }

    /// Stop automatic control. Returns once the heater has been commanded off,
    /// retrying once if the relay refused; no later tick will energize it until
    /// `start` is called.
    pub async fn stop(&mut self) -> Result<(), ControllerError> {
        let previous = self.ctx.state;
        self.ctx.automatic = false;
        self.ctx.reset_to_off();
        tracing::info!("Automatic control stopped");
        self.switch_off(previous, Action::Stopped).await
    }

    /// Manual relay override, only while automatic control is stopped.
    pub async fn set_heater_manual(&mut self, energized: bool) -> Result<(), ControllerError> {
        if self.ctx.automatic {
            return Err(ControllerError::ManualOverrideRejected);
        }
        self.actuate(energized).await?;
        self.ctx.heater_energized = energized;
        tracing::info!("Heater manually switched {}", if energized { "on" } else { "off" });
        Ok(())
    }

    /// Stop control and hand the relay back.
    pub async fn shutdown(&mut self) -> Result<(), ControllerError> {
        let stopped = self.stop().await;
        // Release even if the stop command failed; release drives the line off too.
        let released = self.heater.release().await;
        stopped?;
        released?;
        tracing::info!("Controller shut down, heater released");
        Ok(())
    }

    /// Read one sample, run the transition table and apply the result.
    ///
    /// A failed read leaves state and heater untouched and is recorded as a
    /// fault. A failed relay command stops automatic control.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TransitionEvent, ControllerError> {
        let temperature = match self.read_sample().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Temperature read failed in state {}: {}", self.ctx.state, e);
                self.ctx.sensor_error = Some(e.to_string());
                let fault = FaultEvent {
                    timestamp: now,
                    state: self.ctx.state,
                    kind: FaultKind::Sensor,
                    message: e.to_string(),
                };
                self.record_fault(&fault).await;
                return Err(e.into());
            }
        };
        self.ctx.sensor_error = None;
        self.ctx.last_temperature = Some(temperature);
        self.record_sample(&Sample { timestamp: now, temperature }).await;

        self.ctx.apply_tuning(&self.tuning.snapshot());
        let elapsed = self.elapsed_secs(now);
        let decision = decide(&self.ctx, temperature, elapsed, &self.timing);
        let previous = self.ctx.state;

        if let Some(energized) = decision.heater {
            if let Err(e) = self.actuate(energized).await {
                self.ctx.last_tick_at = Some(now);
                return Err(self.abort_on_actuation_failure(now, previous, Some(temperature), e).await);
            }
            self.ctx.heater_energized = energized;
        }
        self.ctx.state = decision.next_state;
        self.ctx.wait_remaining_sec = decision.wait_remaining_sec;
        self.ctx.last_tick_at = Some(now);

        let event = TransitionEvent {
            timestamp: now,
            previous_state: previous,
            new_state: decision.next_state,
            action: decision.action,
            current_temperature: Some(temperature),
            target_temperature: self.ctx.target_temperature,
            upper_threshold: decision.upper_threshold,
            lower_threshold: decision.lower_threshold,
            predicted_temperature: decision.predicted_temperature,
            wait_remaining_sec: decision.wait_remaining_sec,
            heater_energized: self.ctx.heater_energized,
        };
        self.log_transition(&event);
        self.record_transition(&event).await;
        Ok(event)
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        match self.ctx.last_tick_at {
            Some(previous) if now > previous => (now - previous).num_milliseconds() as f64 / 1000.0,
            _ => self.timing.tick_interval.as_secs_f64(),
        }
    }

    async fn read_sample(&self) -> Result<f64, SensorError> {
        let limit = self.timing.sensor_timeout;
        let reading = tokio::time::timeout(limit, self.source.read())
            .await
            .map_err(|_| SensorError::Timeout(limit.as_millis() as u64))??;
        if !reading.is_finite() {
            return Err(SensorError::Malformed(format!("non-finite reading {}", reading)));
        }
        Ok(reading)
    }

    async fn actuate(&self, energized: bool) -> Result<(), ActuationError> {
        let limit = self.timing.actuator_timeout;
        tokio::time::timeout(limit, self.heater.set(energized))
            .await
            .map_err(|_| ActuationError::Timeout(limit.as_millis() as u64))?
    }

    /// Switch the heater off outside a tick (stop, target cleared, resume) and
    /// record why. A refused command is handled like a failed tick command.
    async fn switch_off(&mut self, previous: ControlState, action: Action) -> Result<(), ControllerError> {
        let now = Utc::now();
        if let Err(e) = self.actuate(false).await {
            let temperature = self.ctx.last_temperature;
            return Err(self.abort_on_actuation_failure(now, previous, temperature, e).await);
        }
        self.ctx.heater_energized = false;
        let event = self.out_of_tick_event(now, previous, action);
        self.log_transition(&event);
        self.record_transition(&event).await;
        Ok(())
    }

    /// The relay did not obey: drop out of automatic mode, retry off once, report.
    async fn abort_on_actuation_failure(
        &mut self,
        now: DateTime<Utc>,
        previous: ControlState,
        temperature: Option<f64>,
        error: ActuationError,
    ) -> ControllerError {
        tracing::error!("Heater actuation failed in state {}: {}; stopping automatic control", previous, error);
        self.ctx.automatic = false;
        self.ctx.reset_to_off();
        match self.actuate(false).await {
            Ok(()) => self.ctx.heater_energized = false,
            Err(retry) => tracing::error!("Retrying heater off also failed: {}", retry),
        }

        let fault = FaultEvent {
            timestamp: now,
            state: previous,
            kind: FaultKind::Actuation,
            message: error.to_string(),
        };
        self.record_fault(&fault).await;
        let mut event = self.out_of_tick_event(now, previous, Action::ActuationFailed);
        event.current_temperature = temperature;
        self.log_transition(&event);
        self.record_transition(&event).await;
        ControllerError::Actuation(error)
    }

    fn out_of_tick_event(&self, now: DateTime<Utc>, previous: ControlState, action: Action) -> TransitionEvent {
        let thresholds = self.ctx.thresholds();
        TransitionEvent {
            timestamp: now,
            previous_state: previous,
            new_state: self.ctx.state,
            action,
            current_temperature: self.ctx.last_temperature,
            target_temperature: self.ctx.target_temperature,
            upper_threshold: thresholds.map(|(_, upper)| upper),
            lower_threshold: thresholds.map(|(lower, _)| lower),
            predicted_temperature: None,
            wait_remaining_sec: self.ctx.wait_remaining_sec,
            heater_energized: self.ctx.heater_energized,
        }
    }

    fn log_transition(&self, event: &TransitionEvent) {
        let temperature = event.current_temperature.unwrap_or(f64::NAN);
        match event.action {
            Action::Anomaly => tracing::warn!(
                "No transition matched: state={} T={:.2} target={:?} wait={:.0}s automatic={}",
                event.previous_state,
                temperature,
                event.target_temperature,
                event.wait_remaining_sec,
                self.ctx.automatic
            ),
            _ if event.is_state_change() => tracing::info!(
                "{} -> {}: {} (T={:.2}, predicted={:?}, band={:?}..{:?}, heater={})",
                event.previous_state,
                event.new_state,
                event.action,
                temperature,
                event.predicted_temperature,
                event.lower_threshold,
                event.upper_threshold,
                if event.heater_energized { "on" } else { "off" }
            ),
            _ => tracing::debug!(
                "{}: {} (T={:.2}, wait={:.0}s, heater={})",
                event.new_state,
                event.action,
                temperature,
                event.wait_remaining_sec,
                if event.heater_energized { "on" } else { "off" }
            ),
        }
    }

    async fn record_sample(&mut self, sample: &Sample) {
        if let Err(e) = self.sink.record_sample(sample).await {
            self.sink_failures += 1;
            tracing::warn!("Failed to record sample: {}", e);
        }
    }

    async fn record_transition(&mut self, event: &TransitionEvent) {
        if let Err(e) = self.sink.record_transition(event).await {
            self.sink_failures += 1;
            tracing::warn!("Failed to record transition: {}", e);
        }
    }

    async fn record_fault(&mut self, event: &FaultEvent) {
        if let Err(e) = self.sink.record_fault(event).await {
            self.sink_failures += 1;
            tracing::warn!("Failed to record fault: {}", e);
        }
    }
}
