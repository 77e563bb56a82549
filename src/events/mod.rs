// src/events/mod.rs - Audit trail: samples, transitions and faults
pub mod history;
pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{Action, ControlState};

pub use jsonl::JsonLinesRecorder;
pub use memory::MemoryRecorder;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One temperature reading. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
}

/// Full decision context of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub timestamp: DateTime<Utc>,
    pub previous_state: ControlState,
    pub new_state: ControlState,
    pub action: Action,
    /// `None` only for events recorded outside a tick before any good reading.
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub upper_threshold: Option<f64>,
    pub lower_threshold: Option<f64>,
    pub predicted_temperature: Option<f64>,
    pub wait_remaining_sec: f64,
    pub heater_energized: bool,
}

impl TransitionEvent {
    pub fn is_state_change(&self) -> bool {
        self.previous_state != self.new_state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    Sensor,
    Actuation,
}

/// A tick that could not complete, or that took automatic control down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub timestamp: DateTime<Utc>,
    pub state: ControlState,
    pub kind: FaultKind,
    pub message: String,
}

/// Durable recorder for everything the controller decides.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record_sample(&self, sample: &Sample) -> Result<(), SinkError>;

    async fn record_transition(&self, event: &TransitionEvent) -> Result<(), SinkError>;

    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError>;

    /// Samples with `start <= timestamp < end`, oldest first.
    async fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, SinkError>;
}

#[async_trait]
impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    async fn record_sample(&self, sample: &Sample) -> Result<(), SinkError> {
        (**self).record_sample(sample).await
    }

    async fn record_transition(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        (**self).record_transition(event).await
    }

    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError> {
        (**self).record_fault(event).await
    }

    async fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, SinkError> {
        (**self).samples_between(start, end).await
    }
}
