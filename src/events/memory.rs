// src/events/memory.rs - Bounded in-memory recorder
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{EventSink, FaultEvent, Sample, SinkError, TransitionEvent};

#[derive(Debug, Default)]
struct Buffers {
    samples: VecDeque<Sample>,
    transitions: VecDeque<TransitionEvent>,
    faults: VecDeque<FaultEvent>,
}

/// Ring buffers that keep the most recent `capacity` entries of each kind.
#[derive(Debug, Clone)]
pub struct MemoryRecorder {
    inner: Arc<Mutex<Buffers>>,
    capacity: usize,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    buf.push_back(item);
    while buf.len() > capacity {
        buf.pop_front();
    }
}

impl MemoryRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffers::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn samples(&self) -> Vec<Sample> {
        self.inner.lock().await.samples.iter().copied().collect()
    }

    pub async fn transitions(&self) -> Vec<TransitionEvent> {
        self.inner.lock().await.transitions.iter().cloned().collect()
    }

    pub async fn faults(&self) -> Vec<FaultEvent> {
        self.inner.lock().await.faults.iter().cloned().collect()
    }

    pub async fn last_transition(&self) -> Option<TransitionEvent> {
        self.inner.lock().await.transitions.back().cloned()
    }
}

#[async_trait]
impl EventSink for MemoryRecorder {
    async fn record_sample(&self, sample: &Sample) -> Result<(), SinkError> {
        let mut buffers = self.inner.lock().await;
        push_bounded(&mut buffers.samples, *sample, self.capacity);
        Ok(())
    }

    async fn record_transition(&self, event: &TransitionEvent) -> Result<(), SinkError> {
        let mut buffers = self.inner.lock().await;
        push_bounded(&mut buffers.transitions, event.clone(), self.capacity);
        Ok(())
    }

    async fn record_fault(&self, event: &FaultEvent) -> Result<(), SinkError> {
        let mut buffers = self.inner.lock().await;
        push_bounded(&mut buffers.faults, event.clone(), self.capacity);
        Ok(())
    }

    async fn samples_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, SinkError> {
        let buffers = self.inner.lock().await;
        Ok(buffers
            .samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp < end)
            .copied()
            .collect())
    }
}
