// src/control/service.rs - Runs the controller as one task; everything else talks to it over a channel
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use super::{Controller, ControllerError, ControllerStatus};
use crate::events::EventSink;
use crate::hardware::{HeaterActuator, TemperatureSource};
use crate::scheduler::{Clock, SystemClock, Ticker};

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

/// A request sent from a web handler to the control task.
#[derive(Debug)]
pub enum ControlRequest {
    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },
    /// `None` clears the target and switches the heater off.
    SetTarget {
        target: Option<f64>,
        respond_to: Reply<()>,
    },
    SetTolerance {
        value: f64,
        respond_to: Reply<()>,
    },
    SetHeatingRate {
        value: f64,
        respond_to: Reply<()>,
    },
    SetCoolingRate {
        value: f64,
        respond_to: Reply<()>,
    },
    /// Manual relay command; rejected while automatic control runs.
    SetHeater {
        energized: bool,
        respond_to: Reply<()>,
    },
    Start {
        respond_to: Reply<()>,
    },
    /// Answered only after the heater has been commanded off.
    Stop {
        respond_to: Reply<()>,
    },
}

/// Cloneable front door to a running [`ControlService`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlRequest,
    ) -> Result<T, ControllerError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(make(resp_tx))
            .await
            .map_err(|_| ControllerError::ServiceUnavailable)?;
        resp_rx.await.map_err(|_| ControllerError::ServiceUnavailable)
    }

    pub async fn status(&self) -> Result<ControllerStatus, ControllerError> {
        self.call(|respond_to| ControlRequest::GetStatus { respond_to }).await
    }

    pub async fn set_target(&self, target: Option<f64>) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::SetTarget { target, respond_to }).await?
    }

    pub async fn set_tolerance(&self, value: f64) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::SetTolerance { value, respond_to }).await?
    }

    pub async fn set_heating_rate(&self, value: f64) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::SetHeatingRate { value, respond_to }).await?
    }

    pub async fn set_cooling_rate(&self, value: f64) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::SetCoolingRate { value, respond_to }).await?
    }

    pub async fn set_heater(&self, energized: bool) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::SetHeater { energized, respond_to }).await?
    }

    pub async fn start(&self) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::Start { respond_to }).await?
    }

    pub async fn stop(&self) -> Result<(), ControllerError> {
        self.call(|respond_to| ControlRequest::Stop { respond_to }).await?
    }
}

/// Owns the controller and multiplexes ticks with requests, so a request
/// never runs in the middle of a tick.
pub struct ControlService<S, H, E> {
    controller: Controller<S, H, E>,
    requests: mpsc::Receiver<ControlRequest>,
    clock: Arc<dyn Clock>,
}

impl<S, H, E> ControlService<S, H, E>
where
    S: TemperatureSource,
    H: HeaterActuator,
    E: EventSink,
{
    pub fn new(controller: Controller<S, H, E>, buffer: usize) -> (Self, ControlHandle) {
        let (tx, requests) = mpsc::channel(buffer);
        let service = Self {
            controller,
            requests,
            clock: Arc::new(SystemClock),
        };
        (service, ControlHandle { tx })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tick until `shutdown` fires (or its sender is dropped), then switch
    /// the heater off and release it.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ControllerError> {
        let mut ticker = Ticker::new(self.controller.timing().tick_interval);
        let mut accepting = true;
        tracing::info!("Control loop running, tick every {:?}", ticker.period());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Control loop shutting down");
                    break;
                }
                // Ahead of requests, so a busy API cannot hold ticks off.
                _ = ticker.tick() => {
                    // Failures are logged and recorded by the controller itself.
                    let _ = self.controller.tick(self.clock.now()).await;
                }
                request = self.requests.recv(), if accepting => match request {
                    Some(request) => self.handle(request).await,
                    None => {
                        tracing::debug!("All control handles dropped; ticking without API");
                        accepting = false;
                    }
                },
            }
        }

        self.controller.shutdown().await
    }

    async fn handle(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::GetStatus { respond_to } => {
                let _ = respond_to.send(self.controller.status());
            }
            ControlRequest::SetTarget { target, respond_to } => {
                let _ = respond_to.send(self.controller.set_target(target).await);
            }
            ControlRequest::SetTolerance { value, respond_to } => {
                let _ = respond_to.send(self.controller.set_tolerance(value));
            }
            ControlRequest::SetHeatingRate { value, respond_to } => {
                let _ = respond_to.send(self.controller.set_heating_rate(value));
            }
            ControlRequest::SetCoolingRate { value, respond_to } => {
                let _ = respond_to.send(self.controller.set_cooling_rate(value));
            }
            ControlRequest::SetHeater { energized, respond_to } => {
                let _ = respond_to.send(self.controller.set_heater_manual(energized).await);
            }
            ControlRequest::Start { respond_to } => {
                let _ = respond_to.send(self.controller.start().await);
            }
            ControlRequest::Stop { respond_to } => {
                let _ = respond_to.send(self.controller.stop().await);
            }
        }
    }
}
