// src/main.rs - heatbox entry point: load config, wire hardware, serve the API
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;

use heatbox_rs::config::{self, Config, HeaterKind, RecorderKind, SensorKind};
use heatbox_rs::control::{ControlService, Controller};
use heatbox_rs::events::{EventSink, JsonLinesRecorder, MemoryRecorder};
use heatbox_rs::hardware::{
    Ds18b20Sensor, GpioRelay, HeaterActuator, SimulatedEnclosure, TemperatureSource,
};
use heatbox_rs::tuning::TuningStore;
use heatbox_rs::web;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Parser)]
#[command(name = "heatbox", version, about = "Inertia-aware enclosure heater controller")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "heatbox.toml")]
    config: String,
    /// Run against the simulated enclosure regardless of the config
    #[arg(long)]
    simulate: bool,
    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

async fn build_hardware(
    config: &Config,
) -> Result<(Arc<dyn TemperatureSource>, Arc<dyn HeaterActuator>), BoxError> {
    // Sensor and relay share one enclosure when both are simulated.
    let mut enclosure: Option<SimulatedEnclosure> = None;
    let mut simulated = || {
        enclosure
            .get_or_insert_with(|| {
                let start = config.simulation.start_temperature.unwrap_or(config.simulation.ambient);
                SimulatedEnclosure::with_temperature(config.enclosure_model(), start)
            })
            .clone()
    };

    let source: Arc<dyn TemperatureSource> = match config.sensor.kind {
        SensorKind::Simulated => Arc::new(simulated()),
        SensorKind::Ds18b20 => {
            tracing::info!("DS18B20 sensor {} under {}", config.sensor.sensor_id, config.sensor.w1_base.display());
            Arc::new(Ds18b20Sensor::new(&config.sensor.w1_base, &config.sensor.sensor_id))
        }
    };
    let heater: Arc<dyn HeaterActuator> = match config.heater.kind {
        HeaterKind::Simulated => Arc::new(simulated()),
        HeaterKind::Gpio => {
            let relay = GpioRelay::new(&config.heater.gpio_root, config.heater.pin, config.heater.active_low);
            relay.init().await?;
            Arc::new(relay)
        }
    };
    Ok((source, heater))
}

async fn build_recorder(config: &Config) -> Result<Arc<dyn EventSink>, BoxError> {
    Ok(match config.recorder.kind {
        RecorderKind::Memory => {
            tracing::info!("Recording events in memory (capacity {})", config.recorder.capacity);
            Arc::new(MemoryRecorder::new(config.recorder.capacity))
        }
        RecorderKind::Jsonl => Arc::new(JsonLinesRecorder::open(&config.recorder.data_dir).await?),
    })
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::info!("Starting heatbox");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = if Path::new(&args.config).exists() {
        tracing::info!("Loading configuration from: {}", args.config);
        config::load_config(&args.config).map_err(|e| {
            tracing::error!("Failed to load config from '{}': {}", args.config, e);
            Box::new(e) as BoxError
        })?
    } else {
        tracing::warn!("Config file '{}' not found, using defaults", args.config);
        Config::default()
    };
    if args.simulate {
        config.force_simulation();
    }
    config.validate()?;

    let tuning = TuningStore::new(config.tuning()?);
    tracing::info!(
        "Target: {:?}, tolerance {}°C, heating rate {} s/°C, tick every {}s",
        config.control.target,
        config.control.tolerance,
        config.control.heating_rate,
        config.control.tick_interval_secs
    );

    // Bind before the relay is taken.
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    let (source, heater) = build_hardware(&config).await?;
    let recorder = build_recorder(&config).await?;
    let controller = Controller::new(source, heater, recorder.clone(), tuning, config.timing());

    // Set up a channel between the Axum handlers and the control task.
    let (service, handle) = ControlService::new(controller, 32);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let control_task = tokio::spawn(service.run(shutdown_rx));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                let _ = signal_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let app = web::create_router(web::AppState { control: handle, history: recorder });
    tracing::info!("Web API listening on http://{}", config.server.bind);

    let mut server_shutdown = shutdown_tx.subscribe();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.recv().await;
        })
        .await;

    // The heater must be off before the process exits, even if the server failed.
    let _ = shutdown_tx.send(());
    match control_task.await {
        Ok(Ok(())) => tracing::info!("Heater released, bye"),
        Ok(Err(e)) => tracing::error!("Control shutdown failed, check the relay: {}", e),
        Err(e) => tracing::error!("Control task panicked: {}", e),
    }
    served?;
    Ok(())
}
