//! Integration tests for the HTTP API

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt; // for .collect().await
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::util::ServiceExt; // for `oneshot`

use heatbox_rs::control::{ControlHandle, ControlTiming, Controller, ControlService};
use heatbox_rs::events::{EventSink, MemoryRecorder, Sample};
use heatbox_rs::hardware::simulated::EnclosureModel;
use heatbox_rs::hardware::SimulatedEnclosure;
use heatbox_rs::tuning::{Tuning, TuningStore};
use heatbox_rs::web::{create_router, AppState};

struct TestApp {
    app: Router,
    handle: ControlHandle,
    sim: SimulatedEnclosure,
    recorder: MemoryRecorder,
    _shutdown: Option<broadcast::Sender<()>>,
}

fn test_app(spawn: bool) -> TestApp {
    let sim = SimulatedEnclosure::with_temperature(EnclosureModel { speedup: 0.0, ..EnclosureModel::default() }, 19.5);
    let recorder = MemoryRecorder::new(1000);
    let tuning = TuningStore::new(Tuning::default());
    // One tick at startup, none during the test.
    let timing = ControlTiming { tick_interval: Duration::from_secs(3600), ..ControlTiming::default() };
    let controller = Controller::new(sim.clone(), sim.clone(), recorder.clone(), tuning, timing);
    let (service, handle) = ControlService::new(controller, 8);
    // Without a running service the handle reports the control task as gone.
    let shutdown = spawn.then(|| {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(service.run(shutdown_rx));
        shutdown_tx
    });
    let app = create_router(AppState { control: handle.clone(), history: Arc::new(recorder.clone()) });
    TestApp { app, handle, sim, recorder, _shutdown: shutdown }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn wait_for_first_tick(handle: &ControlHandle) {
    for _ in 0..100 {
        if handle.status().await.unwrap().last_tick.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("control loop never ticked");
}

#[tokio::test]
async fn test_status_defaults() {
    let t = test_app(true);
    let (status, json) = send(&t.app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["heaterState"], "Off");
    assert_eq!(json["controlState"], "Off");
    assert_eq!(json["automatic"], true);
    assert_eq!(json["tolerance"], 0.5);
    assert_eq!(json["heatingRate"], 100.0);
    assert!(json["targetTemperature"].is_null());
}

#[tokio::test]
async fn test_setpoint_round_trip() {
    let t = test_app(true);
    let (status, json) = send(&t.app, "POST", "/setpoint", Some(json!({ "temperature": 22.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["targetTemperature"], 22.0);

    let (_, json) = send(&t.app, "GET", "/status", None).await;
    assert_eq!(json["targetTemperature"], 22.0);

    let (status, json) = send(&t.app, "POST", "/setpoint", Some(json!({ "temperature": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["targetTemperature"].is_null());
}

#[tokio::test]
async fn test_tolerance_validation() {
    let t = test_app(true);
    let (status, json) = send(&t.app, "POST", "/tolerance", Some(json!({ "tolerance": -1.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, json) = send(&t.app, "POST", "/tolerance", Some(json!({ "tolerance": 0.25 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, json) = send(&t.app, "GET", "/status", None).await;
    assert_eq!(json["tolerance"], 0.25);
}

#[tokio::test]
async fn test_rates() {
    let t = test_app(true);
    let (status, _) = send(&t.app, "POST", "/heatingRate", Some(json!({ "heatingRate": 80.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&t.app, "POST", "/coolingRate", Some(json!({ "coolingRate": 0.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&t.app, "GET", "/status", None).await;
    assert_eq!(json["heatingRate"], 80.0);
    assert_eq!(json["coolingRate"], 600.0);
}

#[tokio::test]
async fn test_manual_heater_needs_stopped_control() {
    let t = test_app(true);
    let (status, _) = send(&t.app, "POST", "/heater", Some(json!({ "command": "on" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!t.sim.is_energized());

    let (status, json) = send(&t.app, "POST", "/control", Some(json!({ "command": "stop" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["automatic"], false);
    assert_eq!(json["controlState"], "Off");

    let (status, json) = send(&t.app, "POST", "/heater", Some(json!({ "command": "on" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["heaterState"], "On");
    assert!(t.sim.is_energized());

    let (status, _) = send(&t.app, "POST", "/heater", Some(json!({ "command": "blink" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&t.app, "POST", "/control", Some(json!({ "command": "start" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["automatic"], true);
}

#[tokio::test]
async fn test_temperature_after_first_tick() {
    let t = test_app(true);
    wait_for_first_tick(&t.handle).await;
    let (status, json) = send(&t.app, "GET", "/temperature", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["temperature"], 19.5);
}

#[tokio::test]
async fn test_temperature_unavailable_without_reading() {
    let t = test_app(true);
    t.sim.fail_reads(u32::MAX);
    wait_for_first_tick_or_fault(&t).await;
    let (status, _) = send(&t.app, "GET", "/temperature", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (_, json) = send(&t.app, "GET", "/status", None).await;
    assert!(json["sensorError"].is_string());
    assert!(json["temperature"].is_null());
}

async fn wait_for_first_tick_or_fault(t: &TestApp) {
    for _ in 0..100 {
        if !t.recorder.faults().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("control loop never attempted a read");
}

#[tokio::test]
async fn test_service_gone_is_503() {
    let t = test_app(false);
    let (status, json) = send(&t.app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_temperature_history() {
    let t = test_app(true);
    let now = Utc::now();
    for i in 0..20 {
        let sample = Sample {
            timestamp: now - chrono::Duration::minutes(20 - i),
            temperature: 20.0 + i as f64 * 0.1,
        };
        t.recorder.record_sample(&sample).await.unwrap();
    }
    let (status, json) = send(&t.app, "GET", "/temperatureHistory?timeRange=60&points=6", None).await;
    assert_eq!(status, StatusCode::OK);
    let points = json["temperatures"].as_array().unwrap();
    assert!(!points.is_empty());
    assert!(points.len() <= 6);
    assert!(points[0]["time"].is_string());
    assert!(points[0]["temperature"].is_number());

    let (status, json) = send(&t.app, "GET", "/temperatureHistory", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["temperatures"].is_array());
}

#[tokio::test]
async fn test_log_temperature_adds_to_history() {
    let t = test_app(true);
    let (status, json) = send(&t.app, "POST", "/logTemperature", Some(json!({ "temperature": 21.5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(t.recorder.samples().await.iter().any(|s| s.temperature == 21.5));

    let (status, _) = send(&t.app, "POST", "/logTemperature", Some(json!({ "temperature": "warm" }))).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_dashboard_log() {
    let t = test_app(true);
    let (status, _) = send(&t.app, "POST", "/log", Some(json!({ "message": "chart refresh failed" }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
