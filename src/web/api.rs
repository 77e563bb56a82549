//! Defines the Axum API routes and handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};

use crate::control::{ControlHandle, ControllerError};
use crate::events::{history::bucket_average, EventSink, Sample};
use crate::web::models::{
    CommandRequest, ControlResponse, CoolingRateRequest, HeaterResponse, HeaterState,
    HeatingRateRequest, HistoryQuery, HistoryResponse, LogRequest, LogTemperatureRequest, MessageResponse,
    SetpointRequest, SetpointResponse, StatusResponse, TemperatureResponse, ToleranceRequest,
};

/// Longest history window the API will scan, in minutes.
const MAX_HISTORY_MINUTES: u32 = 7 * 24 * 60;
const MAX_HISTORY_POINTS: usize = 5000;

#[derive(Clone)]
pub struct AppState {
    pub control: ControlHandle,
    pub history: Arc<dyn EventSink>,
}

type ApiError = (StatusCode, Json<MessageResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_status(e: &ControllerError) -> StatusCode {
    match e {
        ControllerError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        ControllerError::ManualOverrideRejected => StatusCode::CONFLICT,
        ControllerError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ControllerError::Sensor(_) | ControllerError::Actuation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(MessageResponse { success: false, message: message.into() }))
}

impl From<ControllerError> for (StatusCode, Json<MessageResponse>) {
    fn from(e: ControllerError) -> Self {
        api_error(error_status(&e), e.to_string())
    }
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/temperature", get(get_temperature))
        .route("/temperatureHistory", get(get_history))
        .route("/logTemperature", post(log_temperature))
        .route("/setpoint", post(set_setpoint))
        .route("/tolerance", post(set_tolerance))
        .route("/heatingRate", post(set_heating_rate))
        .route("/coolingRate", post(set_cooling_rate))
        .route("/heater", post(set_heater))
        .route("/control", post(set_control))
        .route("/log", post(post_log))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let status = state.control.status().await?;
    Ok(Json(status.into()))
}

/// Last good reading; 503 until the first one arrives.
async fn get_temperature(State(state): State<AppState>) -> ApiResult<TemperatureResponse> {
    let status = state.control.status().await?;
    match status.temperature {
        Some(temperature) => Ok(Json(TemperatureResponse { temperature })),
        None => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "no temperature reading yet")),
    }
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let minutes = query.time_range.min(MAX_HISTORY_MINUTES);
    let points = query.points.min(MAX_HISTORY_POINTS);
    let end = Utc::now();
    let start = end - Duration::minutes(minutes as i64);
    let samples = state.history.samples_between(start, end).await.map_err(|e| {
        tracing::error!("Failed to load temperature history: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "history unavailable")
    })?;
    Ok(Json(HistoryResponse { temperatures: bucket_average(&samples, start, end, points) }))
}

async fn log_temperature(
    State(state): State<AppState>,
    Json(payload): Json<LogTemperatureRequest>,
) -> ApiResult<MessageResponse> {
    let sample = Sample { timestamp: Utc::now(), temperature: payload.temperature };
    state.history.record_sample(&sample).await.map_err(|e| {
        tracing::error!("Failed to log temperature: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error logging temperature")
    })?;
    Ok(Json(MessageResponse { success: true, message: "Temperature logged".to_string() }))
}

async fn set_setpoint(
    State(state): State<AppState>,
    Json(payload): Json<SetpointRequest>,
) -> ApiResult<SetpointResponse> {
    state.control.set_target(payload.temperature).await?;
    Ok(Json(SetpointResponse { success: true, target_temperature: payload.temperature }))
}

async fn set_tolerance(
    State(state): State<AppState>,
    Json(payload): Json<ToleranceRequest>,
) -> ApiResult<MessageResponse> {
    state.control.set_tolerance(payload.tolerance).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Tolerance set to {}°C", payload.tolerance),
    }))
}

async fn set_heating_rate(
    State(state): State<AppState>,
    Json(payload): Json<HeatingRateRequest>,
) -> ApiResult<MessageResponse> {
    state.control.set_heating_rate(payload.heating_rate).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Heating rate set to {} s/°C", payload.heating_rate),
    }))
}

async fn set_cooling_rate(
    State(state): State<AppState>,
    Json(payload): Json<CoolingRateRequest>,
) -> ApiResult<MessageResponse> {
    state.control.set_cooling_rate(payload.cooling_rate).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Cooling rate set to {} s/°C", payload.cooling_rate),
    }))
}

/// Manual relay override; only honoured while automatic control is stopped.
async fn set_heater(
    State(state): State<AppState>,
    Json(payload): Json<CommandRequest>,
) -> ApiResult<HeaterResponse> {
    let energized = match payload.command.to_ascii_lowercase().as_str() {
        "on" => true,
        "off" => false,
        other => {
            return Err(api_error(StatusCode::BAD_REQUEST, format!("unknown heater command '{}'", other)));
        }
    };
    state.control.set_heater(energized).await?;
    Ok(Json(HeaterResponse { heater_state: HeaterState::from(energized) }))
}

async fn set_control(
    State(state): State<AppState>,
    Json(payload): Json<CommandRequest>,
) -> ApiResult<ControlResponse> {
    match payload.command.to_ascii_lowercase().as_str() {
        "start" => state.control.start().await?,
        "stop" => state.control.stop().await?,
        other => {
            return Err(api_error(StatusCode::BAD_REQUEST, format!("unknown control command '{}'", other)));
        }
    }
    let status = state.control.status().await?;
    Ok(Json(ControlResponse { control_state: status.control_state, automatic: status.automatic }))
}

/// Dashboard diagnostics end up in the service log.
async fn post_log(Json(payload): Json<LogRequest>) -> StatusCode {
    tracing::info!(target: "dashboard", "{}", payload.message);
    StatusCode::NO_CONTENT
}
