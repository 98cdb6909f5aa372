// Device and event query HTTP routes

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use sensorlog_core::{Device, EventStore, QueryRequest};
use std::sync::Arc;

use crate::common::error_status;
use crate::services::{DeviceService, EventService};

/// App state for device routes
#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<DeviceService>,
    pub events: Arc<EventService>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_services(DeviceService::new(store.clone()), EventService::new(store))
    }

    pub fn with_services(devices: DeviceService, events: EventService) -> Self {
        Self {
            devices: Arc::new(devices),
            events: Arc::new(events),
        }
    }
}

/// Create device routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_devices))
        .route("/v1/devices", get(list_devices))
        .route("/v1/devices/:device_id", get(get_device))
        .route("/v1/devices/:device_id/events/search", post(search_events))
        .route("/v1/devices/:device_id/events/count", post(count_events))
        .with_state(state)
}

/// GET /v1/devices - List all registered devices
#[utoipa::path(
    get,
    path = "/v1/devices",
    responses(
        (status = 200, description = "List of devices", body = Vec<Device>),
        (status = 500, description = "Internal server error")
    ),
    tag = "devices"
)]
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<Device>>, StatusCode> {
    let devices = state
        .devices
        .list()
        .await
        .map_err(|e| error_status("Failed to list devices", &e))?;

    Ok(Json(devices))
}

/// GET /v1/devices/{device_id} - Get device by ID
#[utoipa::path(
    get,
    path = "/v1/devices/{device_id}",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Device found", body = Device),
        (status = 404, description = "Device not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "devices"
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, StatusCode> {
    let device = state
        .devices
        .get(&device_id)
        .await
        .map_err(|e| error_status("Failed to get device", &e))?;

    Ok(Json(device))
}

/// POST /v1/devices/{device_id}/events/search - Event timestamps in a window
#[utoipa::path(
    post,
    path = "/v1/devices/{device_id}/events/search",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    request_body(content = QueryRequest, description = "Time window and pagination; empty body uses the last day"),
    responses(
        (status = 200, description = "Matching event timestamps (RFC 3339, UTC)", body = Vec<String>),
        (status = 400, description = "Malformed query body"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn search_events(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<Json<Vec<String>>, StatusCode> {
    let request =
        QueryRequest::from_body(&body).map_err(|e| error_status("Invalid search query", &e))?;

    let timestamps = state
        .events
        .search(&device_id, &request)
        .await
        .map_err(|e| error_status("Failed to search events", &e))?;

    Ok(Json(
        timestamps
            .iter()
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .collect(),
    ))
}

/// POST /v1/devices/{device_id}/events/count - Number of events in a window
#[utoipa::path(
    post,
    path = "/v1/devices/{device_id}/events/count",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    request_body(content = QueryRequest, description = "Time window; limit and skip are ignored"),
    responses(
        (status = 200, description = "Number of matching events", body = u64),
        (status = 400, description = "Malformed query body"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn count_events(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<Json<u64>, StatusCode> {
    let request =
        QueryRequest::from_body(&body).map_err(|e| error_status("Invalid count query", &e))?;

    let count = state
        .events
        .count(&device_id, &request)
        .await
        .map_err(|e| error_status("Failed to count events", &e))?;

    Ok(Json(count))
}
