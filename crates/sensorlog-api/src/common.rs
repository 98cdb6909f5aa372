// Shared helpers for HTTP handlers

use axum::http::StatusCode;
use sensorlog_core::SensorError;

/// Map a service error onto the HTTP status returned to the caller.
/// Store faults are logged here; the other cases are caller errors.
pub fn error_status(context: &str, err: &SensorError) -> StatusCode {
    match err {
        SensorError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        SensorError::InvalidQuery(_) | SensorError::Decode(_) => {
            tracing::debug!(error = %err, "{}: bad request", context);
            StatusCode::BAD_REQUEST
        }
        SensorError::Store(_) => {
            tracing::error!(error = %err, "{}", context);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
