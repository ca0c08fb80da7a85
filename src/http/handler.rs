//! `/health` handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::check::Status;
use crate::health::HealthCheck;

/// HTTP status code reported for an overall health status.
pub fn status_code_for(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::Warning => StatusCode::TOO_MANY_REQUESTS,
        Status::Critical => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Recompute health and return the full report.
pub async fn health_handler(State(health): State<HealthCheck>) -> impl IntoResponse {
    let report = health.report();
    tracing::debug!(status = %report.status, "Serving health report");
    (status_code_for(report.status), Json(report))
}
