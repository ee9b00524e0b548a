//! Pipeline run endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use sentinel_core::{orchestrator::SchedulerStatus, PipelineError};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct PipelineErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Scheduler state plus the last run summary.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler().status().await)
}

/// Start a run in the background unless one is already in flight.
pub async fn trigger_run(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, Json<PipelineErrorResponse>)> {
    match state.scheduler().trigger() {
        Ok(()) => {
            info!("Pipeline run triggered via API");
            Ok((
                StatusCode::ACCEPTED,
                Json(MessageResponse {
                    message: "Pipeline run started".to_string(),
                }),
            ))
        }
        Err(e @ PipelineError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(PipelineErrorResponse {
                error: e.to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(PipelineErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
