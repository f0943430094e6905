//! HTTP surface for the incident pipeline.
//!
//! Endpoints:
//! - `GET  /health`                  - fixed healthy status, no side effects
//! - `POST /webhook/incident-alert`  - enqueue a pipeline run, return immediately
//! - `POST /run`                     - run the pipeline, block for the result
//!
//! Both POST endpoints take `{"log_content": string}`. Pipeline runs are
//! blocking work behind the pipeline's own mutex, so handlers push them onto
//! the blocking pool instead of the async executor.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use opsmind_core::domain::ToolResponse;
use opsmind_core::error::AppError;
use opsmind_core::pipeline::Pipeline;

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub log_content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AcceptedResponse {
    status: &'static str,
    message: &'static str,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/incident-alert", post(webhook_incident_alert))
        .route("/run", post(run_sync))
        .with_state(pipeline)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Fire-and-forget trigger. Failures are logged, not reported to the
/// caller; the webhook producer has nothing useful to do with them.
async fn webhook_incident_alert(
    State(pipeline): State<Arc<Pipeline>>,
    Json(payload): Json<RunRequest>,
) -> Json<AcceptedResponse> {
    tokio::task::spawn_blocking(move || {
        if let Err(err) = pipeline.run(&payload.log_content) {
            log::error!("background incident automation failed: {err}");
        }
    });
    Json(AcceptedResponse {
        status: "accepted",
        message: "Incident automation triggered in the background",
    })
}

async fn run_sync(
    State(pipeline): State<Arc<Pipeline>>,
    Json(payload): Json<RunRequest>,
) -> Response {
    let outcome =
        tokio::task::spawn_blocking(move || pipeline.run(&payload.log_content)).await;

    match outcome {
        Ok(Ok(outcome)) => Json(ToolResponse::ok(outcome)).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => error_response(
            &AppError::internal("Pipeline task aborted").with_details(join_err.to_string()),
        ),
    }
}

fn error_response(err: &AppError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ToolResponse::<()>::err(err)),
    )
        .into_response()
}

/// Bind and serve until the process is stopped.
pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> Result<(), AppError> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::new("SERVER_BIND_FAILED", "Failed to bind the HTTP listener")
            .with_details(format!("addr={addr}: {e}"))
    })?;
    log::info!("listening on {addr}");

    axum::serve(listener, router(pipeline)).await.map_err(|e| {
        AppError::new("SERVER_FAILED", "HTTP server stopped unexpectedly")
            .with_details(e.to_string())
    })
}
