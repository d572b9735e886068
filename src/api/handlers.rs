//! HTTP handlers for the optimization API.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::state::AppState;
use crate::engines::report::RunReport;
use crate::error::{FeedmixError, Result};
use crate::services::{RunRequest, RunStatus};
use crate::types::FeedItem;

/// Error body: `{"error": <kind>, "message": <text>}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl FeedmixError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FeedmixError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FeedmixError::AlreadyRunning | FeedmixError::NotRunning => StatusCode::CONFLICT,
            FeedmixError::NotReady => StatusCode::ACCEPTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FeedmixError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct RequirementsView {
    pub prdd: f64,
    pub mp: f64,
}

#[derive(Debug, Serialize)]
pub struct ParametersView {
    pub pop_size: usize,
    pub max_gen: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct ConstraintsView {
    pub gen_min: f64,
    pub gene_bound_factor: f64,
    pub fallback_gene_max: f64,
}

/// Response of `GET /api/config`.
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub feeds: Vec<FeedItem>,
    pub requirements: RequirementsView,
    pub parameters: ParametersView,
    pub constraints: ConstraintsView,
}

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub status: &'static str,
    pub run_id: u64,
    pub total_gen: usize,
}

/// An empty body means "use every default".
fn parse_run_request(body: &Bytes) -> Result<RunRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| FeedmixError::InvalidInput(format!("malformed request body: {}", e)))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let defaults = state.orchestrator.get_defaults();
    let parameters = defaults.parameters;

    Json(ConfigResponse {
        feeds: defaults.feeds,
        requirements: RequirementsView {
            prdd: defaults.requirement.required_prdd,
            mp: defaults.requirement.required_mp,
        },
        parameters: ParametersView {
            pop_size: parameters.population_size,
            max_gen: parameters.max_generations,
            crossover_rate: parameters.crossover_rate,
            mutation_rate: parameters.mutation_rate,
        },
        constraints: ConstraintsView {
            gen_min: 0.0,
            gene_bound_factor: parameters.gene_bound_factor,
            fallback_gene_max: parameters.fallback_gene_max,
        },
    })
}

pub async fn start_run(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<RunStarted>> {
    let request = parse_run_request(&body)?;
    let ticket = state.orchestrator.start(request)?;

    Ok(Json(RunStarted {
        status: "started",
        run_id: ticket.run_id,
        total_gen: ticket.total_gen,
    }))
}

pub async fn progress(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let events = state
        .orchestrator
        .subscribe_progress()
        .map(|event| Event::default().json_data(event));

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn get_result(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.poll_result() {
        RunStatus::Idle => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No result available" })),
        )
            .into_response(),
        RunStatus::Pending => (StatusCode::ACCEPTED, Json(json!({ "status": "running" }))).into_response(),
        RunStatus::Ready(report) => (StatusCode::OK, Json(report.as_ref())).into_response(),
        RunStatus::Failed(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": message })),
        )
            .into_response(),
    }
}

pub async fn cancel_run(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let run_id = state.orchestrator.cancel()?;
    Ok(Json(json!({ "status": "cancelling", "run_id": run_id })))
}

/// Runs to completion and returns the report in the response.
pub async fn optimize(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<RunReport>> {
    let request = parse_run_request(&body)?;
    let ticket = state.orchestrator.start(request)?;
    let report = state.orchestrator.wait_for(ticket.run_id).await?;
    Ok(Json(report.as_ref().clone()))
}
