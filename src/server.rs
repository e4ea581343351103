//! HTTP trigger surface for external schedulers.
//!
//! `GET /jobs/new-projects` and `GET /jobs/countdown` run the job once and
//! answer `{"success": true, ...report}`. Anything escaping the job,
//! including a panic, becomes a 500 with a fixed body.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::jobs::{Job, JobError, JobSet};

#[derive(Clone)]
pub struct AppState {
    pub new_projects: Arc<dyn Job>,
    pub countdown: Arc<dyn Job>,
}

impl From<JobSet> for AppState {
    fn from(jobs: JobSet) -> Self {
        Self {
            new_projects: jobs.new_projects,
            countdown: jobs.countdown,
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("job {job} failed: {source}")]
    Job {
        job: &'static str,
        #[source]
        source: JobError,
    },
    #[error("job {job} aborted: {reason}")]
    Aborted { job: &'static str, reason: String },
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        error!(err = %self, "trigger failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Internal server error" })),
        )
            .into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs/new-projects", get(trigger_new_projects))
        .route("/jobs/countdown", get(trigger_countdown))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn trigger_new_projects(State(state): State<AppState>) -> Result<Json<Value>, TriggerError> {
    run_job(state.new_projects).await
}

async fn trigger_countdown(State(state): State<AppState>) -> Result<Json<Value>, TriggerError> {
    run_job(state.countdown).await
}

async fn run_job(job: Arc<dyn Job>) -> Result<Json<Value>, TriggerError> {
    let name = job.name();
    let outcome = tokio::spawn(async move { job.run_once().await }).await;
    let report = match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(source)) => return Err(TriggerError::Job { job: name, source }),
        Err(join) => {
            return Err(TriggerError::Aborted {
                job: name,
                reason: join.to_string(),
            })
        }
    };

    let mut body = match report {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("report".into(), other);
            map
        }
    };
    body.insert("success".into(), Value::Bool(true));
    Ok(Json(Value::Object(body)))
}
