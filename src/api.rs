//! The HTTP surface: submit a job, poll its status, list every job, and a liveness
//! probe. Route shapes follow the original FastAPI service's
//! `/run-optimization`, `/job-status/{job_id}`, `/jobs` and `/health` endpoints.
use crate::orchestrator::{JobStatusView, Orchestrator};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Build the application router over a shared orchestrator.
#[must_use]
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/run-optimization", post(submit_job))
        .route("/job-status/{job_id}", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

#[derive(Serialize)]
struct SubmitResponse {
    status: &'static str,
    job_id: Uuid,
    message: &'static str,
}

async fn submit_job(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    let job_id = orchestrator.submit().await;
    (
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: "ACCEPTED",
            job_id,
            message: "Optimization task has been queued.",
        }),
    )
}

async fn job_status(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusView>, StatusCode> {
    orchestrator
        .status(job_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_jobs(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<JobStatusView>> {
    Json(orchestrator.list().await)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::csv_source::CsvSourceConfig;
    use crate::source::DataSource;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_orchestrator() -> Arc<Orchestrator> {
        Orchestrator::new(
            DataSource::Dev(CsvSourceConfig {
                dir: std::path::PathBuf::from("/nonexistent"),
            }),
            2,
            30,
        )
    }

    #[tokio::test]
    async fn health_reports_up() {
        let app = router(test_orchestrator());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_status_is_404() {
        let app = router(test_orchestrator());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/job-status/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
