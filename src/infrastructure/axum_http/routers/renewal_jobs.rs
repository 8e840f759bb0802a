use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, patch, post},
};

use crate::application::jobs::jobs_manager::{JobsConfigUpdate, JobsManager};

pub fn routes(jobs_manager: Arc<JobsManager>) -> Router {
    Router::new()
        .route("/run", post(run_renewal_pass))
        .route("/status", get(job_status))
        .route("/config", patch(update_job_config))
        .with_state(jobs_manager)
}

pub async fn run_renewal_pass(
    State(jobs_manager): State<Arc<JobsManager>>,
) -> impl IntoResponse {
    Json(jobs_manager.run_manually().await)
}

pub async fn job_status(State(jobs_manager): State<Arc<JobsManager>>) -> impl IntoResponse {
    Json(jobs_manager.status().await)
}

pub async fn update_job_config(
    State(jobs_manager): State<Arc<JobsManager>>,
    Json(update): Json<JobsConfigUpdate>,
) -> impl IntoResponse {
    jobs_manager.update_config(update).await;
    Json(jobs_manager.status().await)
}
