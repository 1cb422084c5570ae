use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::not_found(format!("job not found: {id}")))
}

/// GET /api/jobs — every job this server has run, newest first.
pub async fn list_jobs(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!(app.jobs.list().await))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_id(&id)?;
    let record = app
        .jobs
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found(format!("job not found: {id}")))?;
    Ok(Json(serde_json::to_value(record)?))
}

/// POST /api/jobs/{id}/cancel — abort a running step and kill its tool.
pub async fn cancel_job(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_id(&id)?;
    let record = app
        .jobs
        .cancel(id)
        .await
        .ok_or_else(|| AppError::not_found(format!("job not found: {id}")))?;
    Ok(Json(serde_json::to_value(record)?))
}
