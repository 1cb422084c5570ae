use axum::extract::State;
use axum::Json;
use pgprov_core::runner::detect_tools;
use pgprov_core::workspace;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status — lifecycle position reconstructed from the workspace files.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let ws = app.workspace.clone();
    let status = tokio::task::spawn_blocking(move || workspace::status(&ws))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(Json(serde_json::to_value(status)?))
}

/// GET /api/tools — whether the configured Terraform and Ansible binaries resolve.
pub async fn get_tools(State(app): State<AppState>) -> Json<serde_json::Value> {
    let tools = &app.config().tools;
    let found = detect_tools([tools.terraform.as_str(), tools.ansible_playbook.as_str()]);
    Json(serde_json::json!({ "tools": found }))
}

/// GET /api/config — read-only view of the effective `pgprov.yaml`.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::to_value(app.config())?))
}
