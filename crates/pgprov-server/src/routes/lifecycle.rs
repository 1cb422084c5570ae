use std::future::Future;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pgprov_core::lifecycle::check_precondition;
use pgprov_core::request::ProvisioningRequest;
use pgprov_core::types::{Step, StepOutput};
use pgprov_core::ProvisionError;

use crate::error::AppError;
use crate::jobs;
use crate::state::AppState;

#[derive(Debug, Default, serde::Deserialize)]
pub struct DispatchParams {
    /// Return 202 with a job id instead of waiting for the tool to finish.
    #[serde(default)]
    pub detach: bool,
}

fn step_body(out: StepOutput) -> serde_json::Value {
    serde_json::json!({
        "message": out.message,
        "step": out.step,
        "output": out.stdout,
        "stderr": out.stderr,
        "exit_code": out.exit_code,
        "duration_seconds": out.duration_seconds,
    })
}

/// Claim the workspace and run `step` as a job, awaiting it unless detached.
async fn dispatch_step<F, Fut>(
    app: AppState,
    step: Step,
    params: DispatchParams,
    run: F,
) -> Result<Response, AppError>
where
    F: FnOnce(AppState) -> Fut,
    Fut: Future<Output = Result<StepOutput, ProvisionError>> + Send + 'static,
{
    // Detached callers would otherwise only see a missing file in the job record.
    check_precondition(&app.workspace, step)?;
    let guard = app.claim_workspace()?;
    let timeout = app.config().timeouts.for_step(step);
    let fut = run(app.clone());
    let (job_id, rx) = app
        .jobs
        .dispatch(step, app.workspace.id(), timeout, guard, async move {
            fut.await.map(step_body)
        })
        .await;

    if params.detach {
        let body = serde_json::json!({
            "job_id": job_id,
            "step": step,
            "status": "running",
        });
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    match jobs::wait(rx).await {
        Ok(mut body) => {
            body["job_id"] = serde_json::json!(job_id);
            Ok(Json(body).into_response())
        }
        Err(e) => Err(e.into_app_error()),
    }
}

/// POST /generate-code — render `main.tf` and `setup.yml` into the workspace.
pub async fn generate_code(
    State(app): State<AppState>,
    Json(req): Json<ProvisioningRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = app.claim_workspace()?;
    let lifecycle = app.lifecycle.clone();
    let ws = app.workspace.clone();
    let artifacts = tokio::task::spawn_blocking(move || lifecycle.generate(&ws, &req))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({
        "message": "Terraform and Ansible configurations generated successfully",
        "workspace": app.workspace.id(),
        "files": [artifacts.terraform, artifacts.playbook],
    })))
}

/// POST /init-infrastructure — `terraform init`.
pub async fn init_infrastructure(
    State(app): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Response, AppError> {
    dispatch_step(app, Step::Init, params, |app| async move {
        app.lifecycle.init(&app.workspace).await
    })
    .await
}

/// POST /plan-infrastructure — `terraform plan`.
pub async fn plan_infrastructure(
    State(app): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Response, AppError> {
    dispatch_step(app, Step::Plan, params, |app| async move {
        app.lifecycle.plan(&app.workspace).await
    })
    .await
}

/// POST /apply-infrastructure — `terraform apply`, then write the inventory.
pub async fn apply_infrastructure(
    State(app): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Response, AppError> {
    dispatch_step(app, Step::Apply, params, |app| async move {
        app.lifecycle.apply(&app.workspace).await
    })
    .await
}

/// POST /configure-database — run the playbook against the inventory.
pub async fn configure_database(
    State(app): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Response, AppError> {
    dispatch_step(app, Step::ConfigureDatabase, params, |app| async move {
        app.lifecycle.configure_database(&app.workspace).await
    })
    .await
}
