pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Lifecycle
        .route("/generate-code", post(routes::lifecycle::generate_code))
        .route(
            "/init-infrastructure",
            post(routes::lifecycle::init_infrastructure),
        )
        .route(
            "/plan-infrastructure",
            post(routes::lifecycle::plan_infrastructure),
        )
        .route(
            "/apply-infrastructure",
            post(routes::lifecycle::apply_infrastructure),
        )
        .route(
            "/configure-database",
            post(routes::lifecycle::configure_database),
        )
        // Workspace
        .route("/api/status", get(routes::status::get_status))
        .route("/api/tools", get(routes::status::get_tools))
        .route("/api/config", get(routes::status::get_config))
        // Jobs
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route("/api/jobs/{id}", get(routes::jobs::get_job))
        .route("/api/jobs/{id}/cancel", post(routes::jobs::cancel_job))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server for the project at `root`.
///
/// `port` overrides `server.port` from `pgprov.yaml`. Runs until Ctrl-C.
pub async fn serve(root: PathBuf, port: Option<u16>) -> anyhow::Result<()> {
    let app_state = AppState::new(root)?;
    let port = port.unwrap_or(app_state.config().server.port);
    let workspace = app_state.workspace.clone();
    let app = build_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        workspace = workspace.id(),
        dir = %workspace.dir().display(),
        "pgprov API listening on http://localhost:{port}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
