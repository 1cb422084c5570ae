//! Lifecycle steps dispatched as cancellable background jobs.
//!
//! Each infrastructure step runs in its own tokio task. The dispatcher hands
//! back a oneshot receiver, so a handler can either await the outcome
//! (synchronous API) or return the job id straight away. Aborting the task
//! drops the running tool future, which kills the child process, and
//! releases the workspace lock the job was holding.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use pgprov_core::types::Step;
use pgprov_core::ProvisionError;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{provision_body, provision_status, AppError};

// ---------------------------------------------------------------------------
// JobError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("step exceeded its {}s timeout; the workspace may need manual inspection", .0.as_secs())]
    TimedOut(Duration),

    #[error("job was cancelled; the workspace may need manual inspection")]
    Cancelled,
}

impl JobError {
    pub fn status(&self) -> StatusCode {
        match self {
            JobError::Provision(e) => provision_status(e),
            JobError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            JobError::Cancelled => StatusCode::CONFLICT,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            JobError::Provision(e) => provision_body(e),
            JobError::TimedOut(d) => serde_json::json!({
                "error": self.to_string(),
                "kind": "timeout",
                "timeout_seconds": d.as_secs(),
            }),
            JobError::Cancelled => serde_json::json!({
                "error": self.to_string(),
                "kind": "cancelled",
            }),
        }
    }

    /// Keep `ProvisionError` as the root of the chain so `AppError` can
    /// map it directly.
    pub fn into_app_error(self) -> AppError {
        match self {
            JobError::Provision(e) => AppError(e.into()),
            other => AppError(other.into()),
        }
    }

    /// Whether the step may have been interrupted half way through.
    fn leaves_indeterminate(&self) -> bool {
        matches!(self, JobError::TimedOut(_) | JobError::Cancelled)
    }
}

pub type JobOutcome = Result<serde_json::Value, JobError>;

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub step: Step,
    pub workspace: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when a step was cut short; Terraform state or the inventory may
    /// be partially written.
    pub indeterminate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

struct JobEntry {
    record: JobRecord,
    abort: Option<AbortHandle>,
}

// ---------------------------------------------------------------------------
// JobRegistry
// ---------------------------------------------------------------------------

/// Finished job records kept for `/api/jobs`; older ones are dropped.
pub const DEFAULT_RETAINED_JOBS: usize = 100;

#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<Uuid, JobEntry>>>,
    retain: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retain` finished records. Running jobs are never dropped.
    pub fn with_retention(retain: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            retain,
        }
    }

    /// Spawn `fut` as a job. `guard` is held until the job ends, however it
    /// ends. `timeout`, when set, bounds the whole step.
    pub async fn dispatch<F>(
        &self,
        step: Step,
        workspace: &str,
        timeout: Option<Duration>,
        guard: OwnedMutexGuard<()>,
        fut: F,
    ) -> (Uuid, oneshot::Receiver<JobOutcome>)
    where
        F: Future<Output = Result<serde_json::Value, ProvisionError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            step,
            workspace: workspace.to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            indeterminate: false,
            result: None,
            error: None,
        };

        let (tx, rx) = oneshot::channel();
        let registry = self.clone();

        // The record and its abort handle go in under one lock, so neither
        // `finish` nor `cancel` can observe a job without its handle.
        let mut jobs = self.inner.lock().await;
        let task = tokio::spawn(async move {
            let _guard = guard;
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(r) => r.map_err(JobError::from),
                    Err(_) => Err(JobError::TimedOut(limit)),
                },
                None => fut.await.map_err(JobError::from),
            };
            registry.finish(id, &outcome).await;
            let _ = tx.send(outcome);
        });
        jobs.insert(
            id,
            JobEntry {
                record,
                abort: Some(task.abort_handle()),
            },
        );
        prune(&mut jobs, self.retain);
        drop(jobs);

        info!(job = %id, %step, workspace, "job started");
        (id, rx)
    }

    async fn finish(&self, id: Uuid, outcome: &JobOutcome) {
        let mut jobs = self.inner.lock().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        if entry.record.status != JobStatus::Running {
            return;
        }
        let rec = &mut entry.record;
        rec.finished_at = Some(Utc::now());
        match outcome {
            Ok(body) => {
                rec.status = JobStatus::Succeeded;
                rec.result = Some(body.clone());
            }
            Err(e) => {
                rec.status = match e {
                    JobError::TimedOut(_) => JobStatus::TimedOut,
                    JobError::Cancelled => JobStatus::Cancelled,
                    JobError::Provision(_) => JobStatus::Failed,
                };
                rec.indeterminate = e.leaves_indeterminate();
                rec.error = Some(e.body());
            }
        }
        entry.abort = None;
        info!(job = %id, status = ?rec.status, "job finished");
    }

    /// Abort a running job. Returns the updated record, or `None` if the id
    /// is unknown. Finished jobs are returned unchanged.
    pub async fn cancel(&self, id: Uuid) -> Option<JobRecord> {
        let mut jobs = self.inner.lock().await;
        let entry = jobs.get_mut(&id)?;
        if entry.record.status == JobStatus::Running {
            if let Some(abort) = entry.abort.take() {
                abort.abort();
            }
            let err = JobError::Cancelled;
            entry.record.status = JobStatus::Cancelled;
            entry.record.finished_at = Some(Utc::now());
            entry.record.indeterminate = true;
            entry.record.error = Some(err.body());
            warn!(job = %id, step = %entry.record.step, "job cancelled");
        }
        Some(entry.record.clone())
    }

    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.inner.lock().await.get(&id).map(|e| e.record.clone())
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .inner
            .lock()
            .await
            .values()
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }
}

/// Drop the oldest finished records beyond `retain`.
fn prune(jobs: &mut HashMap<Uuid, JobEntry>, retain: usize) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .values()
        .filter(|e| e.record.status != JobStatus::Running)
        .map(|e| (e.record.started_at, e.record.id))
        .collect();
    if finished.len() <= retain {
        return;
    }
    finished.sort();
    let excess = finished.len() - retain;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

/// Wait for a dispatched job. A dropped sender means the task was aborted.
pub async fn wait(rx: oneshot::Receiver<JobOutcome>) -> JobOutcome {
    rx.await.unwrap_or(Err(JobError::Cancelled))
}
