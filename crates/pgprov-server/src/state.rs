use std::path::PathBuf;
use std::sync::Arc;

use pgprov_core::config::Config;
use pgprov_core::lifecycle::Lifecycle;
use pgprov_core::workspace::Workspace;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::AppError;
use crate::jobs::JobRegistry;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub workspace: Workspace,
    pub lifecycle: Arc<Lifecycle>,
    pub jobs: JobRegistry,
    /// Held by whichever step is currently touching the workspace.
    busy: Arc<Mutex<()>>,
}

impl AppState {
    /// Load `pgprov.yaml` under `root` and drive the real tools.
    pub fn new(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        Ok(Self::with_lifecycle(root, Lifecycle::system(config)))
    }

    pub fn with_lifecycle(root: PathBuf, lifecycle: Lifecycle) -> Self {
        let workspace = Workspace::from_config(&root, lifecycle.config());
        Self {
            root,
            workspace,
            lifecycle: Arc::new(lifecycle),
            jobs: JobRegistry::new(),
            busy: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &Config {
        self.lifecycle.config()
    }

    /// Claim the workspace, or fail with 409 if another step holds it.
    pub fn claim_workspace(&self) -> Result<OwnedMutexGuard<()>, AppError> {
        self.busy.clone().try_lock_owned().map_err(|_| {
            AppError::conflict(format!(
                "workspace '{}' is busy with another step",
                self.workspace.id()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_resolves_workspace_under_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.workspace.dir(), dir.path().join("output"));
        assert_eq!(state.workspace.id(), "default");
    }

    #[test]
    fn second_claim_is_rejected_while_first_is_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        let guard = state.claim_workspace().unwrap();
        assert!(state.claim_workspace().is_err());
        drop(guard);
        assert!(state.claim_workspace().is_ok());
    }
}
