//! The output directory a lifecycle runs against, and the filesystem probes
//! that reconstruct how far that lifecycle has progressed.
//!
//! Nothing records step completion. Each probe looks for the file a step
//! leaves behind, so the answer is always whatever is on disk right now.

use crate::config::Config;
use crate::paths;
use crate::types::Step;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// A directory holding one project's rendered artifacts, Terraform state and
/// inventory. Concurrent steps against the same workspace race on those files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Workspace {
    id: String,
    dir: PathBuf,
}

impl Workspace {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }

    /// The workspace described by `config`, resolved against `root`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(config.workspace_id.clone(), config.output_dir(root))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn terraform_file(&self) -> PathBuf {
        paths::terraform_path(&self.dir)
    }

    pub fn playbook_file(&self) -> PathBuf {
        paths::playbook_path(&self.dir)
    }

    pub fn inventory_file(&self) -> PathBuf {
        paths::inventory_path(&self.dir)
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Both the Terraform configuration and the playbook have been rendered.
pub fn has_rendered_artifacts(ws: &Workspace) -> bool {
    ws.terraform_file().is_file() && ws.playbook_file().is_file()
}

/// `terraform init` has populated its metadata directory.
pub fn is_initialized(ws: &Workspace) -> bool {
    paths::terraform_meta_dir(ws.dir()).is_dir()
}

/// A successful `apply` has written the Ansible inventory.
pub fn has_inventory(ws: &Workspace) -> bool {
    ws.inventory_file().is_file()
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    pub workspace: String,
    pub dir: PathBuf,
    pub rendered: bool,
    pub initialized: bool,
    pub inventory: bool,
    /// The earliest step whose output is not yet on disk.
    pub next_step: Step,
}

pub fn status(ws: &Workspace) -> WorkspaceStatus {
    let rendered = has_rendered_artifacts(ws);
    let initialized = is_initialized(ws);
    let inventory = has_inventory(ws);

    // Plan leaves nothing behind, so an initialized workspace points at plan
    // until apply writes the inventory.
    let next_step = if !rendered {
        Step::Generate
    } else if !initialized {
        Step::Init
    } else if !inventory {
        Step::Plan
    } else {
        Step::ConfigureDatabase
    };

    WorkspaceStatus {
        workspace: ws.id().to_string(),
        dir: ws.dir().to_path_buf(),
        rendered,
        initialized,
        inventory,
        next_step,
    }
}
