use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory names
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "pgprov.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const TERRAFORM_FILE: &str = "main.tf";
pub const PLAYBOOK_FILE: &str = "setup.yml";
pub const INVENTORY_FILE: &str = "inventory.ini";
pub const TERRAFORM_META_DIR: &str = ".terraform";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn terraform_path(dir: &Path) -> PathBuf {
    dir.join(TERRAFORM_FILE)
}

pub fn playbook_path(dir: &Path) -> PathBuf {
    dir.join(PLAYBOOK_FILE)
}

pub fn inventory_path(dir: &Path) -> PathBuf {
    dir.join(INVENTORY_FILE)
}

pub fn terraform_meta_dir(dir: &Path) -> PathBuf {
    dir.join(TERRAFORM_META_DIR)
}
