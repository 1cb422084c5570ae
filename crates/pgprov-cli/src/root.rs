use std::path::{Path, PathBuf};

/// Resolve the project root: `--root` / `PGPROV_ROOT` when given, else the
/// current directory. `pgprov.yaml` and the output directory live under it.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
