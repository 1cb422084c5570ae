use crate::output::{print_fields, print_json};
use anyhow::Context;
use pgprov_core::config::Config;
use pgprov_core::workspace::{self, Workspace};
use std::path::Path;

fn mark(present: bool) -> String {
    if present { "yes" } else { "no" }.to_string()
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load pgprov.yaml")?;
    let ws = Workspace::from_config(root, &config);
    let status = workspace::status(&ws);

    if json {
        return print_json(&status);
    }
    print_fields(&[
        ("workspace", status.workspace.clone()),
        ("dir", status.dir.display().to_string()),
        ("rendered", mark(status.rendered)),
        ("initialized", mark(status.initialized)),
        ("inventory", mark(status.inventory)),
        ("next", status.next_step.to_string()),
    ]);
    Ok(())
}
