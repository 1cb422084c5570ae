use crate::output::print_json;
use anyhow::{bail, Context};
use pgprov_core::config::Config;
use pgprov_core::runner::detect_tools;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load pgprov.yaml")?;
    let tools = detect_tools([
        config.tools.terraform.as_str(),
        config.tools.ansible_playbook.as_str(),
    ]);

    if json {
        print_json(&serde_json::json!({ "tools": tools }))?;
    } else {
        for tool in &tools {
            match &tool.path {
                Some(path) => println!("ok       {}  {}", tool.name, path.display()),
                None => println!("missing  {}", tool.name),
            }
        }
    }

    let missing: Vec<&str> = tools
        .iter()
        .filter(|t| !t.available())
        .map(|t| t.name.as_str())
        .collect();
    if !missing.is_empty() {
        bail!("not found on PATH: {}", missing.join(", "));
    }
    Ok(())
}
