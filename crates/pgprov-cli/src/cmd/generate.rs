use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Args;
use pgprov_core::config::Config;
use pgprov_core::lifecycle::Lifecycle;
use pgprov_core::request::ProvisioningRequest;
use pgprov_core::workspace::Workspace;
use std::path::Path;

/// Request fields; anything left out takes the same default as the API.
#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// PostgreSQL major version, e.g. 13 or 16
    #[arg(long)]
    pub postgres_version: Option<String>,
    /// EC2 instance type for every node
    #[arg(long)]
    pub instance_type: Option<String>,
    /// Number of streaming replicas
    #[arg(long)]
    pub num_replicas: Option<u32>,
    #[arg(long)]
    pub max_connections: Option<u32>,
    /// e.g. 128MB
    #[arg(long)]
    pub shared_buffers: Option<String>,
}

impl GenerateArgs {
    pub fn into_request(self) -> ProvisioningRequest {
        let mut req = ProvisioningRequest::default();
        if let Some(v) = self.postgres_version {
            req.postgres_version = v;
        }
        if let Some(v) = self.instance_type {
            req.instance_type = v;
        }
        if let Some(v) = self.num_replicas {
            req.num_replicas = v;
        }
        if let Some(v) = self.max_connections {
            req.max_connections = v;
        }
        if let Some(v) = self.shared_buffers {
            req.shared_buffers = v;
        }
        req
    }
}

pub fn run(root: &Path, args: GenerateArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load pgprov.yaml")?;
    let ws = Workspace::from_config(root, &config);
    let lifecycle = Lifecycle::system(config);
    let req = args.into_request();
    let artifacts = lifecycle.generate(&ws, &req)?;

    if json {
        print_json(&serde_json::json!({
            "message": "Terraform and Ansible configurations generated successfully",
            "workspace": ws.id(),
            "files": [artifacts.terraform, artifacts.playbook],
        }))?;
    } else {
        print_fields(&[
            ("terraform", artifacts.terraform.display().to_string()),
            ("playbook", artifacts.playbook.display().to_string()),
            ("replicas", req.num_replicas.to_string()),
        ]);
    }
    Ok(())
}
