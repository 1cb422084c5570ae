//! Ansible inventory built from `terraform output -json`.

use crate::config::AnsibleConfig;
use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PYTHON_INTERPRETER: &str = "/usr/bin/python3";

/// Host addresses exported by the rendered Terraform outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureOutputs {
    pub primary_ip: String,
    pub replica_ips: Vec<String>,
}

#[derive(Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

/// An address is embedded verbatim in an INI line, so anything that could
/// start a new token or section is refused.
fn check_host(name: &str, host: &str) -> Result<()> {
    let bad = host.is_empty()
        || host
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '[' | ']' | '=' | '#' | ';'));
    if bad {
        return Err(ProvisionError::Inventory(format!(
            "output '{name}' is not a usable host address: {host:?}"
        )));
    }
    Ok(())
}

fn string_value(name: &str, value: &serde_json::Value) -> Result<String> {
    match value.as_str() {
        Some(s) => {
            check_host(name, s)?;
            Ok(s.to_string())
        }
        None => Err(ProvisionError::Inventory(format!(
            "output '{name}' has no address yet (got {value})"
        ))),
    }
}

impl InfrastructureOutputs {
    /// Parse the JSON printed by `terraform output -json`.
    pub fn from_terraform_json(json: &str) -> Result<Self> {
        let outputs: HashMap<String, OutputValue> = serde_json::from_str(json)?;

        let primary = outputs
            .get("primary_ip")
            .ok_or_else(|| ProvisionError::Inventory("output 'primary_ip' is missing".into()))?;
        let primary_ip = string_value("primary_ip", &primary.value)?;

        let replicas = outputs
            .get("replica_ips")
            .ok_or_else(|| ProvisionError::Inventory("output 'replica_ips' is missing".into()))?;
        let list = replicas.value.as_array().ok_or_else(|| {
            ProvisionError::Inventory("output 'replica_ips' is not a list".into())
        })?;
        let replica_ips = list
            .iter()
            .map(|v| string_value("replica_ips", v))
            .collect::<Result<Vec<_>>>()?;
        if replica_ips.is_empty() {
            return Err(ProvisionError::Inventory(
                "output 'replica_ips' is empty".into(),
            ));
        }

        Ok(Self {
            primary_ip,
            replica_ips,
        })
    }

    /// Render the INI inventory consumed by the playbook.
    pub fn to_inventory(&self, ansible: &AnsibleConfig) -> String {
        let host_line = |ip: &str| {
            format!(
                "{ip} ansible_user={} ansible_python_interpreter={PYTHON_INTERPRETER}\n",
                ansible.ssh_user
            )
        };

        let mut out = String::from("[primary]\n");
        out.push_str(&host_line(&self.primary_ip));
        out.push_str("\n[replica]\n");
        for ip in &self.replica_ips {
            out.push_str(&host_line(ip));
        }
        out.push_str("\n[all:vars]\n");
        out.push_str(&format!(
            "replication_password={}\n",
            ansible.replication_password
        ));
        out
    }
}
