use crate::error::Result;
use crate::io::atomic_write;
use crate::paths;
use crate::types::Step;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// AwsConfig
// ---------------------------------------------------------------------------

/// Values substituted into the Terraform template besides the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_ami")]
    pub ami: String,
    #[serde(default = "default_key_pair_name")]
    pub key_pair_name: String,
    #[serde(default = "default_public_key_path")]
    pub public_key_path: String,
}

fn default_region() -> String {
    "ap-southeast-1".to_string()
}

fn default_ami() -> String {
    "ami-06650ca7ed78ff6fa".to_string()
}

fn default_key_pair_name() -> String {
    "PostgresKey".to_string()
}

fn default_public_key_path() -> String {
    "~/.ssh/id_rsa.pub".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            ami: default_ami(),
            key_pair_name: default_key_pair_name(),
            public_key_path: default_public_key_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// AnsibleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsibleConfig {
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    /// Passed as `--private-key`; when unset Ansible falls back to the SSH agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_replication_password")]
    pub replication_password: String,
}

fn default_ssh_user() -> String {
    "ubuntu".to_string()
}

fn default_replication_password() -> String {
    "rep".to_string()
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            ssh_user: default_ssh_user(),
            private_key_path: None,
            replication_password: default_replication_password(),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_terraform")]
    pub terraform: String,
    #[serde(default = "default_ansible_playbook")]
    pub ansible_playbook: String,
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_ansible_playbook() -> String {
    "ansible-playbook".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terraform: default_terraform(),
            ansible_playbook: default_ansible_playbook(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutsConfig
// ---------------------------------------------------------------------------

/// Per-step wall-clock limits in seconds, enforced by the job runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<u64>,
    #[serde(default = "default_configure_timeout")]
    pub configure_database: Option<u64>,
}

fn default_configure_timeout() -> Option<u64> {
    Some(3600)
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            init: None,
            plan: None,
            apply: None,
            configure_database: default_configure_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn for_step(&self, step: Step) -> Option<Duration> {
        let secs = match step {
            Step::Generate => None,
            Step::Init => self.init,
            Step::Plan => self.plan,
            Step::Apply => self.apply,
            Step::ConfigureDatabase => self.configure_database,
        };
        secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub ansible: AnsibleConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_OUTPUT_DIR)
}

fn default_workspace_id() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workspace_id: default_workspace_id(),
            aws: AwsConfig::default(),
            ansible: AnsibleConfig::default(),
            tools: ToolsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load `pgprov.yaml` from `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(&paths::config_path(root), data.as_bytes())
    }

    /// Output directory resolved against the project root.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            root.join(&self.output_dir)
        }
    }
}
