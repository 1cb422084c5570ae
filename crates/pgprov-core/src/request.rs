use crate::error::{ProvisionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Largest replica count `generate` accepts. The Terraform file grows by one
/// instance block per replica.
pub const MAX_REPLICAS: u32 = 64;

/// Parameters for one `generate` call.
///
/// Omitted JSON fields take the same defaults the HTTP API has always used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    #[serde(default = "default_postgres_version")]
    pub postgres_version: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_num_replicas")]
    pub num_replicas: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_shared_buffers")]
    pub shared_buffers: String,
}

fn default_postgres_version() -> String {
    "13".to_string()
}

fn default_instance_type() -> String {
    "t2.micro".to_string()
}

fn default_num_replicas() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    100
}

fn default_shared_buffers() -> String {
    "128MB".to_string()
}

impl Default for ProvisioningRequest {
    fn default() -> Self {
        Self {
            postgres_version: default_postgres_version(),
            instance_type: default_instance_type(),
            num_replicas: default_num_replicas(),
            max_connections: default_max_connections(),
            shared_buffers: default_shared_buffers(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static VERSION_RE: OnceLock<Regex> = OnceLock::new();
static INSTANCE_TYPE_RE: OnceLock<Regex> = OnceLock::new();
static MEMORY_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

fn instance_type_re() -> &'static Regex {
    INSTANCE_TYPE_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+\.[a-z0-9]+$").unwrap())
}

fn memory_re() -> &'static Regex {
    MEMORY_RE.get_or_init(|| Regex::new(r"^[0-9]+(kB|MB|GB|TB)?$").unwrap())
}

fn require(field: &str, value: &str, re: &Regex, expected: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProvisionError::validation(field, "must not be empty"));
    }
    if !re.is_match(value) {
        return Err(ProvisionError::validation(
            field,
            format!("'{value}' is not {expected}"),
        ));
    }
    Ok(())
}

impl ProvisioningRequest {
    /// Reject requests that would render a broken configuration.
    pub fn validate(&self) -> Result<()> {
        require(
            "postgres_version",
            &self.postgres_version,
            version_re(),
            "a PostgreSQL major version such as '13'",
        )?;
        require(
            "instance_type",
            &self.instance_type,
            instance_type_re(),
            "an EC2 instance type such as 't2.micro'",
        )?;
        if self.num_replicas == 0 {
            return Err(ProvisionError::validation(
                "num_replicas",
                "must be at least 1",
            ));
        }
        if self.num_replicas > MAX_REPLICAS {
            return Err(ProvisionError::validation(
                "num_replicas",
                format!("must be at most {MAX_REPLICAS}"),
            ));
        }
        if self.max_connections == 0 {
            return Err(ProvisionError::validation(
                "max_connections",
                "must be at least 1",
            ));
        }
        require(
            "shared_buffers",
            &self.shared_buffers,
            memory_re(),
            "a PostgreSQL memory size such as '128MB'",
        )?;
        Ok(())
    }
}
