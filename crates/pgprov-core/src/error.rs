use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("render failed: {0}")]
    Render(String),

    #[error("cannot run {step}: missing {missing} (run '{produced_by}' first)")]
    Precondition {
        step: String,
        missing: String,
        produced_by: String,
    },

    #[error("failed to launch '{program}': {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {exit_code}: {stderr}")]
    ProcessExit {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("inventory unavailable: {0}")]
    Inventory(String),

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake_case name used in API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Validation { .. } => "validation",
            ProvisionError::Render(_) => "render",
            ProvisionError::Precondition { .. } => "precondition",
            ProvisionError::ProcessLaunch { .. } => "process_launch",
            ProvisionError::ProcessExit { .. } => "process_exit",
            ProvisionError::Inventory(_) => "inventory",
            ProvisionError::InvalidStep(_) => "invalid_step",
            ProvisionError::Io(_) => "io",
            ProvisionError::Yaml(_) => "yaml",
            ProvisionError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
