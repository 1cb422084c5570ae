use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Generate,
    Init,
    Plan,
    Apply,
    ConfigureDatabase,
}

impl Step {
    pub fn all() -> &'static [Step] {
        &[
            Step::Generate,
            Step::Init,
            Step::Plan,
            Step::Apply,
            Step::ConfigureDatabase,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Generate => "generate",
            Step::Init => "init",
            Step::Plan => "plan",
            Step::Apply => "apply",
            Step::ConfigureDatabase => "configure_database",
        }
    }

    /// Whether the step shells out to Terraform or Ansible.
    pub fn runs_tool(self) -> bool {
        !matches!(self, Step::Generate)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Step {
    type Err = crate::error::ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(Step::Generate),
            "init" => Ok(Step::Init),
            "plan" => Ok(Step::Plan),
            "apply" => Ok(Step::Apply),
            "configure_database" | "configure-database" | "configure" => {
                Ok(Step::ConfigureDatabase)
            }
            _ => Err(crate::error::ProvisionError::InvalidStep(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandResult
// ---------------------------------------------------------------------------

/// Captured outcome of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

// ---------------------------------------------------------------------------
// StepOutput
// ---------------------------------------------------------------------------

/// What a successful tool-backed step reports back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub step: Step,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_seconds: f64,
}

impl StepOutput {
    pub fn from_result(step: Step, message: impl Into<String>, result: &CommandResult) -> Self {
        Self {
            step,
            message: message.into(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            duration_seconds: result.elapsed.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_round_trip() {
        for step in Step::all() {
            let parsed: Step = step.as_str().parse().unwrap();
            assert_eq!(parsed, *step);
        }
    }

    #[test]
    fn configure_accepts_route_spelling() {
        let parsed: Step = "configure-database".parse().unwrap();
        assert_eq!(parsed, Step::ConfigureDatabase);
    }

    #[test]
    fn unknown_step_is_rejected() {
        assert!("destroy".parse::<Step>().is_err());
    }

    #[test]
    fn steps_are_ordered() {
        assert!(Step::Generate < Step::Init);
        assert!(Step::Apply < Step::ConfigureDatabase);
        assert!(!Step::Generate.runs_tool());
        assert!(Step::Plan.runs_tool());
    }

    #[test]
    fn command_result_serializes_elapsed_as_seconds() {
        let result = CommandResult {
            exit_code: 0,
            stdout: "ok".into(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["elapsed"], 1.5);
        assert!(result.success());
    }
}
