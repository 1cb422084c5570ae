//! The provisioning lifecycle: generate → init → plan → apply → configure.
//!
//! There is no step tracker. Every operation checks the files its
//! predecessor leaves behind (see [`crate::workspace`]) at call time and
//! fails with [`ProvisionError::Precondition`] before launching anything if
//! they are missing. Steps may be called in any order and re-run freely;
//! running two of them against the same workspace at once is the caller's
//! problem to prevent.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ProvisionError, Result};
use crate::inventory::InfrastructureOutputs;
use crate::io;
use crate::paths;
use crate::render::{self, RenderedArtifacts};
use crate::request::ProvisioningRequest;
use crate::runner::{CommandRunner, Invocation, SystemRunner};
use crate::types::{CommandResult, Step, StepOutput};
use crate::workspace::{self, Workspace};

pub struct Lifecycle {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl Lifecycle {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// A lifecycle that launches the real Terraform and Ansible binaries.
    pub fn system(config: Config) -> Self {
        Self::new(config, Arc::new(SystemRunner))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    pub fn generate(&self, ws: &Workspace, req: &ProvisioningRequest) -> Result<RenderedArtifacts> {
        render::write_artifacts(ws, req, &self.config.aws)
    }

    pub async fn init(&self, ws: &Workspace) -> Result<StepOutput> {
        check_precondition(ws, Step::Init)?;
        let inv = self.terraform(ws, ["init", "-input=false", "-no-color"]);
        let result = self.run_checked(ws, Step::Init, &inv).await?;
        if !workspace::is_initialized(ws) {
            warn!(
                workspace = ws.id(),
                "terraform init succeeded but left no {} directory",
                paths::TERRAFORM_META_DIR
            );
        }
        Ok(StepOutput::from_result(
            Step::Init,
            "Terraform initialized successfully",
            &result,
        ))
    }

    pub async fn plan(&self, ws: &Workspace) -> Result<StepOutput> {
        check_precondition(ws, Step::Plan)?;
        let inv = self.terraform(ws, ["plan", "-input=false", "-no-color"]);
        let result = self.run_checked(ws, Step::Plan, &inv).await?;
        Ok(StepOutput::from_result(
            Step::Plan,
            "Terraform plan successful",
            &result,
        ))
    }

    /// Apply the configuration, then turn its outputs into `inventory.ini`.
    ///
    /// Any inventory from an earlier apply is removed first, so its presence
    /// afterwards always means this apply succeeded.
    pub async fn apply(&self, ws: &Workspace) -> Result<StepOutput> {
        check_precondition(ws, Step::Apply)?;

        if io::remove_if_exists(&ws.inventory_file())? {
            info!(workspace = ws.id(), "removed stale inventory before apply");
        }

        let inv = self.terraform(
            ws,
            ["apply", "-auto-approve", "-input=false", "-no-color"],
        );
        let applied = self.run_checked(ws, Step::Apply, &inv).await?;

        let inv = self.terraform(ws, ["output", "-json"]);
        let outputs = self.run_checked(ws, Step::Apply, &inv).await?;
        let hosts = InfrastructureOutputs::from_terraform_json(&outputs.stdout)?;

        io::atomic_write(
            &ws.inventory_file(),
            hosts.to_inventory(&self.config.ansible).as_bytes(),
        )?;
        if !workspace::has_inventory(ws) {
            return Err(ProvisionError::Inventory(format!(
                "{} was not written",
                ws.inventory_file().display()
            )));
        }
        info!(
            workspace = ws.id(),
            primary = %hosts.primary_ip,
            replicas = hosts.replica_ips.len(),
            "inventory written"
        );

        Ok(StepOutput::from_result(
            Step::Apply,
            "Infrastructure applied and inventory file created successfully",
            &applied,
        ))
    }

    pub async fn configure_database(&self, ws: &Workspace) -> Result<StepOutput> {
        check_precondition(ws, Step::ConfigureDatabase)?;

        let mut inv = Invocation::new(&self.config.tools.ansible_playbook, ws.dir())
            .args([paths::PLAYBOOK_FILE, "-i", paths::INVENTORY_FILE])
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .env("ANSIBLE_NOCOLOR", "1");
        if let Some(key) = &self.config.ansible.private_key_path {
            inv = inv.arg("--private-key").arg(key.to_string_lossy());
        }

        let result = self.run_checked(ws, Step::ConfigureDatabase, &inv).await?;
        Ok(StepOutput::from_result(
            Step::ConfigureDatabase,
            "Database configuration successful",
            &result,
        ))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn terraform<const N: usize>(&self, ws: &Workspace, args: [&str; N]) -> Invocation {
        Invocation::new(&self.config.tools.terraform, ws.dir()).args(args)
    }

    /// Run `inv`, turning a non-zero exit into [`ProvisionError::ProcessExit`]
    /// with the tool's stderr attached unchanged.
    async fn run_checked(
        &self,
        ws: &Workspace,
        step: Step,
        inv: &Invocation,
    ) -> Result<CommandResult> {
        info!(workspace = ws.id(), %step, cmd = %inv.display(), "running");
        let result = self.runner.run(inv).await?;
        if !result.success() {
            warn!(
                workspace = ws.id(),
                %step,
                exit_code = result.exit_code,
                "{} failed",
                inv.program
            );
            return Err(ProvisionError::ProcessExit {
                program: inv.program.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        info!(
            workspace = ws.id(),
            %step,
            elapsed_secs = result.elapsed.as_secs_f64(),
            "{} finished",
            inv.program
        );
        Ok(result)
    }
}

/// Fail if `ws` lacks the files `step` consumes. Every step calls this
/// before launching anything; callers may also call it up front.
pub fn check_precondition(ws: &Workspace, step: Step) -> Result<()> {
    match step {
        Step::Generate => Ok(()),
        Step::Init => require_rendered(ws, step),
        Step::Plan | Step::Apply => {
            require_rendered(ws, step)?;
            require_initialized(ws, step)
        }
        Step::ConfigureDatabase => {
            require_rendered(ws, step)?;
            require_inventory(ws, step)
        }
    }
}

fn precondition(step: Step, missing: &str, produced_by: Step) -> ProvisionError {
    warn!(%step, missing, "precondition not met");
    ProvisionError::Precondition {
        step: step.to_string(),
        missing: missing.to_string(),
        produced_by: produced_by.to_string(),
    }
}

fn require_rendered(ws: &Workspace, step: Step) -> Result<()> {
    if workspace::has_rendered_artifacts(ws) {
        return Ok(());
    }
    let missing = if ws.terraform_file().is_file() {
        paths::PLAYBOOK_FILE
    } else {
        paths::TERRAFORM_FILE
    };
    Err(precondition(step, missing, Step::Generate))
}

fn require_initialized(ws: &Workspace, step: Step) -> Result<()> {
    if workspace::is_initialized(ws) {
        return Ok(());
    }
    Err(precondition(step, paths::TERRAFORM_META_DIR, Step::Init))
}

fn require_inventory(ws: &Workspace, step: Step) -> Result<()> {
    if workspace::has_inventory(ws) {
        return Ok(());
    }
    Err(precondition(step, paths::INVENTORY_FILE, Step::Apply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every invocation and answers from a queue of canned results.
    /// An empty queue answers with a silent success.
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Invocation>>,
        replies: Mutex<VecDeque<Result<CommandResult>>>,
    }

    impl ScriptedRunner {
        fn reply(&self, exit_code: i32, stdout: &str, stderr: &str) {
            self.replies.lock().unwrap().push_back(Ok(CommandResult {
                exit_code,
                stdout: stdout.into(),
                stderr: stderr.into(),
                elapsed: Duration::from_millis(5),
            }));
        }

        fn fail_launch(&self, program: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(ProvisionError::ProcessLaunch {
                    program: program.into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }));
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
            self.calls.lock().unwrap().push(invocation.clone());
            self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(CommandResult {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                    elapsed: Duration::ZERO,
                })
            })
        }
    }

    const OUTPUTS: &str = r#"{"primary_ip":{"value":"10.0.0.1"},"replica_ips":{"value":["10.0.0.2","10.0.0.3"]}}"#;

    struct Fixture {
        _dir: TempDir,
        ws: Workspace,
        runner: Arc<ScriptedRunner>,
        lifecycle: Lifecycle,
    }

    fn fixture_with(config: Config) -> Fixture {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new("test", dir.path().join("output"));
        let runner = Arc::new(ScriptedRunner::default());
        let lifecycle = Lifecycle::new(config, runner.clone());
        Fixture {
            _dir: dir,
            ws,
            runner,
            lifecycle,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn generated(f: &Fixture) {
        f.lifecycle
            .generate(&f.ws, &ProvisioningRequest::default())
            .unwrap();
    }

    fn initialized(f: &Fixture) {
        generated(f);
        std::fs::create_dir_all(f.ws.dir().join(".terraform")).unwrap();
    }

    fn assert_precondition(err: ProvisionError, expected_missing: &str) {
        match err {
            ProvisionError::Precondition { missing, .. } => assert_eq!(missing, expected_missing),
            other => panic!("expected precondition error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn apply_without_generate_launches_nothing() {
        let f = fixture();
        let err = f.lifecycle.apply(&f.ws).await.unwrap_err();
        assert_precondition(err, "main.tf");
        assert!(f.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn plan_without_generate_is_precondition_error() {
        let f = fixture();
        assert_precondition(f.lifecycle.plan(&f.ws).await.unwrap_err(), "main.tf");
        assert!(f.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn plan_without_init_is_precondition_error() {
        let f = fixture();
        generated(&f);
        assert_precondition(f.lifecycle.plan(&f.ws).await.unwrap_err(), ".terraform");
        assert!(f.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn configure_before_apply_names_inventory() {
        let f = fixture();
        initialized(&f);
        let err = f.lifecycle.configure_database(&f.ws).await.unwrap_err();
        assert!(err.to_string().contains("inventory.ini"));
        assert_precondition(err, "inventory.ini");
        assert!(f.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn init_runs_terraform_in_workspace() {
        let f = fixture();
        generated(&f);
        f.runner.reply(0, "Terraform has been successfully initialized!", "");
        let out = f.lifecycle.init(&f.ws).await.unwrap();
        assert_eq!(out.step, Step::Init);
        assert!(out.stdout.contains("successfully initialized"));

        let calls = f.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "terraform");
        assert_eq!(calls[0].args[0], "init");
        assert_eq!(calls[0].cwd, f.ws.dir());
    }

    #[tokio::test]
    async fn plan_returns_plan_text() {
        let f = fixture();
        initialized(&f);
        f.runner.reply(0, "Plan: 4 to add, 0 to change, 0 to destroy.", "");
        let out = f.lifecycle.plan(&f.ws).await.unwrap();
        assert_eq!(out.stdout, "Plan: 4 to add, 0 to change, 0 to destroy.");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn failed_plan_carries_exit_code_and_stderr() {
        let f = fixture();
        initialized(&f);
        f.runner.reply(1, "", "Error: No valid credential sources found");
        match f.lifecycle.plan(&f.ws).await.unwrap_err() {
            ProvisionError::ProcessExit {
                program,
                exit_code,
                stderr,
            } => {
                assert_eq!(program, "terraform");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "Error: No valid credential sources found");
            }
            other => panic!("expected process exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_failure_propagates() {
        let f = fixture();
        generated(&f);
        f.runner.fail_launch("terraform");
        let err = f.lifecycle.init(&f.ws).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ProcessLaunch { .. }));
    }

    #[tokio::test]
    async fn apply_writes_inventory_from_outputs() {
        let f = fixture();
        initialized(&f);
        f.runner.reply(0, "Apply complete! Resources: 4 added.", "");
        f.runner.reply(0, OUTPUTS, "");

        let out = f.lifecycle.apply(&f.ws).await.unwrap();
        assert!(out.stdout.starts_with("Apply complete!"));
        assert!(workspace::has_inventory(&f.ws));

        let ini = std::fs::read_to_string(f.ws.inventory_file()).unwrap();
        assert!(ini.contains("[primary]\n10.0.0.1 "));
        assert!(ini.contains("10.0.0.3 ansible_user=ubuntu"));

        let calls = f.runner.calls();
        assert_eq!(
            calls[0].args,
            vec!["apply", "-auto-approve", "-input=false", "-no-color"]
        );
        assert_eq!(calls[1].args, vec!["output", "-json"]);
    }

    #[tokio::test]
    async fn failed_apply_leaves_no_inventory() {
        let f = fixture();
        initialized(&f);
        std::fs::write(f.ws.inventory_file(), "[primary]\nstale\n").unwrap();
        f.runner.reply(1, "", "Error: VcpuLimitExceeded");

        let err = f.lifecycle.apply(&f.ws).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ProcessExit { exit_code: 1, .. }));
        assert!(!workspace::has_inventory(&f.ws));
        assert_eq!(f.runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn apply_without_addresses_is_inventory_error() {
        let f = fixture();
        initialized(&f);
        f.runner.reply(0, "Apply complete!", "");
        f.runner.reply(
            0,
            r#"{"primary_ip":{"value":null},"replica_ips":{"value":[]}}"#,
            "",
        );
        let err = f.lifecycle.apply(&f.ws).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Inventory(_)));
        assert!(!workspace::has_inventory(&f.ws));
    }

    #[tokio::test]
    async fn configure_runs_playbook_against_inventory() {
        let mut config = Config::default();
        config.ansible.private_key_path = Some("/keys/pg.pem".into());
        let f = fixture_with(config);
        initialized(&f);
        std::fs::write(f.ws.inventory_file(), "[primary]\n10.0.0.1\n").unwrap();
        f.runner.reply(0, "PLAY RECAP", "[WARNING]: deprecated");

        let out = f.lifecycle.configure_database(&f.ws).await.unwrap();
        assert_eq!(out.stdout, "PLAY RECAP");
        assert_eq!(out.stderr, "[WARNING]: deprecated");

        let call = &f.runner.calls()[0];
        assert_eq!(call.program, "ansible-playbook");
        assert_eq!(
            call.args,
            vec!["setup.yml", "-i", "inventory.ini", "--private-key", "/keys/pg.pem"]
        );
        assert!(call
            .env
            .contains(&("ANSIBLE_HOST_KEY_CHECKING".into(), "False".into())));
    }

    #[tokio::test]
    async fn configure_failure_passes_stderr_through() {
        let f = fixture();
        initialized(&f);
        std::fs::write(f.ws.inventory_file(), "[primary]\n10.0.0.1\n").unwrap();
        f.runner
            .reply(4, "", "fatal: [10.0.0.1]: UNREACHABLE! => {\"changed\": false}");
        match f.lifecycle.configure_database(&f.ws).await.unwrap_err() {
            ProvisionError::ProcessExit {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 4);
                assert!(stderr.contains("UNREACHABLE!"));
            }
            other => panic!("expected process exit, got {other:?}"),
        }
    }

    #[test]
    fn check_precondition_walks_the_lifecycle() {
        let f = fixture();
        check_precondition(&f.ws, Step::Generate).unwrap();
        assert!(check_precondition(&f.ws, Step::Init).is_err());

        generated(&f);
        check_precondition(&f.ws, Step::Init).unwrap();
        assert!(check_precondition(&f.ws, Step::Plan).is_err());

        std::fs::create_dir_all(f.ws.dir().join(".terraform")).unwrap();
        check_precondition(&f.ws, Step::Plan).unwrap();
        check_precondition(&f.ws, Step::Apply).unwrap();
        assert!(check_precondition(&f.ws, Step::ConfigureDatabase).is_err());

        std::fs::write(f.ws.inventory_file(), "").unwrap();
        check_precondition(&f.ws, Step::ConfigureDatabase).unwrap();
    }

    #[tokio::test]
    async fn configured_binaries_are_used() {
        let mut config = Config::default();
        config.tools.terraform = "/opt/tf/terraform".into();
        let f = fixture_with(config);
        generated(&f);
        f.lifecycle.init(&f.ws).await.unwrap();
        assert_eq!(f.runner.calls()[0].program, "/opt/tf/terraform");
    }
}
