#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pgprov(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pgprov").unwrap();
    cmd.current_dir(dir.path()).env("PGPROV_ROOT", dir.path());
    cmd
}

// ---------------------------------------------------------------------------
// pgprov generate
// ---------------------------------------------------------------------------

#[test]
fn generate_writes_both_artifacts() {
    let dir = TempDir::new().unwrap();
    pgprov(&dir)
        .args(["generate", "--num-replicas", "2", "--max-connections", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main.tf"));

    let tf = std::fs::read_to_string(dir.path().join("output/main.tf")).unwrap();
    assert!(tf.contains("postgres_replica_2"));
    let yml = std::fs::read_to_string(dir.path().join("output/setup.yml")).unwrap();
    assert!(yml.contains("max_connections: 200"));
}

#[test]
fn generate_json_lists_files() {
    let dir = TempDir::new().unwrap();
    let out = pgprov(&dir)
        .args(["--json", "generate"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["workspace"], "default");
    assert_eq!(json["files"].as_array().unwrap().len(), 2);
}

#[test]
fn generate_rejects_invalid_shared_buffers() {
    let dir = TempDir::new().unwrap();
    pgprov(&dir)
        .args(["generate", "--shared-buffers", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shared_buffers"));
    assert!(!dir.path().join("output/main.tf").exists());
}

#[test]
fn generate_honours_output_dir_from_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pgprov.yaml"), "output_dir: rendered\n").unwrap();
    pgprov(&dir).arg("generate").assert().success();
    assert!(dir.path().join("rendered/main.tf").is_file());
    assert!(dir.path().join("rendered/setup.yml").is_file());
}

// ---------------------------------------------------------------------------
// pgprov status
// ---------------------------------------------------------------------------

#[test]
fn status_tracks_generate() {
    let dir = TempDir::new().unwrap();
    let out = pgprov(&dir).args(["status", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["rendered"], false);
    assert_eq!(json["next_step"], "generate");

    pgprov(&dir).arg("generate").assert().success();

    let out = pgprov(&dir).args(["status", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["rendered"], true);
    assert_eq!(json["next_step"], "init");
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[test]
fn apply_before_generate_fails() {
    let dir = TempDir::new().unwrap();
    pgprov(&dir)
        .arg("apply")
        .assert()
        .failure()
        .stderr(predicate::str::contains("run 'generate' first"));
}

#[test]
fn configure_before_apply_names_inventory() {
    let dir = TempDir::new().unwrap();
    pgprov(&dir).arg("generate").assert().success();
    pgprov(&dir)
        .arg("configure")
        .assert()
        .failure()
        .stderr(predicate::str::contains("inventory.ini"));
}

// ---------------------------------------------------------------------------
// Tool-backed steps
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn fake_terraform(dir: &TempDir) {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.path().join("fake-terraform");
    std::fs::write(
        &script,
        "#!/bin/sh\ncase \"$1\" in\n  init) mkdir -p .terraform; echo initialized ;;\n  plan) echo 'Plan: 3 to add' ;;\n  *) echo \"boom: $1\" >&2; exit 3 ;;\nesac\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::write(
        dir.path().join("pgprov.yaml"),
        format!("tools:\n  terraform: {}\n", script.display()),
    )
    .unwrap();
}

#[cfg(unix)]
#[test]
fn init_and_plan_run_configured_terraform() {
    let dir = TempDir::new().unwrap();
    fake_terraform(&dir);
    pgprov(&dir).arg("generate").assert().success();

    pgprov(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));
    assert!(dir.path().join("output/.terraform").is_dir());

    pgprov(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan: 3 to add"));
}

#[cfg(unix)]
#[test]
fn failing_tool_surfaces_exit_code_and_stderr() {
    let dir = TempDir::new().unwrap();
    fake_terraform(&dir);
    pgprov(&dir).arg("generate").assert().success();
    pgprov(&dir).arg("init").assert().success();

    pgprov(&dir)
        .arg("apply")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exited with code 3"))
        .stderr(predicate::str::contains("boom: apply"));
    assert!(!dir.path().join("output/inventory.ini").exists());
}

// ---------------------------------------------------------------------------
// pgprov doctor
// ---------------------------------------------------------------------------

#[test]
fn doctor_reports_missing_tools() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("pgprov.yaml"),
        "tools:\n  terraform: /nonexistent/terraform\n  ansible_playbook: /nonexistent/ansible-playbook\n",
    )
    .unwrap();
    pgprov(&dir)
        .arg("doctor")
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing"))
        .stderr(predicate::str::contains("not found"));
}
