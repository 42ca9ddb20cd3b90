// ABOUTME: Integration tests for the stackplan CLI commands.
// ABOUTME: Validates help output, init, validate, order, and an end-to-end run.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn stackplan_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stackplan"))
}

const PROJECT: &str = r#"
provisioner:
  command: [sh, provision.sh]
stacks:
  - name: vpc
    group: network
  - name: app
    group: services
    parameters:
      VpcId: { resolver: stack_output, args: ["vpc::VpcId"] }
  - name: web
    group: services
    dependencies: [app]
"#;

// Succeeds for everything except `create app`; records every call in calls.log.
const PROVISIONER: &str = r#"
cat > /dev/null
echo "$1 $2" >> calls.log
case "$1 $2" in
  "create app") echo "quota exceeded" >&2; exit 1 ;;
  "outputs vpc") echo '{"outputs":{"VpcId":"vpc-123"}}' ;;
  outputs*) echo '{"outputs":{}}' ;;
  *) echo '{"status":"complete"}' ;;
esac
"#;

fn write_project(dir: &Path) {
    fs::write(dir.join("stackplan.yml"), PROJECT).unwrap();
    fs::write(dir.join("provision.sh"), PROVISIONER).unwrap();
}

#[test]
fn help_shows_commands() {
    stackplan_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("drift"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("stackplan.yml");

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(config_path.exists(), "stackplan.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("stacks:"), "Config should list stacks");
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("stackplan.yml");

    fs::write(&config_path, "existing: config").unwrap();

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn validate_reports_cycles() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("stackplan.yml"),
        "stacks:\n  - name: a\n    dependencies: [b]\n  - name: b\n    dependencies: [a]\n",
    )
    .unwrap();

    stackplan_cmd()
        .arg("--project-dir")
        .arg(temp_dir.path())
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn validate_without_config_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn order_prints_generations() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_project(temp_dir.path());

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("order")
        .assert()
        .success()
        .stdout("0: vpc\n1: app\n2: web\n");

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .args(["order", "--reverse"])
        .assert()
        .success()
        .stdout("0: web\n1: app\n2: vpc\n");

    assert!(!temp_dir.path().join("calls.log").exists());
}

#[test]
fn order_for_group_pulls_in_dependencies() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_project(temp_dir.path());

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .args(["--output", "json", "order", "network"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""stacks":["vpc"]"#))
        .stdout(predicate::str::contains("app").not());
}

#[test]
fn create_exit_code_counts_failed_stacks() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_project(temp_dir.path());

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("create")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("network/vpc succeeded"))
        .stdout(predicate::str::contains("services/app failed: create failed"))
        .stdout(predicate::str::contains("quota exceeded"))
        .stdout(predicate::str::contains("services/web skipped"))
        .stderr(predicate::str::contains("3 stack(s), 1 failed"));

    let calls = fs::read_to_string(temp_dir.path().join("calls.log")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls, ["create vpc", "outputs vpc", "create app"]);
}

#[test]
fn missing_provisioner_fails_before_running() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("stackplan.yml"), "stacks:\n  - name: vpc\n").unwrap();

    stackplan_cmd()
        .current_dir(temp_dir.path())
        .arg("launch")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no provisioner configured"));
}
