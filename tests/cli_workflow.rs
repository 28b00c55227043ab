//! End-to-end tests of the stagehand binary
//!
//! Every test gets its own STAGEHAND_HOME and a working directory with a
//! `.git` marker, so config discovery never wanders outside the sandbox.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[project]
name = "ACME warehouse"

[[connections]]
name = "ora_src"
kind = "oracle"

[[connections]]
name = "landing"
kind = "flat_file"

[[jobs]]
name = "m_load_orders"
tier = "low"
pattern = "Simple Load"

[[jobs]]
name = "m_agg_sales"
tier = "medium"
pattern = "Aggregation"

[[jobs]]
name = "m_custom_java"
tier = "high"
pattern = "Java Transformation"
custom_code = true
"#;

struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("work/.git")).unwrap();
        std::fs::create_dir_all(root.path().join("home")).unwrap();
        std::fs::create_dir_all(root.path().join("xdg")).unwrap();
        std::fs::write(root.path().join("work/migration.toml"), MANIFEST).unwrap();
        Self { root }
    }

    fn work(&self) -> std::path::PathBuf {
        self.root.path().join("work")
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stagehand"));
        cmd.current_dir(self.work())
            .env("STAGEHAND_HOME", self.root.path().join("home"))
            .env("XDG_CONFIG_HOME", self.root.path().join("xdg"))
            .env("HOME", self.root.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .args(args);
        cmd
    }

    fn ok(&self, args: &[&str]) {
        self.cmd(args).assert().success();
    }

    fn init(&self) {
        self.cmd(&["init", "acme-dw", "--manifest", "migration.toml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created project 'acme-dw'"));
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.cmd(args).output().unwrap();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Walk a fresh project into the conversion stage.
    fn into_conversion(&self) {
        self.init();
        self.ok(&["complete", "acme-dw"]);
        self.ok(&["advance", "acme-dw"]);
        self.ok(&["test-connection", "acme-dw", "ora_src", "--passed"]);
        self.ok(&["complete", "acme-dw"]);
        self.ok(&["advance", "acme-dw"]);
        self.ok(&["complete", "acme-dw"]);
        self.cmd(&["advance", "acme-dw"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Started Conversion"))
            .stdout(predicate::str::contains("Planned 3 waves for 3 jobs"));
    }
}

fn state_file(sandbox: &Sandbox) -> std::path::PathBuf {
    sandbox.root.path().join("home/projects/acme-dw/state.json")
}

#[test]
fn test_init_creates_state_and_rejects_duplicates() {
    let sandbox = Sandbox::new();
    sandbox.init();
    assert!(state_file(&sandbox).is_file());

    sandbox
        .cmd(&["init", "acme-dw", "--manifest", "migration.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_with_bad_manifest() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.work().join("dup.toml"),
        "[[jobs]]\nname = \"a\"\ntier = \"low\"\npattern = \"x\"\n\n[[jobs]]\nname = \"a\"\ntier = \"high\"\npattern = \"y\"\n",
    )
    .unwrap();
    sandbox
        .cmd(&["init", "acme-dw", "--manifest", "dup.toml"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("more than once"));
    assert!(!state_file(&sandbox).exists());
}

#[test]
fn test_unknown_project_and_bad_id() {
    let sandbox = Sandbox::new();
    sandbox.cmd(&["status", "ghost"]).assert().code(2);
    sandbox.cmd(&["advance", "../escape"]).assert().code(2);
}

#[test]
fn test_advance_before_complete_is_invalid_transition() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox
        .cmd(&["advance", "acme-dw"])
        .assert()
        .code(4);
}

#[test]
fn test_gate_blocks_until_required_connection_passes() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox.ok(&["complete", "acme-dw"]);
    sandbox.ok(&["advance", "acme-dw"]);

    sandbox
        .cmd(&["gate", "acme-dw"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("✗"))
        .stdout(predicate::str::contains("Failure reasons:"))
        .stdout(predicate::str::contains("ora_src"));

    let output = sandbox.cmd(&["gate", "acme-dw", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let gate: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(gate["passed"], false);
    assert_eq!(gate["stage"], "analysis");

    sandbox
        .cmd(&["test-connection", "acme-dw", "ora_src", "--failed", "--message", "ORA-12541"])
        .assert()
        .success()
        .stdout(predicate::str::contains("analysis stays blocked"));
    sandbox.cmd(&["complete", "acme-dw"]).assert().code(3);

    sandbox.ok(&["test-connection", "acme-dw", "ora_src", "--passed"]);
    sandbox.ok(&["gate", "acme-dw"]);
    sandbox
        .cmd(&["complete", "acme-dw", "--metric", "sources_profiled=2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed Source Analysis"));

    let status = sandbox.json(&["status", "acme-dw", "--json"]);
    assert_eq!(status["stages"][1]["metrics"]["sources_profiled"], 2);
}

#[test]
fn test_unknown_connection_is_invalid_input() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox
        .cmd(&["test-connection", "acme-dw", "nope", "--passed"])
        .assert()
        .code(6);
}

#[test]
fn test_progress_never_decreases() {
    let sandbox = Sandbox::new();
    sandbox.init();
    sandbox.ok(&["complete", "acme-dw"]);
    sandbox.ok(&["advance", "acme-dw"]);
    sandbox.ok(&["test-connection", "acme-dw", "ora_src", "--passed"]);
    sandbox.ok(&["complete", "acme-dw"]);
    sandbox.ok(&["advance", "acme-dw"]);

    sandbox.ok(&["progress", "acme-dw", "40", "--message", "profiling"]);
    sandbox.ok(&["progress", "acme-dw", "40"]);
    sandbox.cmd(&["progress", "acme-dw", "10"]).assert().code(4);
}

#[test]
fn test_full_migration() {
    let sandbox = Sandbox::new();
    sandbox.into_conversion();

    // The high tier wave is not converting yet.
    sandbox
        .cmd(&["convert", "acme-dw", "m_custom_java", "--score", "55"])
        .assert()
        .code(4);
    sandbox
        .cmd(&["convert", "acme-dw", "m_load_orders", "--score", "120"])
        .assert()
        .code(6);

    let job = sandbox.json(&["convert", "acme-dw", "m_load_orders", "--score", "96", "--json"]);
    assert_eq!(job["wave"], 1);
    assert_eq!(job["badge"], "success");
    sandbox
        .cmd(&["convert", "acme-dw", "m_agg_sales", "--score", "78", "--warning", "implicit cast"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning: implicit cast"));
    sandbox
        .cmd(&["convert", "acme-dw", "m_custom_java", "--score", "55"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Needs manual review: Contains custom code"));

    sandbox
        .cmd(&["gate", "acme-dw"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("m_custom_java").or(predicate::str::contains("review")));

    sandbox
        .cmd(&["review", "acme-dw", "m_custom_java"])
        .assert()
        .success()
        .stdout(predicate::str::contains("implement"));
    sandbox.ok(&["review", "acme-dw", "m_custom_java"]);
    sandbox
        .cmd(&["review", "acme-dw", "m_custom_java"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Manual review complete"));
    sandbox
        .cmd(&["review", "acme-dw", "m_custom_java"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already completed"));
    sandbox
        .cmd(&["review", "acme-dw", "m_custom_java", "--strict"])
        .assert()
        .code(5);
    sandbox
        .cmd(&["review", "acme-dw", "m_load_orders"])
        .assert()
        .code(5);

    sandbox.ok(&["complete", "acme-dw"]);
    sandbox.ok(&["advance", "acme-dw"]);

    sandbox.ok(&["validate", "acme-dw", "m_load_orders", "--passed"]);
    sandbox.ok(&["validate", "acme-dw", "m_agg_sales", "--failed", "--detail", "row count drift"]);
    sandbox.cmd(&["gate", "acme-dw"]).assert().code(3);
    sandbox
        .cmd(&["validate", "acme-dw", "m_custom_java", "--passed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validated 3/3"));
    sandbox.ok(&["validate", "acme-dw", "m_agg_sales", "--passed"]);

    sandbox.ok(&["complete", "acme-dw"]);
    sandbox
        .cmd(&["advance", "acme-dw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started Completion"));
    sandbox.ok(&["complete", "acme-dw"]);
    sandbox.cmd(&["advance", "acme-dw"]).assert().code(4);

    let summary = sandbox.json(&["report", "acme-dw", "--json"]);
    assert_eq!(summary["total_jobs"], 3);
    assert_eq!(summary["converted_jobs"], 3);
    assert_eq!(summary["manual_jobs"], 1);
    assert_eq!(summary["manual_completed"], 1);
    assert_eq!(summary["validation_pass_rate"], 100.0);

    let status = sandbox.json(&["status", "acme-dw", "--json"]);
    assert_eq!(status["current_stage"], "completion");
    assert_eq!(status["overall_progress"], 100);

    sandbox
        .cmd(&["report", "acme-dw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ACME warehouse"));
}

#[test]
fn test_lock_held_by_another_writer() {
    let sandbox = Sandbox::new();
    sandbox.init();

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let lock = serde_json::json!({
        "pid": 4242,
        "created_at": now,
        "project_id": "acme-dw",
        "version": "1.0.0",
    });
    let lock_path = sandbox.root.path().join("home/projects/acme-dw/project.lock");
    std::fs::write(&lock_path, lock.to_string()).unwrap();

    sandbox
        .cmd(&["complete", "acme-dw"])
        .assert()
        .code(9)
        .stderr(predicate::str::contains("Wait for the other command"));

    // Readers never take the lock.
    sandbox.ok(&["status", "acme-dw"]);

    sandbox
        .cmd(&["complete", "acme-dw", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed Project Setup"));
    assert!(!Path::new(&lock_path).exists());
}

#[test]
fn test_config_file_is_discovered_and_validated() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.work().join(".stagehand")).unwrap();
    std::fs::write(
        sandbox.work().join(".stagehand/config.toml"),
        "[waves]\noptimization_ratio = 0.25\n",
    )
    .unwrap();
    sandbox.init();

    let status = sandbox.json(&["status", "acme-dw", "--json"]);
    let ratio = &status["effective_config"]["waves.optimization_ratio"];
    assert_eq!(ratio["source"], "config");
    assert_eq!(ratio["value"], "0.25");

    sandbox
        .cmd(&["status", "acme-dw", "--optimization-ratio", "0.5", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source\":\"cli\""));

    std::fs::write(
        sandbox.work().join(".stagehand/config.toml"),
        "[waves]\nunknown_key = 1\n",
    )
    .unwrap();
    sandbox.cmd(&["status", "acme-dw"]).assert().code(2);
}
