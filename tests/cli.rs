#![allow(deprecated)]
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const COSTS: &str =
    r#"[{"model":"claude-sonnet-4","inputTokens":150,"outputTokens":75,"cost":0.15}]"#;

struct Fixture {
    project: TempDir,
    claude: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            project: TempDir::new().unwrap(),
            claude: TempDir::new().unwrap(),
        };
        git(fixture.project.path(), &["init", "-q"]);
        git(fixture.project.path(), &["config", "user.email", "dev@example.com"]);
        git(fixture.project.path(), &["config", "user.name", "Dev"]);
        git(fixture.project.path(), &["config", "commit.gpgsign", "false"]);
        fixture
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("write-git-commit").unwrap();
        cmd.current_dir(self.project.path())
            .env("CLAUDE_PROJECT_DIR", self.project.path())
            .env("CLAUDE_CONFIG_DIR", self.claude.path())
            .env("CCUSAGE_BIN", "write-git-commit-no-such-ccusage")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run the binary and parse its stdout envelope.
    fn run(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().unwrap();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn stage(&self, name: &str, content: &str) {
        std::fs::write(self.project.path().join(name), content).unwrap();
        git(self.project.path(), &["add", name]);
    }

    fn transcript(&self, session_id: &str, lines: &[&str]) {
        let dir = self.claude.path().join("projects").join(session_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("conversation.jsonl"), lines.join("\n")).unwrap();
    }
}

fn git_available() -> bool {
    which::which("git").is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("write-git-commit")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare"))
        .stdout(predicate::str::contains("commit"));
}

#[test]
fn unknown_command_is_error_envelope() {
    Command::cargo_bin("write-git-commit")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status": "error""#));
}

#[test]
fn commit_with_nothing_staged_is_git_error() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();

    fx.cmd()
        .args(["commit", "--session-id", "-s", "--costs", COSTS, "-m", "feat: nothing"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "git_error""#));
}

#[test]
fn commit_with_empty_costs_is_metrics_invalid() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.stage("a.txt", "a");

    let out = fx.run(&["commit", "--session-id", "-s", "--costs", "[]", "-m", "feat: a"]);
    assert_eq!(out["status"], "metrics_invalid");
    assert_eq!(out["data"]["attempted_costs"], json!([]));
}

#[test]
fn commit_reads_message_from_stdin() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.stage("a.txt", "a");

    fx.cmd()
        .args(["commit", "--session-id", "-s", "--costs", COSTS])
        .write_stdin("feat: from stdin\n\nBody text\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "success""#));
}

#[test]
fn commit_then_previous_costs() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();

    let out = fx.run(&["previous-costs"]);
    assert_eq!(out["status"], "success");
    assert_eq!(out["data"]["previous_cost"], json!([]));

    fx.stage("a.txt", "a");
    let out = fx.run(&["commit", "--session-id", "-s", "--costs", COSTS, "-m", "feat: a"]);
    assert_eq!(out["status"], "success");
    assert_eq!(out["data"]["commit_sha"].as_str().unwrap().len(), 40);

    let out = fx.run(&["previous-costs"]);
    assert_eq!(out["data"]["previous_cost"], serde_json::from_str::<Value>(COSTS).unwrap());
}

#[test]
fn commit_uses_saved_session() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.run(&["save-config", "--session-id", "-saved"]);
    fx.stage("a.txt", "a");

    let out = fx.run(&["commit", "--costs", COSTS, "-m", "feat: a"]);
    assert_eq!(out["status"], "success");
    assert_eq!(out["data"]["session_id"], "-saved");
}

#[test]
fn commit_with_broken_config_reports_config_error() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.project.path().join(".claude")).unwrap();
    std::fs::write(
        fx.project
            .path()
            .join(".claude/settings.plugins.write-git-commit.json"),
        "{}",
    )
    .unwrap();
    fx.stage("a.txt", "a");

    fx.cmd()
        .args(["commit", "--costs", COSTS, "-m", "feat: a"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("has no sessionId"))
        .stdout(predicate::str::contains("Session ID not provided").not());
}

#[test]
fn save_then_check_config() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();

    let out = fx.run(&["check-config"]);
    assert_eq!(out["data"]["configured"], false);

    let out = fx.run(&["save-config", "--session-id", "-Users-dev-project"]);
    assert_eq!(out["status"], "success");
    assert!(fx
        .project
        .path()
        .join(".claude/settings.plugins.write-git-commit.json")
        .exists());

    let out = fx.run(&["check-config"]);
    assert_eq!(out["data"]["configured"], true);
    assert_eq!(out["data"]["session_id"], "-Users-dev-project");
    assert_eq!(out["data"]["session_exists"], false);
}

#[test]
fn save_config_without_session_id_fails() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.cmd()
        .arg("save-config")
        .assert()
        .failure()
        .stdout(predicate::str::contains("sessionId parameter required"));
}

#[test]
fn prepare_without_sessions_is_not_found() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();

    let out = fx.run(&["prepare"]);
    assert_eq!(out["status"], "not_found");
    assert!(out["data"]["calculated_session_id"]
        .as_str()
        .unwrap()
        .starts_with('-'));
    assert_eq!(out["data"]["recent_sessions"], json!([]));
}

#[test]
fn prepare_reads_local_transcripts() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.transcript(
        "-proj",
        &[
            r#"{"type":"user","message":{"role":"user","content":"hi"}}"#,
            r#"{"type":"assistant","requestId":"r1","timestamp":"2026-03-01T10:00:00Z","costUSD":0.154,"message":{"id":"m1","model":"claude-sonnet-4","usage":{"input_tokens":150,"output_tokens":75}}}"#,
        ],
    );

    let out = fx.run(&["prepare", "--session-id", "-proj"]);
    assert_eq!(out["status"], "success");
    assert_eq!(out["data"]["source"], "argument");
    assert_eq!(
        out["data"]["current_cost"],
        json!([{"model":"claude-sonnet-4","inputTokens":150,"outputTokens":75,"cost":0.15}])
    );
    assert_eq!(out["data"]["previous_cost"], json!([]));
}

#[test]
fn prepare_unknown_session_is_error() {
    if !git_available() {
        return;
    }
    let fx = Fixture::new();
    fx.transcript("-proj", &[]);

    fx.cmd()
        .args(["prepare", "--session-id", "-missing"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Session not found: -missing"));
}
