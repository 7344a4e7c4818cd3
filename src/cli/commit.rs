use serde_json::{json, Value};

use crate::config::{load_config, ConfigError};
use crate::costs::{round2, validate_cost_metrics, ModelCost};
use crate::git::GitClient;
use crate::output::{Envelope, Status};
use crate::trailer::{build_commit_message, CommitMessage};

use super::Workspace;

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub message: String,
    pub session_id: Option<String>,
    /// Raw `--costs` JSON, as printed by `prepare`.
    pub costs: Option<String>,
}

/// Session id for `commit`: the explicit argument, else the saved config.
/// A config that exists but cannot be used is an error.
pub fn session_for_commit(
    workspace: &Workspace,
    explicit: Option<String>,
) -> Result<Option<String>, ConfigError> {
    match explicit {
        Some(id) => Ok(Some(id)),
        None => Ok(load_config(&workspace.project_dir)?.map(|c| c.session_id)),
    }
}

/// Build the annotated message, commit the staged tree and verify the result.
pub fn run(request: &CommitRequest, git: &dyn GitClient) -> Envelope {
    match commit(request, git) {
        Ok(envelope) => envelope,
        Err(e) => Envelope::error(e.to_string()),
    }
}

fn commit(request: &CommitRequest, git: &dyn GitClient) -> anyhow::Result<Envelope> {
    let message = CommitMessage::parse(&request.message);
    if message.subject.is_empty() {
        return Ok(Envelope::error("Commit message subject required"));
    }

    let session_id = match request.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => return Ok(Envelope::error("Session ID not provided")),
    };

    let costs_value = match request.costs.as_deref() {
        None => return Ok(Envelope::error("Cost metrics not provided")),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(v) => v,
            Err(_) => return Ok(Envelope::error("Invalid JSON in costs argument")),
        },
    };

    if !validate_cost_metrics(&costs_value) {
        return Ok(metrics_invalid(costs_value, "Cost metrics failed validation"));
    }

    // Validated entries always decode: numeric fields are read leniently.
    let mut costs: Vec<ModelCost> = serde_json::from_value(costs_value)?;
    for cost in &mut costs {
        cost.cost = round2(cost.cost);
    }

    let full_message = build_commit_message(&message, session_id, &costs)?;

    let output = match git.commit(&full_message) {
        Ok(o) => o,
        Err(e) => return Ok(git_error("git commit could not be run", e.to_string())),
    };
    if !output.success {
        return Ok(git_error("git commit failed", output.stderr.trim().to_string()));
    }

    let Some(commit_sha) = git.head_sha() else {
        return Ok(git_error("Failed to retrieve commit SHA", String::new()));
    };

    match git.staged_files() {
        Ok(staged) if !staged.is_empty() => {
            return Ok(Envelope::new(
                Status::GitError,
                json!({ "commit_sha": commit_sha, "staged_files": staged }),
                "Commit created but changes still staged",
            ));
        }
        Ok(_) => {}
        Err(e) => return Ok(git_error("Failed to check staged changes", e.to_string())),
    }

    tracing::info!(commit_sha = %commit_sha, session_id, "committed with cost metrics");

    let short = commit_sha.chars().take(7).collect::<String>();
    Ok(Envelope::success(
        json!({ "commit_sha": commit_sha, "session_id": session_id }),
        format!("Committed {short}"),
    ))
}

fn metrics_invalid(attempted: Value, message: impl Into<String>) -> Envelope {
    Envelope::new(
        Status::MetricsInvalid,
        json!({ "attempted_costs": attempted }),
        message,
    )
}

fn git_error(message: &str, stderr: String) -> Envelope {
    Envelope::new(Status::GitError, json!({ "stderr": stderr }), message)
}
