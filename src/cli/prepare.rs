use serde_json::json;

use crate::costs::{get_session_costs, validate_cost_metrics};
use crate::git::GitClient;
use crate::output::{Envelope, Status};
use crate::usage::UsageGateway;

use super::{resolve_session, Resolution, Workspace};

/// Resolve the session, fetch its costs and validate them.
pub fn run(
    workspace: &Workspace,
    session_id: Option<&str>,
    gateway: &dyn UsageGateway,
    git: &dyn GitClient,
) -> Envelope {
    match prepare(workspace, session_id, gateway, git) {
        Ok(envelope) => envelope,
        Err(e) => Envelope::error(e.to_string()),
    }
}

fn prepare(
    workspace: &Workspace,
    session_id: Option<&str>,
    gateway: &dyn UsageGateway,
    git: &dyn GitClient,
) -> anyhow::Result<Envelope> {
    let resolution = match resolve_session(workspace, session_id) {
        Ok(r) => r,
        Err(e) => return Ok(Envelope::error(e.to_string())),
    };

    if let Resolution::Detected {
        session_id,
        matched: false,
    } = &resolution
    {
        return Ok(Envelope::new(
            Status::NotFound,
            json!({
                "calculated_session_id": session_id,
                "recent_sessions": workspace.recent_sessions(),
            }),
            format!(
                "No Claude session found for this directory (looked for {session_id}). \
                 Pick one and run `save-config --session-id <id>`."
            ),
        ));
    }

    let session_id = resolution.session_id();

    let costs = match get_session_costs(gateway, session_id) {
        Ok(c) => c,
        Err(e) => return Ok(Envelope::error(e.to_string())),
    };

    let costs_value = serde_json::to_value(&costs)?;
    if !validate_cost_metrics(&costs_value) {
        return Ok(Envelope::new(
            Status::InvalidCosts,
            json!({
                "session_id": session_id,
                "costs": costs_value,
            }),
            "Session has no usable cost metrics",
        ));
    }

    let previous = git.previous_cost_metrics();

    Ok(Envelope::success(
        json!({
            "session_id": session_id,
            "current_cost": costs_value,
            "previous_cost": previous,
            "source": resolution.source(),
        }),
        format!("Cost metrics ready for session {session_id}"),
    ))
}
