use serde_json::json;

use crate::costs::{get_session_costs, sum_breakdowns};
use crate::git::GitClient;
use crate::output::{Envelope, Status};
use crate::usage::UsageGateway;

use super::{resolve_session, Resolution, Workspace};

/// Cost breakdown for a session: aggregated with subagents, or the session's
/// own breakdowns with `main_only`.
pub fn show(
    workspace: &Workspace,
    session_id: Option<&str>,
    main_only: bool,
    gateway: &dyn UsageGateway,
) -> Envelope {
    let resolution = match resolve_session(workspace, session_id) {
        Ok(r) => r,
        Err(e) => return Envelope::error(e.to_string()),
    };
    if let Resolution::Detected {
        session_id,
        matched: false,
    } = &resolution
    {
        return Envelope::new(
            Status::NotFound,
            json!({ "calculated_session_id": session_id }),
            format!("No Claude session found for {session_id}"),
        );
    }
    let session_id = resolution.session_id();

    let costs = if main_only {
        gateway
            .fetch_session_costs(session_id)
            .map(|breakdowns| sum_breakdowns(&breakdowns))
            .map_err(|e| e.to_string())
    } else {
        get_session_costs(gateway, session_id).map_err(|e| e.to_string())
    };

    match costs {
        Ok(costs) => Envelope::success(
            json!({ "session_id": session_id, "costs": costs, "main_only": main_only }),
            format!("{} model(s)", costs.len()),
        ),
        Err(message) => Envelope::error(message),
    }
}

/// Cost array from the most recent commit carrying a cost trailer.
pub fn previous(git: &dyn GitClient) -> Envelope {
    let previous = git.previous_cost_metrics();
    let message = if previous.is_empty() {
        "No previous cost metrics found"
    } else {
        "Found previous cost metrics"
    };
    Envelope::success(json!({ "previous_cost": previous }), message)
}
