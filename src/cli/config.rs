use serde_json::json;

use crate::config::{config_path, load_config, save_config};
use crate::output::Envelope;
use crate::usage::UsageGateway;

use super::Workspace;

/// Persist an explicitly chosen session id for later invocations.
pub fn save(workspace: &Workspace, session_id: Option<&str>) -> Envelope {
    let Some(session_id) = session_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return Envelope::error("sessionId parameter required");
    };

    match save_config(&workspace.project_dir, session_id) {
        Ok(path) => Envelope::success(
            json!({ "session_id": session_id, "config_path": path }),
            format!("Saved session {session_id}"),
        ),
        Err(e) => Envelope::error(e.to_string()),
    }
}

/// Report the saved config and whether its session is visible to the gateway.
pub fn check(workspace: &Workspace, gateway: &dyn UsageGateway) -> Envelope {
    let path = config_path(&workspace.project_dir);

    match load_config(&workspace.project_dir) {
        Ok(Some(config)) => {
            let check = gateway.verify_session_exists(&config.session_id);
            let message = if check.exists {
                format!("Using saved session {}", config.session_id)
            } else {
                format!("Saved session {} is not available", config.session_id)
            };
            Envelope::success(
                json!({
                    "configured": true,
                    "session_id": config.session_id,
                    "config_path": path,
                    "session_exists": check.exists,
                    "session_error": check.error,
                }),
                message,
            )
        }
        Ok(None) => Envelope::success(
            json!({
                "configured": false,
                "config_path": path,
                "recent_sessions": workspace.recent_sessions(),
            }),
            "No saved session; the session will be detected from the working directory",
        ),
        Err(e) => Envelope::error(e.to_string()),
    }
}
