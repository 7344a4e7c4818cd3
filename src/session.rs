use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

const MARKER: char = '-';

/// Encode a working directory the way Claude Code names its project folders:
/// `/Users/a/b` becomes `-Users-a-b`. One-way; applying it twice is not a no-op.
pub fn pwd_to_session_id(path: &str) -> String {
    let trimmed = path
        .strip_prefix('/')
        .or_else(|| path.strip_prefix('\\'))
        .unwrap_or(path);

    let mut id = String::with_capacity(trimmed.len() + 1);
    id.push(MARKER);
    for c in trimmed.chars() {
        if c == '/' || c == '\\' {
            id.push(MARKER);
        } else {
            id.push(c);
        }
    }
    id
}

/// A project folder found under the Claude projects directory.
#[derive(Debug, Clone, Serialize)]
pub struct LocalSession {
    pub session_id: String,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

/// Result of matching the working directory against local sessions.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub session_id: String,
    #[serde(rename = "match")]
    pub matched: bool,
}

/// List session folders, most recently modified first. Only directory
/// metadata is read. A missing directory yields an empty list.
pub fn list_local_sessions(projects_dir: &Path) -> Vec<LocalSession> {
    let entries = match std::fs::read_dir(projects_dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut sessions: Vec<LocalSession> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| LocalSession {
            session_id: entry.file_name().to_string_lossy().to_string(),
            modified: entry.metadata().and_then(|m| m.modified()).ok(),
        })
        .collect();

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    sessions
}

pub fn find_recommended_session(cwd: &Path, projects_dir: &Path) -> Recommendation {
    let session_id = pwd_to_session_id(&cwd.to_string_lossy());
    let matched = list_local_sessions(projects_dir)
        .iter()
        .any(|s| s.session_id == session_id);

    Recommendation {
        session_id,
        matched,
    }
}
