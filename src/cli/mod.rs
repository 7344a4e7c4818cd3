pub mod commit;
pub mod config;
pub mod costs;
pub mod prepare;

use std::path::{Path, PathBuf};

use crate::config::{load_config, ConfigError};
use crate::session::{find_recommended_session, list_local_sessions};
use crate::usage::ccusage::CcusageSource;
use crate::usage::transcript::TranscriptSource;
use crate::usage::{TieredGateway, UsageSource};

const RECENT_SESSIONS: usize = 5;

/// Directories an action works against.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub project_dir: PathBuf,
    /// `<claude-dir>/projects`, if a Claude data directory could be located.
    pub projects_dir: Option<PathBuf>,
}

impl Workspace {
    /// Session folder names, newest first, for manual selection.
    pub fn recent_sessions(&self) -> Vec<String> {
        self.projects_dir
            .as_deref()
            .map(list_local_sessions)
            .unwrap_or_default()
            .into_iter()
            .take(RECENT_SESSIONS)
            .map(|s| s.session_id)
            .collect()
    }
}

/// Production gateway: local transcripts first, ccusage as the fallback.
pub fn build_gateway(projects_dir: Option<&Path>, ccusage: Option<String>) -> TieredGateway {
    let mut sources: Vec<Box<dyn UsageSource>> = Vec::new();
    if let Some(dir) = projects_dir {
        sources.push(Box::new(TranscriptSource::new(dir)));
    }
    sources.push(Box::new(CcusageSource::new(ccusage)));
    let gateway = TieredGateway::new(sources);
    tracing::debug!(primary = ?gateway.primary_source(), "usage gateway");
    gateway
}

/// How a session id was chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Argument(String),
    Config(String),
    Detected { session_id: String, matched: bool },
}

impl Resolution {
    pub fn session_id(&self) -> &str {
        match self {
            Resolution::Argument(id) | Resolution::Config(id) => id,
            Resolution::Detected { session_id, .. } => session_id,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Resolution::Argument(_) => "argument",
            Resolution::Config(_) => "config",
            Resolution::Detected { .. } => "auto",
        }
    }
}

/// Explicit argument, then saved config, then the working-directory heuristic.
pub fn resolve_session(
    workspace: &Workspace,
    explicit: Option<&str>,
) -> Result<Resolution, ConfigError> {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return Ok(Resolution::Argument(id.to_string()));
    }

    if let Some(config) = load_config(&workspace.project_dir)? {
        return Ok(Resolution::Config(config.session_id));
    }

    let (session_id, matched) = match &workspace.projects_dir {
        Some(dir) => {
            let rec = find_recommended_session(&workspace.project_dir, dir);
            (rec.session_id, rec.matched)
        }
        None => (
            crate::session::pwd_to_session_id(&workspace.project_dir.to_string_lossy()),
            false,
        ),
    };
    tracing::debug!(session_id = %session_id, matched, "detected session from working directory");

    Ok(Resolution::Detected {
        session_id,
        matched,
    })
}
