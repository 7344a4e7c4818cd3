use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "settings.plugins.write-git-commit.json";

/// Saved plugin settings: `<project>/.claude/settings.plugins.write-git-commit.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub session_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config {} has no sessionId", .path.display())]
    MissingSessionId { path: PathBuf },

    #[error("Failed to save config: {0}")]
    Write(String),
}

/// Find the project root by walking up from `start` looking for `.git/`.
/// Falls back to `start` itself if no `.git/` found.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return dir;
        }
        if !dir.pop() {
            return start.to_path_buf();
        }
    }
}

/// Resolve the project directory: an explicit path wins, otherwise the
/// current working directory walked up to its `.git/` root.
pub fn detect_project_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.is_dir(), "project dir is not a directory: {}", path.display());
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    Ok(find_project_root(&cwd))
}

/// Resolve the Claude data directory (`~/.claude` unless overridden).
///
/// `CLAUDE_CONFIG_DIR` may hold a comma-separated list; the first entry is used.
pub fn claude_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let first = path.to_string_lossy();
        let first = first.split(',').next().unwrap_or_default().trim();
        if !first.is_empty() {
            return Some(PathBuf::from(first));
        }
    }
    home::home_dir().map(|home| home.join(".claude"))
}

/// Directory holding one sub-directory per Claude Code project.
pub fn projects_dir(claude_dir: &Path) -> PathBuf {
    claude_dir.join("projects")
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".claude").join(CONFIG_FILE)
}

/// Load the saved config. A missing file is `Ok(None)`; a file that exists
/// but cannot be used is an error.
pub fn load_config(project_dir: &Path) -> Result<Option<PluginConfig>, ConfigError> {
    let path = config_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    match value.get("sessionId").and_then(|s| s.as_str()) {
        Some(id) if !id.trim().is_empty() => Ok(Some(PluginConfig {
            session_id: id.to_string(),
        })),
        _ => Err(ConfigError::MissingSessionId { path }),
    }
}

/// Persist `session_id`, creating `.claude/` if needed. Returns the written path.
pub fn save_config(project_dir: &Path, session_id: &str) -> Result<PathBuf, ConfigError> {
    let path = config_path(project_dir);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
    }

    let config = PluginConfig {
        session_id: session_id.to_string(),
    };
    let formatted =
        serde_json::to_string_pretty(&config).map_err(|e| ConfigError::Write(e.to_string()))?;
    std::fs::write(&path, formatted).map_err(|e| ConfigError::Write(e.to_string()))?;

    Ok(path)
}
