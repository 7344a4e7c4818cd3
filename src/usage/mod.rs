pub mod ccusage;
pub mod pricing;
pub mod transcript;

#[cfg(test)]
pub mod fixture;

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session id ccusage assigns to subagent transcripts.
pub const SUBAGENTS_SESSION_ID: &str = "subagents";

const INSTALL_HINT: &str =
    "ccusage is not installed. Install it with `npm install -g ccusage` or make `npx` available on PATH.";

/// One model's usage within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

impl ModelBreakdown {
    /// `modelName`, then `model`, then `"unknown"`.
    pub fn name(&self) -> &str {
        self.model_name
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or("unknown")
    }
}

/// A read-only snapshot of one session as reported by a usage source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default, alias = "lastActivityTimestamp", skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    #[serde(default)]
    pub model_breakdowns: Vec<ModelBreakdown>,
}

impl Session {
    /// True when this is a subagent session belonging to `main_session_id`.
    pub fn is_subagent_of(&self, main_session_id: &str) -> bool {
        if self.session_id != SUBAGENTS_SESSION_ID {
            return false;
        }
        match &self.project_path {
            Some(path) => path
                .strip_prefix(main_session_id)
                .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('\\')),
            None => false,
        }
    }
}

/// Failure of a single usage source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    NotInstalled(String),

    #[error("claude projects directory not found: {0}")]
    NoData(String),

    #[error("command failed: {0}")]
    Failed(String),

    #[error("unexpected output: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the failure means the external tool is missing.
    pub fn is_tool_missing(&self) -> bool {
        match self {
            SourceError::NotInstalled(_) => true,
            SourceError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            SourceError::Failed(text) => looks_like_missing_command(text),
            _ => false,
        }
    }
}

/// Heuristic for shell/OS messages reporting a missing executable.
pub fn looks_like_missing_command(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["command not found", "enoent", "is not recognized"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// One failed attempt, kept for the aggregate error.
#[derive(Debug)]
pub struct Attempt {
    pub source: &'static str,
    pub error: SourceError,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("usage data setup failed: {0}")]
    Setup(String),

    #[error("{}", describe_attempts(.attempts))]
    Unavailable { attempts: Vec<Attempt> },
}

fn describe_attempts(attempts: &[Attempt]) -> String {
    if attempts.iter().any(|a| a.error.is_tool_missing()) {
        return INSTALL_HINT.to_string();
    }
    let details: Vec<String> = attempts
        .iter()
        .map(|a| format!("{}: {}", a.source, a.error))
        .collect();
    format!("usage data unavailable ({})", details.join("; "))
}

/// A strategy for reading session usage data.
pub trait UsageSource {
    fn name(&self) -> &'static str;

    /// One-time readiness check before the source is used.
    fn setup(&self) -> Result<(), SourceError>;

    fn load_all_sessions(&self) -> Result<Vec<Session>, SourceError>;

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, SourceError>;
}

/// Outcome of an existence check. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCheck {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The operations the commit workflow needs from usage data.
pub trait UsageGateway {
    fn load_all_sessions(&self) -> Result<Vec<Session>, GatewayError>;

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, GatewayError>;

    fn verify_session_exists(&self, session_id: &str) -> SessionCheck {
        match self.load_session(session_id) {
            Ok(Some(_)) => SessionCheck {
                exists: true,
                error: None,
            },
            Ok(None) => SessionCheck {
                exists: false,
                error: Some(format!("Session not found: {session_id}")),
            },
            Err(e) => SessionCheck {
                exists: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Breakdowns of the session itself, without subagents.
    fn fetch_session_costs(&self, session_id: &str) -> Result<Vec<ModelBreakdown>, GatewayError> {
        Ok(self
            .load_session(session_id)?
            .map(|s| s.model_breakdowns)
            .unwrap_or_default())
    }
}

/// Tries each source in priority order and returns the first success.
/// A later source is only consulted after the earlier one failed.
pub struct TieredGateway {
    sources: Vec<Box<dyn UsageSource>>,
    ready: OnceCell<Result<Vec<usize>, String>>,
}

impl TieredGateway {
    pub fn new(sources: Vec<Box<dyn UsageSource>>) -> Self {
        Self {
            sources,
            ready: OnceCell::new(),
        }
    }

    /// Run every source's setup once. Sources that fail setup are skipped;
    /// if none is ready the gateway reports a setup error.
    pub fn ensure_ready(&self) -> Result<&[usize], GatewayError> {
        let ready = self.ready.get_or_init(|| {
            let mut usable = Vec::new();
            let mut reasons = Vec::new();
            for (index, source) in self.sources.iter().enumerate() {
                match source.setup() {
                    Ok(()) => usable.push(index),
                    Err(e) => {
                        tracing::debug!(source = source.name(), error = %e, "usage source unavailable");
                        if e.is_tool_missing() {
                            reasons.push(format!("{}: {}", source.name(), INSTALL_HINT));
                        } else {
                            reasons.push(format!("{}: {}", source.name(), e));
                        }
                    }
                }
            }
            if usable.is_empty() {
                Err(reasons.join("; "))
            } else {
                Ok(usable)
            }
        });

        match ready {
            Ok(indices) => Ok(indices.as_slice()),
            Err(reason) => Err(GatewayError::Setup(reason.clone())),
        }
    }

    /// Name of the first ready source.
    pub fn primary_source(&self) -> Option<&'static str> {
        let indices = self.ensure_ready().ok()?;
        indices.first().map(|&i| self.sources[i].name())
    }

    fn try_sources<T>(
        &self,
        op: &str,
        call: impl Fn(&dyn UsageSource) -> Result<T, SourceError>,
    ) -> Result<T, GatewayError> {
        let indices = self.ensure_ready()?;
        let mut attempts = Vec::new();

        for &index in indices {
            let source = self.sources[index].as_ref();
            match call(source) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    tracing::debug!(source = source.name(), op, error = %error, "usage source failed, trying next");
                    attempts.push(Attempt {
                        source: source.name(),
                        error,
                    });
                }
            }
        }

        Err(GatewayError::Unavailable { attempts })
    }
}

impl UsageGateway for TieredGateway {
    fn load_all_sessions(&self) -> Result<Vec<Session>, GatewayError> {
        self.try_sources("load_all_sessions", |s| s.load_all_sessions())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, GatewayError> {
        self.try_sources("load_session", |s| s.load_session(session_id))
    }
}
