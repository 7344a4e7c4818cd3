//! Fallback usage source: the `ccusage` CLI run as a subprocess.
//!
//! `ccusage session --json` prints either a bare array of sessions or an
//! object wrapping them under `sessions`; both are accepted.

use std::cell::OnceCell;
use std::process::{Command, Stdio};

use serde_json::Value;

use super::{looks_like_missing_command, Session, SourceError, UsageSource};

pub struct CcusageSource {
    override_cmd: Option<String>,
    command: OnceCell<Result<Vec<String>, String>>,
}

impl CcusageSource {
    /// `override_cmd` is a whitespace-separated command line, e.g. `bunx ccusage`.
    pub fn new(override_cmd: Option<String>) -> Self {
        Self {
            override_cmd,
            command: OnceCell::new(),
        }
    }

    /// Resolve the command: explicit override, `ccusage` on PATH, then `npx`.
    fn resolve(&self) -> Result<&[String], SourceError> {
        let resolved = self.command.get_or_init(|| {
            if let Some(cmd) = &self.override_cmd {
                let parts: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
                if !parts.is_empty() {
                    return Ok(parts);
                }
            }
            if let Ok(path) = which::which("ccusage") {
                return Ok(vec![path.to_string_lossy().to_string()]);
            }
            if let Ok(path) = which::which("npx") {
                return Ok(vec![
                    path.to_string_lossy().to_string(),
                    "--yes".to_string(),
                    "ccusage@latest".to_string(),
                ]);
            }
            Err("ccusage: command not found (and no npx on PATH)".to_string())
        });

        match resolved {
            Ok(parts) => Ok(parts.as_slice()),
            Err(msg) => Err(SourceError::NotInstalled(msg.clone())),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Value, SourceError> {
        let command = self.resolve()?;
        let (program, prefix) = command
            .split_first()
            .ok_or_else(|| SourceError::NotInstalled("empty ccusage command".to_string()))?;

        tracing::debug!(program = %program, ?args, "running ccusage");

        let output = Command::new(program)
            .args(prefix)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // 127: the shell or npx could not find the executable
            if output.status.code() == Some(127) || looks_like_missing_command(&stderr) {
                return Err(SourceError::NotInstalled(stderr));
            }
            return Err(SourceError::Failed(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

impl UsageSource for CcusageSource {
    fn name(&self) -> &'static str {
        "ccusage"
    }

    fn setup(&self) -> Result<(), SourceError> {
        self.resolve().map(|_| ())
    }

    fn load_all_sessions(&self) -> Result<Vec<Session>, SourceError> {
        let value = self.run(&["session", "--json"])?;
        normalize_sessions(value)
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, SourceError> {
        let value = self.run(&["session", "--id", session_id, "--json"])?;
        find_session(value, session_id)
    }
}

/// Accept `[...]` or `{"sessions": [...]}`.
pub fn normalize_sessions(value: Value) -> Result<Vec<Session>, SourceError> {
    let array = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove("sessions") {
            Some(sessions @ Value::Array(_)) => sessions,
            _ => return Err(SourceError::Parse("expected a `sessions` array".to_string())),
        },
        _ => return Err(SourceError::Parse("expected an array of sessions".to_string())),
    };

    serde_json::from_value(array).map_err(|e| SourceError::Parse(e.to_string()))
}

/// Single-session lookups may print the session object itself or a listing.
pub fn find_session(value: Value, session_id: &str) -> Result<Option<Session>, SourceError> {
    if value.is_null() {
        return Ok(None);
    }
    if value.get("sessionId").is_some() {
        let session: Session =
            serde_json::from_value(value).map_err(|e| SourceError::Parse(e.to_string()))?;
        return Ok((session.session_id == session_id).then_some(session));
    }

    Ok(normalize_sessions(value)?
        .into_iter()
        .find(|s| s.session_id == session_id))
}
