//! Reads Claude Code JSONL transcripts straight from `<claude-dir>/projects`.
//!
//! Files are grouped the way ccusage groups them: the session id is the name
//! of the directory holding the file and the project path is whatever sits
//! above it. A main transcript at `projects/-Users-me-app/<uuid>.jsonl` lands
//! in session `-Users-me-app`; a subagent transcript at
//! `projects/-Users-me-app/<uuid>/subagents/agent-1.jsonl` lands in session
//! `subagents` with project path `-Users-me-app/<uuid>`.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::{pricing, ModelBreakdown, Session, SourceError, UsageSource};

const SYNTHETIC_MODEL: &str = "<synthetic>";

pub struct TranscriptSource {
    projects_dir: PathBuf,
}

impl TranscriptSource {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    /// Map a transcript file to `(session_id, project_path)`.
    fn group_key(&self, file: &Path) -> Option<(String, Option<String>)> {
        let rel = file.strip_prefix(&self.projects_dir).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if parts.len() < 2 {
            return None;
        }
        let session_id = parts[parts.len() - 2].clone();
        let ancestors = &parts[..parts.len() - 2];
        let project_path = if ancestors.is_empty() {
            None
        } else {
            Some(ancestors.join("/"))
        };
        Some((session_id, project_path))
    }
}

impl UsageSource for TranscriptSource {
    fn name(&self) -> &'static str {
        "transcripts"
    }

    fn setup(&self) -> Result<(), SourceError> {
        if self.projects_dir.is_dir() {
            Ok(())
        } else {
            Err(SourceError::NoData(self.projects_dir.display().to_string()))
        }
    }

    fn load_all_sessions(&self) -> Result<Vec<Session>, SourceError> {
        let mut files = Vec::new();
        collect_jsonl(&self.projects_dir, &mut files)?;
        files.sort();

        let mut order: Vec<(String, Option<String>)> = Vec::new();
        let mut groups: HashMap<(String, Option<String>), SessionAccumulator> = HashMap::new();
        let mut seen = HashSet::new();

        for file in &files {
            let Some(key) = self.group_key(file) else {
                continue;
            };
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            let acc = groups.entry(key).or_default();
            parse_transcript(file, acc, &mut seen)?;
        }

        let mut sessions: Vec<(Option<DateTime<FixedOffset>>, Session)> = order
            .into_iter()
            .filter_map(|key| {
                let acc = groups.remove(&key)?;
                let last = acc.last_activity;
                Some((last, acc.finish(key.0, key.1)))
            })
            .collect();

        // Most recent activity first
        sessions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(sessions.into_iter().map(|(_, s)| s).collect())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, SourceError> {
        if session_id.is_empty() || session_id.contains(['/', '\\']) || session_id == ".." {
            return Ok(None);
        }

        let dir = self.projects_dir.join(session_id);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_jsonl(p))
            .collect();
        if files.is_empty() {
            return Ok(None);
        }
        files.sort();

        let mut acc = SessionAccumulator::default();
        let mut seen = HashSet::new();
        for file in &files {
            parse_transcript(file, &mut acc, &mut seen)?;
        }

        Ok(Some(acc.finish(session_id.to_string(), None)))
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
}

fn collect_jsonl(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_jsonl(&path, out)?;
        } else if file_type.is_file() && is_jsonl(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Per-model totals for one session, in first-seen model order.
#[derive(Default)]
struct SessionAccumulator {
    models: Vec<ModelBreakdown>,
    index: HashMap<String, usize>,
    last_activity: Option<DateTime<FixedOffset>>,
}

impl SessionAccumulator {
    fn touch(&mut self, timestamp: &str) {
        if let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) {
            if self.last_activity.map_or(true, |last| ts > last) {
                self.last_activity = Some(ts);
            }
        }
    }

    fn record(&mut self, model: &str, usage: &Usage, cost: f64) {
        let slot = match self.index.get(model) {
            Some(&i) => i,
            None => {
                self.models.push(ModelBreakdown {
                    model_name: Some(model.to_string()),
                    ..Default::default()
                });
                self.index.insert(model.to_string(), self.models.len() - 1);
                self.models.len() - 1
            }
        };

        let b = &mut self.models[slot];
        b.input_tokens += usage.input;
        b.output_tokens += usage.output;
        b.cache_creation_tokens += usage.cache_creation;
        b.cache_read_tokens += usage.cache_read;
        b.cost += cost;
    }

    fn finish(self, session_id: String, project_path: Option<String>) -> Session {
        Session {
            session_id,
            project_path,
            last_activity: self.last_activity.map(|ts| ts.to_rfc3339()),
            model_breakdowns: self.models,
        }
    }
}

struct Usage {
    input: u64,
    output: u64,
    cache_creation: u64,
    cache_read: u64,
}

impl Usage {
    fn from_value(usage: &Value) -> Self {
        let tokens = |key: &str| usage.get(key).and_then(|t| t.as_u64()).unwrap_or(0);
        Self {
            input: tokens("input_tokens"),
            output: tokens("output_tokens"),
            cache_creation: tokens("cache_creation_input_tokens"),
            cache_read: tokens("cache_read_input_tokens"),
        }
    }
}

/// Stream one transcript into `acc`. Corrupt lines are skipped; `seen`
/// de-duplicates entries that share a message id and request id.
fn parse_transcript(
    path: &Path,
    acc: &mut SessionAccumulator,
    seen: &mut HashSet<String>,
) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue, // Skip corrupt lines
        };

        if let Some(ts) = value.get("timestamp").and_then(|t| t.as_str()) {
            acc.touch(ts);
        }

        let message = match value.get("message") {
            Some(m) => m,
            None => continue,
        };
        let usage = match message.get("usage") {
            Some(u) => Usage::from_value(u),
            None => continue,
        };
        let model = match message.get("model").and_then(|m| m.as_str()) {
            Some(m) if m != SYNTHETIC_MODEL => m,
            _ => continue,
        };

        if let (Some(message_id), Some(request_id)) = (
            message.get("id").and_then(|i| i.as_str()),
            value.get("requestId").and_then(|r| r.as_str()),
        ) {
            if !seen.insert(format!("{message_id}:{request_id}")) {
                continue;
            }
        }

        let cost = value
            .get("costUSD")
            .and_then(|c| c.as_f64())
            .unwrap_or_else(|| {
                pricing::cost_for(
                    model,
                    usage.input,
                    usage.output,
                    usage.cache_creation,
                    usage.cache_read,
                )
            });

        acc.record(model, &usage, cost);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn assistant(model: &str, id: &str, input: u64, output: u64, ts: &str) -> String {
        format!(
            r#"{{"type":"assistant","requestId":"req_{id}","timestamp":"{ts}","message":{{"id":"msg_{id}","model":"{model}","role":"assistant","usage":{{"input_tokens":{input},"output_tokens":{output}}}}}}}"#
        )
    }

    fn write_transcript(path: &Path, lines: &[String]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("-Users-test-project");
        write_transcript(
            &project.join("abc123.jsonl"),
            &[
                r#"{"type":"user","timestamp":"2026-02-21T10:00:00Z","message":{"role":"user","content":"hi"}}"#.to_string(),
                assistant("claude-sonnet-4", "1", 100, 50, "2026-02-21T10:00:05Z"),
                assistant("claude-sonnet-4", "1", 100, 50, "2026-02-21T10:00:05Z"),
                "not valid json".to_string(),
                assistant("claude-opus-4-6", "2", 10, 5, "2026-02-21T10:01:00Z"),
            ],
        );
        write_transcript(
            &project.join("abc123").join("subagents").join("agent-1.jsonl"),
            &[assistant("claude-sonnet-4", "3", 50, 25, "2026-02-21T10:02:00Z")],
        );
        write_transcript(
            &dir.path().join("-Users-test-other").join("def456.jsonl"),
            &[assistant("claude-haiku-4-5", "4", 1, 1, "2026-02-20T09:00:00Z")],
        );
        dir
    }

    #[test]
    fn test_groups_main_and_subagent_sessions() {
        let dir = fixture();
        let source = TranscriptSource::new(dir.path());
        let sessions = source.load_all_sessions().unwrap();

        assert_eq!(sessions.len(), 3);
        // Newest activity first
        assert_eq!(sessions[0].session_id, "subagents");
        assert_eq!(
            sessions[0].project_path.as_deref(),
            Some("-Users-test-project/abc123")
        );
        assert_eq!(sessions[1].session_id, "-Users-test-project");
        assert_eq!(sessions[1].project_path, None);
        assert_eq!(sessions[2].session_id, "-Users-test-other");
    }

    #[test]
    fn test_duplicate_entries_counted_once() {
        let dir = fixture();
        let source = TranscriptSource::new(dir.path());
        let session = source.load_session("-Users-test-project").unwrap().unwrap();

        assert_eq!(session.model_breakdowns.len(), 2);
        let sonnet = &session.model_breakdowns[0];
        assert_eq!(sonnet.name(), "claude-sonnet-4");
        assert_eq!(sonnet.input_tokens, 100);
        assert_eq!(sonnet.output_tokens, 50);
        assert_eq!(session.model_breakdowns[1].name(), "claude-opus-4-6");
        assert!(session.last_activity.unwrap().starts_with("2026-02-21T10:01:00"));
    }

    #[test]
    fn test_cost_usd_field_preferred() {
        let dir = TempDir::new().unwrap();
        write_transcript(
            &dir.path().join("-p").join("s.jsonl"),
            &[r#"{"type":"assistant","costUSD":0.42,"message":{"model":"claude-sonnet-4","usage":{"input_tokens":1,"output_tokens":1}}}"#.to_string()],
        );
        let session = TranscriptSource::new(dir.path())
            .load_session("-p")
            .unwrap()
            .unwrap();
        assert!((session.model_breakdowns[0].cost - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_synthetic_model_skipped() {
        let dir = TempDir::new().unwrap();
        write_transcript(
            &dir.path().join("-p").join("s.jsonl"),
            &[assistant("<synthetic>", "1", 10, 10, "2026-02-21T10:00:00Z")],
        );
        let session = TranscriptSource::new(dir.path())
            .load_session("-p")
            .unwrap()
            .unwrap();
        assert!(session.model_breakdowns.is_empty());
    }

    #[test]
    fn test_unknown_session_is_none() {
        let dir = fixture();
        let source = TranscriptSource::new(dir.path());
        assert_eq!(source.load_session("-Users-nobody").unwrap(), None);
        assert_eq!(source.load_session("../etc").unwrap(), None);
    }

    #[test]
    fn test_setup_requires_projects_dir() {
        let dir = TempDir::new().unwrap();
        assert!(TranscriptSource::new(dir.path()).setup().is_ok());
        assert!(matches!(
            TranscriptSource::new(dir.path().join("missing")).setup(),
            Err(SourceError::NoData(_))
        ));
    }
}
