//! Cost trailer encoding and recovery from commit history.
//!
//! Trailers are read by scanning raw message bodies line by line rather than
//! through `git interpret-trailers`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::costs::ModelCost;

pub const TRAILER_PREFIX: &str = "Claude-Cost-Metrics: ";
pub const CO_AUTHOR: &str = "Co-Authored-By: Claude <noreply@anthropic.com>";

/// Separator emitted between commit bodies by `git log --format=%B%x1e`.
pub const RECORD_SEPARATOR: char = '\x1e';
pub const LOG_FORMAT: &str = "--format=%B%x1e";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTrailer {
    #[serde(default)]
    pub session_id: String,
    pub cost: Vec<ModelCost>,
}

/// Subject and optional body of a user-supplied commit message.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Option<String>,
}

impl CommitMessage {
    /// Split raw text into subject (first line) and body (after the blank line).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (subject, rest) = match raw.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (raw, ""),
        };
        let body = rest.trim();
        Self {
            subject: subject.trim().to_string(),
            body: (!body.is_empty()).then(|| body.to_string()),
        }
    }
}

/// Render a trailer line. The JSON is kept on one line.
pub fn encode_trailer(trailer: &CostTrailer) -> serde_json::Result<String> {
    Ok(format!("{TRAILER_PREFIX}{}", serde_json::to_string(trailer)?))
}

/// Full commit message: subject, body, then attribution and cost trailer.
pub fn build_commit_message(
    message: &CommitMessage,
    session_id: &str,
    costs: &[ModelCost],
) -> serde_json::Result<String> {
    let trailer = encode_trailer(&CostTrailer {
        session_id: session_id.to_string(),
        cost: costs.to_vec(),
    })?;

    let mut out = message.subject.clone();
    out.push_str("\n\n");
    if let Some(body) = &message.body {
        out.push_str(body);
        out.push_str("\n\n");
    }
    out.push_str(CO_AUTHOR);
    out.push('\n');
    out.push_str(&trailer);
    out.push('\n');
    Ok(out)
}

/// Parse the trailer of one commit body. The last prefixed line decides;
/// malformed JSON or a non-array `cost` yields `None`. Once `cost` is an
/// array the trailer is accepted; entries that are not objects are dropped.
pub fn parse_cost_trailer(body: &str) -> Option<CostTrailer> {
    let line = body
        .lines()
        .filter_map(|l| l.trim_end().strip_prefix(TRAILER_PREFIX))
        .last()?;

    let value: Value = match serde_json::from_str(line.trim()) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed cost trailer");
            return None;
        }
    };
    let entries = value.get("cost")?.as_array()?;

    Some(CostTrailer {
        session_id: value
            .get("sessionId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        cost: entries
            .iter()
            .filter_map(|entry| ModelCost::deserialize(entry).ok())
            .collect(),
    })
}

/// Scan `git log` output (newest first) for the most recent cost trailer.
pub fn scan_history(log: &str) -> Vec<ModelCost> {
    log.split(RECORD_SEPARATOR)
        .find_map(parse_cost_trailer)
        .map(|t| t.cost)
        .unwrap_or_default()
}
