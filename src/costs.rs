use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::usage::{GatewayError, ModelBreakdown, Session, UsageGateway};

/// Summed usage for one model, as carried in the commit trailer.
///
/// Decoding accepts any JSON number for the numeric fields (`150.0` reads as
/// 150); null or non-numeric values read as 0, as `validate_cost_metrics`
/// counts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCost {
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "token_count")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "token_count")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "amount")]
    pub cost: f64,
}

fn token_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| match n.as_f64() {
            Some(f) if f > 0.0 => f.round() as u64,
            _ => 0,
        }),
        _ => 0,
    })
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64().unwrap_or(0.0))
}

#[derive(Debug, Error)]
pub enum CostError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("No model breakdowns found for session: {0}")]
    NoBreakdowns(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Subagent sessions attributed to `main_session_id` by project path prefix.
pub fn find_subagent_sessions<'a>(all: &'a [Session], main_session_id: &str) -> Vec<&'a Session> {
    all.iter()
        .filter(|s| s.is_subagent_of(main_session_id))
        .collect()
}

/// Sum breakdowns per model across `sessions`, keeping first-seen model order.
pub fn aggregate_model_breakdowns<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
) -> Vec<ModelCost> {
    sum_breakdowns(sessions.into_iter().flat_map(|s| &s.model_breakdowns))
}

/// Sum breakdowns per model name; costs rounded to 2 dp after summation.
pub fn sum_breakdowns<'a>(breakdowns: impl IntoIterator<Item = &'a ModelBreakdown>) -> Vec<ModelCost> {
    let mut totals: Vec<ModelCost> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for breakdown in breakdowns {
        let name = breakdown.name();
        let slot = match index.get(name) {
            Some(&i) => i,
            None => {
                totals.push(ModelCost {
                    model: name.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                    cost: 0.0,
                });
                index.insert(name.to_string(), totals.len() - 1);
                totals.len() - 1
            }
        };
        let total = &mut totals[slot];
        total.input_tokens += breakdown.input_tokens;
        total.output_tokens += breakdown.output_tokens;
        total.cost += breakdown.cost;
    }

    for total in &mut totals {
        total.cost = round2(total.cost);
    }
    totals
}

/// Aggregated costs for a session and all of its subagents.
pub fn get_session_costs(
    gateway: &dyn UsageGateway,
    session_id: &str,
) -> Result<Vec<ModelCost>, CostError> {
    let all = gateway.load_all_sessions()?;

    let main = all
        .iter()
        .find(|s| s.session_id == session_id)
        .ok_or_else(|| CostError::NotFound(session_id.to_string()))?;

    let subagents = find_subagent_sessions(&all, session_id);
    tracing::debug!(session_id, subagents = subagents.len(), "aggregating session costs");

    let costs = aggregate_model_breakdowns(std::iter::once(main).chain(subagents));
    if costs.is_empty() {
        return Err(CostError::NoBreakdowns(session_id.to_string()));
    }
    Ok(costs)
}

/// Reject cost data that is empty, malformed, or carries no usage at all.
pub fn validate_cost_metrics(costs: &Value) -> bool {
    let entries = match costs.as_array() {
        Some(a) if !a.is_empty() => a,
        _ => return false,
    };

    entries.iter().all(|entry| {
        if !entry.get("model").is_some_and(Value::is_string) {
            return false;
        }
        let cost = match entry.get("cost").and_then(Value::as_f64) {
            Some(c) => c,
            None => return false,
        };
        let tokens = |key: &str| entry.get(key).and_then(Value::as_f64).unwrap_or(0.0);

        !(tokens("inputTokens") <= 0.0 && tokens("outputTokens") <= 0.0 && cost <= 0.0)
    })
}
