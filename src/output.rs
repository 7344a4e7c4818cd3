use serde::Serialize;
use serde_json::Value;

/// Outcome of a workflow action. Negative outcomes other than `Error` are
/// expected results, not process failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    NotFound,
    InvalidCosts,
    MetricsInvalid,
    GitError,
    Error,
}

/// The single JSON object every action prints: `{status, data, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub data: Value,
    pub message: String,
}

impl Envelope {
    pub fn new(status: Status, data: Value, message: impl Into<String>) -> Self {
        Self {
            status,
            data,
            message: message.into(),
        }
    }

    pub fn success(data: Value, message: impl Into<String>) -> Self {
        Self::new(Status::Success, data, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, Value::Null, message)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
