use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why the guard accepted a query in the shape it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardReason {
    Ok,
    LimitInjected { limit: u64 },
    LimitReduced { from: u64, to: u64 },
}

impl GuardReason {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Ok => "OK".to_string(),
            Self::LimitInjected { limit } => {
                format!("LIMIT injected to cap result size at {limit}.")
            }
            Self::LimitReduced { from, to } => {
                format!("LIMIT reduced from {from} to {to} to cap result size.")
            }
        }
    }
}

/// Execution-ready query produced by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GuardedQuery {
    pub sql: String,
    pub reason: GuardReason,
}

impl GuardedQuery {
    #[must_use]
    pub fn reason_message(&self) -> String {
        self.reason.message()
    }
}

pub type ResultRow = Map<String, Value>;

/// Rows returned by an executor before they are wrapped into a result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub elapsed_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    pub elapsed_sec: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(rows: QueryRows) -> Self {
        Self {
            columns: rows.columns,
            rows: rows.rows,
            elapsed_sec: rows.elapsed_sec,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>, elapsed_sec: f64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            elapsed_sec,
            error: Some(message.into()),
        }
    }
}

/// Everything the caller learns about one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineResult {
    pub question: String,
    pub raw_sql: String,
    pub safe_sql: String,
    pub guard_reason: String,
    pub table: ExecutionResult,
}

impl PipelineResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.table.error.is_none()
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.is_success() { "ok" } else { "error" }
    }
}

pub fn result_json_schema() -> Value {
    let schema = schemars::schema_for!(PipelineResult);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated pipeline result schema: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionResult, GuardReason, PipelineResult, QueryRows};

    #[test]
    fn reason_messages_follow_guard_wording() {
        assert_eq!(GuardReason::Ok.message(), "OK");
        assert_eq!(
            GuardReason::LimitInjected { limit: 100 }.message(),
            "LIMIT injected to cap result size at 100."
        );
        assert_eq!(
            GuardReason::LimitReduced {
                from: 5000,
                to: 1000
            }
            .message(),
            "LIMIT reduced from 5000 to 1000 to cap result size."
        );
    }

    #[test]
    fn empty_rows_without_error_count_as_success() {
        let result = PipelineResult {
            question: "q".to_string(),
            raw_sql: "SELECT 1".to_string(),
            safe_sql: "SELECT 1 LIMIT 200".to_string(),
            guard_reason: "OK".to_string(),
            table: ExecutionResult::success(QueryRows::default()),
        };
        assert!(result.is_success());
        assert_eq!(result.status(), "ok");
    }
}
