use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("unable to open database for introspection: {0}")]
    Unavailable(String),

    #[error("failed to read schema catalog: {0}")]
    Catalog(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("query generator unavailable: {0}")]
    Unavailable(String),

    #[error("Generated SQL is empty")]
    Empty,

    #[error("Generated SQL must start with SELECT")]
    NotASelect,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Blocked: non read-only SQL detected.")]
    NonReadOnly { keyword: String },

    #[error("Failed to parse SQL: {0}")]
    ParseFailure(String),

    #[error("Only single SELECT statements are allowed.")]
    MultipleStatements,

    #[error("Only SELECT queries are allowed.")]
    NotASelect,

    #[error("LIMIT must be a literal row count, found `{0}`")]
    UnverifiableLimit(String),

    #[error("Executor rejected query: {0}")]
    ExecutorRejected(String),
}

impl GuardError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonReadOnly { .. } => "non_read_only",
            Self::ParseFailure(_) => "parse_failure",
            Self::MultipleStatements => "multiple_statements",
            Self::NotASelect => "not_a_select",
            Self::UnverifiableLimit(_) => "unverifiable_limit",
            Self::ExecutorRejected(_) => "executor_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("SQL Syntax Error: {0}. Please check the generated SQL.")]
    Syntax(String),

    #[error("SQL Execution Error: {0}")]
    Operational(String),

    #[error("SQL Execution Error: query exceeded {timeout_ms} ms timeout")]
    Timeout { timeout_ms: u128 },

    #[error("{0}")]
    Other(String),
}

/// Failure of a single pipeline stage; every variant ends the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl PipelineError {
    /// Message placed in the result table, prefixed by the failing stage.
    #[must_use]
    pub fn table_message(&self) -> String {
        match self {
            Self::Introspection(error) => format!("Schema introspection failed: {error}"),
            Self::Generation(error) => format!("SQL Generation failed: {error}"),
            Self::Guard(error) => format!("Security validation failed: {error}"),
            Self::Execution(error) => format!("Query execution failed: {error}"),
        }
    }

    /// Message placed in `guard_reason` when no guarded query was produced.
    #[must_use]
    pub fn guard_reason(&self) -> String {
        match self {
            Self::Introspection(error) => format!("Schema introspection failed: {error}"),
            Self::Generation(error) => format!("SQL Generation failed: {error}"),
            Self::Guard(error) => format!("Guard failed: {error}"),
            Self::Execution(error) => format!("Execution failed: {error}"),
        }
    }

    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Introspection(_) => "introspection",
            Self::Generation(_) => "generation",
            Self::Guard(_) => "guard",
            Self::Execution(_) => "execution",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionError, GenerationError, GuardError, PipelineError};

    #[test]
    fn guard_messages_match_user_facing_wording() {
        let blocked = GuardError::NonReadOnly {
            keyword: "delete".to_string(),
        };
        assert_eq!(blocked.to_string(), "Blocked: non read-only SQL detected.");
        assert_eq!(
            GuardError::MultipleStatements.to_string(),
            "Only single SELECT statements are allowed."
        );
        assert_eq!(blocked.code(), "non_read_only");
    }

    #[test]
    fn pipeline_error_prefixes_by_stage() {
        let generation = PipelineError::from(GenerationError::Empty);
        assert_eq!(
            generation.table_message(),
            "SQL Generation failed: Generated SQL is empty"
        );
        assert_eq!(generation.stage(), "generation");

        let guard = PipelineError::from(GuardError::NotASelect);
        assert_eq!(
            guard.table_message(),
            "Security validation failed: Only SELECT queries are allowed."
        );
        assert_eq!(guard.guard_reason(), "Guard failed: Only SELECT queries are allowed.");

        let execution = PipelineError::from(ExecutionError::Syntax("near \"FRM\"".to_string()));
        assert!(execution.table_message().starts_with("Query execution failed: SQL Syntax Error"));
    }
}
