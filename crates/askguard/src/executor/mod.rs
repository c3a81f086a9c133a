use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::{Map, Value, json};

use crate::error::{ExecutionError, GuardError, PipelineError};
use crate::models::{QueryRows, ResultRow};
use crate::sql::{has_multiple_statements, trim_statement_tail};
use crate::utils::time::elapsed_secs;

pub const MULTIPLE_STATEMENTS_MESSAGE: &str = "Multiple statements are not allowed.";

/// SQLite VM instructions between deadline checks.
const PROGRESS_CHECK_INTERVAL: i32 = 1_000;

/// Runs an already-guarded query.
///
/// Implementations refuse multi-statement input on their own
/// ([`GuardError::ExecutorRejected`]) and report everything else as
/// [`ExecutionError`].
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryRows, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    db_path: PathBuf,
}

impl SqliteExecutor {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self, timeout: Duration) -> Result<Connection, ExecutionError> {
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|error| {
            ExecutionError::Operational(format!("{error} ({})", self.db_path.display()))
        })?;
        connection
            .busy_timeout(timeout)
            .map_err(|error| ExecutionError::Other(error.to_string()))?;

        let deadline = Instant::now() + timeout;
        connection.progress_handler(
            PROGRESS_CHECK_INTERVAL,
            Some(move || Instant::now() >= deadline),
        );
        Ok(connection)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str, timeout: Duration) -> Result<QueryRows, PipelineError> {
        if has_multiple_statements(trim_statement_tail(sql)) {
            return Err(GuardError::ExecutorRejected(MULTIPLE_STATEMENTS_MESSAGE.to_string()).into());
        }

        let started = Instant::now();
        let connection = self.open(timeout)?;
        let (columns, rows) = fetch_rows(&connection, sql).map_err(|error| classify(error, timeout))?;
        let elapsed_sec = elapsed_secs(started.elapsed());

        tracing::debug!(rows = rows.len(), elapsed_sec, "query executed");
        Ok(QueryRows {
            columns,
            rows,
            elapsed_sec,
        })
    }
}

fn fetch_rows(
    connection: &Connection,
    sql: &str,
) -> Result<(Vec<String>, Vec<ResultRow>), rusqlite::Error> {
    let mut statement = connection.prepare(sql)?;
    let columns = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement.query([])?;
    let mut result_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::new();
        for (index, column) in columns.iter().enumerate() {
            record.insert(column.clone(), json_value_from_sql(row.get_ref(index)?));
        }
        result_rows.push(record);
    }

    Ok((columns, result_rows))
}

fn json_value_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => json!(value),
        ValueRef::Real(value) => json!(value),
        ValueRef::Text(bytes) => json!(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => json!(hex::encode(bytes)),
    }
}

fn classify(error: rusqlite::Error, timeout: Duration) -> PipelineError {
    let classified = match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::OperationInterrupted =>
        {
            ExecutionError::Timeout {
                timeout_ms: timeout.as_millis(),
            }
        }
        rusqlite::Error::SqliteFailure(..) => {
            let message = error.to_string();
            if message.to_lowercase().contains("syntax error") {
                ExecutionError::Syntax(message)
            } else {
                ExecutionError::Operational(message)
            }
        }
        _ => ExecutionError::Other(error.to_string()),
    };
    tracing::warn!(error = %classified, "query execution failed");
    classified.into()
}
