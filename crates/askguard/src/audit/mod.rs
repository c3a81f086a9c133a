//! Append-only record of every request the pipeline handled.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;

use crate::models::{PipelineResult, Role};

/// Table the SQLite sink appends to; hidden from schema introspection.
pub const AUDIT_TABLE: &str = "logs";

pub const CREATE_AUDIT_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user TEXT NOT NULL,
    role TEXT NOT NULL,
    question TEXT NOT NULL,
    raw_sql TEXT NOT NULL,
    safe_sql TEXT NOT NULL,
    status TEXT NOT NULL,
    ts TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub user: String,
    pub role: Role,
    pub question: String,
    pub raw_sql: String,
    pub safe_sql: String,
    pub status: String,
    pub ts: String,
}

impl AuditRecord {
    #[must_use]
    pub fn from_result(user: &str, role: Role, result: &PipelineResult, ts: String) -> Self {
        Self {
            user: user.to_string(),
            role,
            question: result.question.clone(),
            raw_sql: result.raw_sql.clone(),
            safe_sql: result.safe_sql.clone(),
            status: result.status().to_string(),
            ts,
        }
    }
}

/// Destination for audit records. Callers log and drop sink errors.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Keeps records in memory; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("audit buffer lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Appends to the `logs` table, opening a short-lived connection per record.
/// The database file must already exist.
#[derive(Debug, Clone)]
pub struct SqliteAuditSink {
    db_path: PathBuf,
}

impl SqliteAuditSink {
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
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open audit database: {}", self.db_path.display()))?;
        connection
            .execute(
                "INSERT INTO logs (user, role, question, raw_sql, safe_sql, status, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.user,
                    record.role.as_str(),
                    record.question,
                    record.raw_sql,
                    record.safe_sql,
                    record.status,
                    record.ts,
                ],
            )
            .context("failed to append audit record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditRecord, AuditSink, MemoryAuditSink};
    use crate::models::{ExecutionResult, PipelineResult, Role};

    #[test]
    fn record_status_follows_result_table() {
        let result = PipelineResult {
            question: "How many branches?".to_string(),
            raw_sql: "SELECT COUNT(*) FROM branches".to_string(),
            safe_sql: String::new(),
            guard_reason: "Guard failed: x".to_string(),
            table: ExecutionResult::failure("Security validation failed: x", 0.0),
        };
        let record = AuditRecord::from_result("ana", Role::Viewer, &result, "ts".to_string());
        assert_eq!(record.status, "error");
        assert_eq!(record.role, Role::Viewer);

        let sink = MemoryAuditSink::default();
        sink.record(&record).expect("memory sink accepts records");
        assert_eq!(sink.records(), vec![record]);
    }
}
