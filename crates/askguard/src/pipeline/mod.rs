//! Request orchestration.
//!
//! `run` sequences introspection, cache-aware generation, cleaning,
//! correction, guarding, execution and auditing. Every failure becomes a
//! `PipelineResult` with an error string; nothing is propagated to the caller.

pub mod clean;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::audit::{AuditRecord, AuditSink, NoopAuditSink, SqliteAuditSink};
use crate::cache::GenerationCache;
use crate::config::PipelineConfig;
use crate::correction::{Reask, correct};
use crate::error::PipelineError;
use crate::executor::{QueryExecutor, SqliteExecutor};
use crate::generator::{GenerationRequest, QueryGenerator, SchemaBoundAsk};
use crate::guard::guard;
use crate::models::{ExecutionResult, GuardedQuery, PipelineResult, QueryRows, Question};
use crate::schema::{SchemaProvider, SqliteSchemaProvider, describe};
use crate::utils::time::{elapsed_secs, now_utc_timestamp};

pub use clean::clean_candidate;

/// What is known about a request at the point it stopped.
#[derive(Debug, Default)]
struct RunTrace {
    raw_sql: String,
    guarded: Option<GuardedQuery>,
    elapsed_sec: f64,
}

pub struct Pipeline {
    schema: Arc<dyn SchemaProvider>,
    generator: Arc<dyn QueryGenerator>,
    executor: Arc<dyn QueryExecutor>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<GenerationCache>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline with a fresh cache and no audit trail.
    #[must_use]
    pub fn new(
        schema: Arc<dyn SchemaProvider>,
        generator: Arc<dyn QueryGenerator>,
        executor: Arc<dyn QueryExecutor>,
        config: PipelineConfig,
    ) -> Self {
        let cache = Arc::new(GenerationCache::new(config.cache_capacity));
        Self {
            schema,
            generator,
            executor,
            audit: Arc::new(NoopAuditSink),
            cache,
            config,
        }
    }

    /// Introspection, execution and audit all against one SQLite file.
    #[must_use]
    pub fn sqlite(db_path: &Path, generator: Arc<dyn QueryGenerator>, config: PipelineConfig) -> Self {
        Self::new(
            Arc::new(SqliteSchemaProvider::new(db_path)),
            generator,
            Arc::new(SqliteExecutor::new(db_path)),
            config,
        )
        .with_audit_sink(Arc::new(SqliteAuditSink::new(db_path)))
    }

    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Share `cache` with other pipelines. It is cleared on attach so no
    /// entry from an earlier configuration survives.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<GenerationCache>) -> Self {
        cache.invalidate_all();
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<GenerationCache> {
        &self.cache
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    pub fn run(&self, question: &Question) -> PipelineResult {
        tracing::info!(user = %question.user, role = %question.role, "pipeline started");
        let mut trace = RunTrace::default();

        let result = match self.run_stages(question, &mut trace) {
            Ok((guarded, rows)) => {
                tracing::info!(rows = rows.rows.len(), elapsed_sec = rows.elapsed_sec, "pipeline completed");
                PipelineResult {
                    question: question.text.clone(),
                    raw_sql: trace.raw_sql,
                    guard_reason: guarded.reason_message(),
                    safe_sql: guarded.sql,
                    table: ExecutionResult::success(rows),
                }
            }
            Err(error) => {
                tracing::warn!(stage = error.stage(), %error, "pipeline stopped");
                failure_result(question, trace, &error)
            }
        };

        self.audit(question, &result);
        result
    }

    fn run_stages(
        &self,
        question: &Question,
        trace: &mut RunTrace,
    ) -> Result<(GuardedQuery, QueryRows), PipelineError> {
        let schema = describe(self.schema.as_ref())?;
        tracing::debug!(fingerprint = %schema.fingerprint, tables = schema.tables.len(), "schema described");

        let request = GenerationRequest {
            question: &question.text,
            schema: &schema.text,
            guidance: None,
        };
        let raw = self
            .cache
            .get_or_generate(&schema.fingerprint, &question.text, || {
                self.generator.generate(&request)
            })?;
        trace.raw_sql = raw.clone();

        let candidate = clean_candidate(&raw)?;
        trace.raw_sql = candidate.clone();

        let asker = SchemaBoundAsk::new(self.generator.as_ref(), &schema.text);
        let reask = if self.generator.supports_guidance() {
            Reask::Available(&asker)
        } else {
            Reask::Unavailable
        };
        let correction = correct(&candidate, &question.text, reask);
        if correction.invalidates_cache() {
            self.cache.invalidate_with(
                self.config.invalidation,
                &schema.fingerprint,
                &question.text,
            );
        }
        trace.raw_sql = correction.candidate.clone();

        let guarded = guard(
            &correction.candidate,
            question.role,
            &self.config.role_mappings,
            &schema.tables,
            self.config.default_limit,
        )?;
        tracing::info!(reason = %guarded.reason_message(), "query guarded");
        trace.guarded = Some(guarded.clone());

        let started = Instant::now();
        let executed = self.executor.execute(&guarded.sql, self.config.execution_timeout);
        trace.elapsed_sec = elapsed_secs(started.elapsed());
        executed.map(|rows| (guarded, rows))
    }

    fn audit(&self, question: &Question, result: &PipelineResult) {
        let record =
            AuditRecord::from_result(&question.user, question.role, result, now_utc_timestamp());
        if let Err(error) = self.audit.record(&record) {
            tracing::warn!(error = %format!("{error:#}"), "audit record dropped");
        }
    }
}

fn failure_result(question: &Question, trace: RunTrace, error: &PipelineError) -> PipelineResult {
    let (safe_sql, guard_reason) = match (&trace.guarded, error) {
        (Some(guarded), PipelineError::Execution(_)) => {
            (guarded.sql.clone(), guarded.reason_message())
        }
        (Some(guarded), _) => (guarded.sql.clone(), error.guard_reason()),
        (None, _) => (String::new(), error.guard_reason()),
    };

    PipelineResult {
        question: question.text.clone(),
        raw_sql: trace.raw_sql,
        safe_sql,
        guard_reason,
        table: ExecutionResult::failure(error.table_message(), trace.elapsed_sec),
    }
}
