use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::{envelope_failure, load_role_mappings, print_envelope, require_database};
use crate::cli::EXIT_PIPELINE_FAILURE;
use crate::config::{DEFAULT_ROW_LIMIT, PipelineConfig, RuntimePaths};
use crate::generator::{DEFAULT_MODEL, OllamaGenerator, QueryGenerator, StaticGenerator};
use crate::models::{ANONYMOUS_USER, Envelope, Question, Role};
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,

    #[arg(long, value_enum, default_value_t = Role::Analyst)]
    pub role: Role,

    #[arg(long, default_value = ANONYMOUS_USER)]
    pub user: String,

    /// Replay this SQL instead of calling a model; disables correction
    #[arg(long, value_name = "SQL")]
    pub candidate: Option<String>,

    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT)]
    pub limit: u64,

    #[arg(long, default_value_t = 3_000)]
    pub timeout_ms: u64,

    /// JSON file of per-role table substitutions
    #[arg(long, value_name = "PATH")]
    pub roles: Option<PathBuf>,

    #[arg(long, value_name = "URL")]
    pub ollama_url: Option<String>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

pub fn run(args: &AskArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    require_database("ask", &runtime_paths.db_path)?;

    let config = PipelineConfig {
        default_limit: args.limit,
        execution_timeout: Duration::from_millis(args.timeout_ms),
        role_mappings: load_role_mappings(args.roles.as_deref(), runtime_paths)?,
        ..PipelineConfig::default()
    };
    config.validate().context("invalid pipeline configuration")?;

    let generator: Arc<dyn QueryGenerator> = match &args.candidate {
        Some(candidate) => Arc::new(StaticGenerator::new(candidate.clone())),
        None => {
            let base_url = OllamaGenerator::resolve_base_url(args.ollama_url.as_deref());
            Arc::new(
                OllamaGenerator::new(base_url, args.model.clone())
                    .context("failed to build generator client")?,
            )
        }
    };
    let generator_name = generator.name().to_string();

    let pipeline = Pipeline::sqlite(&runtime_paths.db_path, generator, config);
    let question = Question::new(args.question.clone(), args.role, args.user.clone());
    let result = pipeline.run(&question);

    let data = serde_json::to_value(&result).context("failed to encode pipeline result")?;
    let meta = |envelope: Envelope| {
        envelope
            .with_meta("role", json!(question.role))
            .with_meta("user", json!(question.user))
            .with_meta("generator", json!(generator_name))
            .with_meta("db_path", json!(runtime_paths.db_path.display().to_string()))
    };

    match &result.table.error {
        None => {
            print_envelope(&meta(Envelope::ok("ask", data)));
            Ok(())
        }
        Some(message) => {
            let envelope = meta(Envelope::error("ask", "pipeline_failed", message).with_data(data));
            Err(envelope_failure(envelope, EXIT_PIPELINE_FAILURE))
        }
    }
}
