use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{envelope_failure, print_envelope};
use crate::cli::EXIT_RUNTIME_FAILURE;
use crate::config::RuntimePaths;
use crate::executor::{QueryExecutor, SqliteExecutor};
use crate::generator::OllamaGenerator;
use crate::models::Envelope;

#[derive(Debug, Clone, Args)]
pub struct HealthArgs {
    #[arg(long, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Only check the database
    #[arg(long, default_value_t = false)]
    pub skip_generator: bool,
}

pub fn run(args: &HealthArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let db_path = runtime_paths.db_path.display().to_string();
    let executor = SqliteExecutor::new(&runtime_paths.db_path);
    if let Err(error) = executor.execute("SELECT 1", Duration::from_secs(1)) {
        let envelope = Envelope::error("health", "database_unhealthy", error.to_string())
            .with_error_details(json!({ "db_path": db_path }));
        return Err(envelope_failure(envelope, EXIT_RUNTIME_FAILURE));
    }

    let mut envelope = Envelope::ok("health", json!({ "database": "ok" }))
        .with_meta("db_path", json!(db_path));

    if !args.skip_generator {
        let base_url = OllamaGenerator::resolve_base_url(args.ollama_url.as_deref());
        let reachable = OllamaGenerator::new(base_url.clone(), "")
            .and_then(|generator| generator.ping());
        envelope = envelope.with_meta("generator_url", json!(base_url));
        envelope = match reachable {
            Ok(()) => envelope.with_data(json!({ "database": "ok", "generator": "ok" })),
            Err(error) => envelope
                .with_data(json!({ "database": "ok", "generator": "unreachable" }))
                .with_warning("generator_unreachable", error.to_string()),
        };
    }

    print_envelope(&envelope);
    Ok(())
}
