use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{envelope_failure, print_envelope, require_database};
use crate::cli::EXIT_RUNTIME_FAILURE;
use crate::config::RuntimePaths;
use crate::models::Envelope;
use crate::schema::{SqliteSchemaProvider, describe};

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Print only the prompt text
    #[arg(long, default_value_t = false)]
    pub text_only: bool,
}

pub fn run(args: &SchemaArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    require_database("schema", &runtime_paths.db_path)?;
    let schema = describe(&SqliteSchemaProvider::new(&runtime_paths.db_path)).map_err(|error| {
        envelope_failure(
            Envelope::error("schema", "schema_unavailable", error.to_string()),
            EXIT_RUNTIME_FAILURE,
        )
    })?;

    let data = if args.text_only {
        json!({ "text": schema.text })
    } else {
        json!({
            "tables": schema.tables,
            "text": schema.text,
            "fingerprint": schema.fingerprint,
        })
    };
    print_envelope(
        &Envelope::ok("schema", data).with_meta("table_count", json!(schema.tables.len())),
    );
    Ok(())
}
