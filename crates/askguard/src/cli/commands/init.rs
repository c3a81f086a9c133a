use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{envelope_failure, print_envelope};
use crate::cli::EXIT_RUNTIME_FAILURE;
use crate::config::RuntimePaths;
use crate::models::Envelope;
use crate::sqlite::init_demo_database;

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Replace an existing database file
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

pub fn run(args: &InitArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let stats = init_demo_database(&runtime_paths.db_path, args.force).map_err(|error| {
        envelope_failure(
            Envelope::error("init", "init_failed", format!("{error:#}"))
                .with_error_details(json!({ "db_path": runtime_paths.db_path.display().to_string() })),
            EXIT_RUNTIME_FAILURE,
        )
    })?;

    print_envelope(
        &Envelope::ok("init", json!(stats))
            .with_meta("db_path", json!(runtime_paths.db_path.display().to_string())),
    );
    Ok(())
}
