pub mod ask;
pub mod contract;
pub mod guard;
pub mod health;
pub mod init;
pub mod schema;

use std::path::Path;

use anyhow::{Error, Result};
use serde_json::json;

use super::EXIT_RUNTIME_FAILURE;
use crate::config::{RoleMappings, RuntimePaths, resolve_user_path};
use crate::models::{Envelope, EnvelopeFailure};

pub(crate) fn print_envelope(envelope: &Envelope) {
    println!("{}", envelope.to_json_line());
}

pub(crate) fn envelope_failure(envelope: Envelope, exit_code: i32) -> Error {
    Error::new(EnvelopeFailure::new(envelope, exit_code))
}

pub(crate) fn require_database(command: &str, db_path: &Path) -> Result<()> {
    if db_path.is_file() {
        return Ok(());
    }
    let envelope = Envelope::error(
        command,
        "database_missing",
        "database not found; run `askguard init` or pass --db",
    )
    .with_error_details(json!({ "db_path": db_path.display().to_string() }));
    Err(envelope_failure(envelope, EXIT_RUNTIME_FAILURE))
}

pub(crate) fn load_role_mappings(
    path: Option<&Path>,
    runtime_paths: &RuntimePaths,
) -> Result<RoleMappings> {
    match path {
        Some(path) => {
            let resolved = resolve_user_path(path, &runtime_paths.home_dir, &runtime_paths.cwd)?;
            RoleMappings::load(&resolved)
        }
        None => Ok(RoleMappings::default()),
    }
}
