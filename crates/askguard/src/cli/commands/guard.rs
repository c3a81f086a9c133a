use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{envelope_failure, load_role_mappings, print_envelope, require_database};
use crate::cli::{EXIT_PIPELINE_FAILURE, EXIT_RUNTIME_FAILURE};
use crate::config::{DEFAULT_ROW_LIMIT, RuntimePaths};
use crate::guard::guard;
use crate::models::{Envelope, Role};
use crate::schema::{SqliteSchemaProvider, describe};

#[derive(Debug, Clone, Args)]
pub struct GuardArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    #[arg(long, value_enum, default_value_t = Role::Analyst)]
    pub role: Role,

    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT)]
    pub limit: u64,

    #[arg(long, value_name = "PATH")]
    pub roles: Option<PathBuf>,
}

pub fn run(args: &GuardArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    require_database("guard", &runtime_paths.db_path)?;
    let mappings = load_role_mappings(args.roles.as_deref(), runtime_paths)?;

    let schema = describe(&SqliteSchemaProvider::new(&runtime_paths.db_path)).map_err(|error| {
        envelope_failure(
            Envelope::error("guard", "schema_unavailable", error.to_string()),
            EXIT_RUNTIME_FAILURE,
        )
    })?;

    match guard(&args.sql, args.role, &mappings, &schema.tables, args.limit) {
        Ok(guarded) => {
            let envelope = Envelope::ok(
                "guard",
                json!({
                    "safe_sql": guarded.sql,
                    "reason": guarded.reason,
                    "reason_message": guarded.reason_message(),
                }),
            )
            .with_meta("role", json!(args.role))
            .with_meta("default_limit", json!(args.limit));
            print_envelope(&envelope);
            Ok(())
        }
        Err(error) => {
            let envelope = Envelope::error("guard", error.code(), error.to_string())
                .with_meta("role", json!(args.role))
                .with_error_details(json!({ "sql": args.sql }));
            Err(envelope_failure(envelope, EXIT_PIPELINE_FAILURE))
        }
    }
}
