use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    ask::AskArgs, contract::ContractArgs, guard::GuardArgs, health::HealthArgs, init::InitArgs,
    schema::SchemaArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "askguard",
    version,
    about = "Guarded natural-language questions over a SQLite database"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Database file; defaults to ~/.askguard/data.db
    #[arg(long, global = true, value_name = "PATH", env = "ASKGUARD_DB")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the demo banking database
    Init(InitArgs),
    /// Answer a question through the guarded pipeline
    Ask(AskArgs),
    /// Run only the safety guard against the live schema
    Guard(GuardArgs),
    /// Print the introspected schema and its fingerprint
    Schema(SchemaArgs),
    /// Check the database and generator are reachable
    Health(HealthArgs),
    /// Print the JSON Schema of a pipeline result
    Contract(ContractArgs),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Ask(_) => "ask",
            Self::Guard(_) => "guard",
            Self::Schema(_) => "schema",
            Self::Health(_) => "health",
            Self::Contract(_) => "contract",
        }
    }
}
