use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::print_envelope;
use crate::models::{ENVELOPE_SCHEMA_VERSION, Envelope, result_json_schema};

#[derive(Debug, Clone, Args)]
pub struct ContractArgs {}

pub fn run(_args: &ContractArgs) -> Result<()> {
    print_envelope(
        &Envelope::ok("contract", result_json_schema())
            .with_meta("envelope_schema_version", json!(ENVELOPE_SCHEMA_VERSION)),
    );
    Ok(())
}
