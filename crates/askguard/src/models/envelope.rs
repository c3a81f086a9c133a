use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::time::now_utc_timestamp;

pub const ENVELOPE_SCHEMA_VERSION: &str = "askguard.envelope.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeNotice {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// JSON document every CLI command prints on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub schema_version: String,
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: BTreeMap<String, Value>,
    pub warnings: Vec<EnvelopeNotice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeNotice>,
}

impl Envelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::new(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::new(command, false);
        envelope.error = Some(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn new(command: impl Into<String>, ok: bool) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION.to_string(),
            ok,
            command: command.into(),
            generated_at_utc: now_utc_timestamp(),
            data: None,
            meta: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.push(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    /// Compact JSON, or a fixed fallback document if encoding fails.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(
                "{{\"ok\":false,\"command\":\"{}\",\"error\":{{\"code\":\"envelope_encode_failed\",\"message\":\"{}\"}}}}",
                self.command,
                error.to_string().replace('"', "'")
            )
        })
    }
}

/// Command failure that carries the envelope to print before exiting.
#[derive(Debug, Clone)]
pub struct EnvelopeFailure {
    envelope: Envelope,
    exit_code: i32,
}

impl EnvelopeFailure {
    #[must_use]
    pub fn new(envelope: Envelope, exit_code: i32) -> Self {
        Self {
            envelope,
            exit_code,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl Display for EnvelopeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.envelope.to_json_line())
    }
}

impl std::error::Error for EnvelopeFailure {}
