pub mod envelope;
pub mod question;
pub mod result;

pub use envelope::{ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeFailure, EnvelopeNotice};
pub use question::{ANONYMOUS_USER, Question, Role};
pub use result::{
    ExecutionResult, GuardReason, GuardedQuery, PipelineResult, QueryRows, ResultRow,
    result_json_schema,
};
