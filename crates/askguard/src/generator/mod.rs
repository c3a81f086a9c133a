pub mod ollama;

use crate::correction::GuidedAsk;
use crate::error::GenerationError;

pub use ollama::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL, OLLAMA_HOST_ENV, OllamaGenerator};

/// Inputs for one generator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub guidance: Option<&'a str>,
}

/// Turns a question plus schema text into a candidate query.
pub trait QueryGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;

    /// Whether a guidance block changes the output; when false the
    /// correction loop is skipped for this generator.
    fn supports_guidance(&self) -> bool {
        true
    }
}

#[must_use]
pub fn build_prompt(request: &GenerationRequest<'_>) -> String {
    let mut prompt = String::from(
        "### Task\nGenerate a single SQLite SELECT query that answers the question.\n\n",
    );
    prompt.push_str("### Database Schema\n");
    prompt.push_str(request.schema);
    prompt.push_str("\n\n");
    if let Some(guidance) = request.guidance.filter(|text| !text.trim().is_empty()) {
        prompt.push_str("### Instructions\n");
        prompt.push_str(guidance);
        prompt.push_str("\n\n");
    }
    prompt.push_str("### Question\n");
    prompt.push_str(request.question);
    prompt.push_str("\n\n### SQL\n");
    prompt
}

/// Re-asks `generator` against a fixed schema text.
pub struct SchemaBoundAsk<'a> {
    generator: &'a dyn QueryGenerator,
    schema: &'a str,
}

impl<'a> SchemaBoundAsk<'a> {
    #[must_use]
    pub fn new(generator: &'a dyn QueryGenerator, schema: &'a str) -> Self {
        Self { generator, schema }
    }
}

impl GuidedAsk for SchemaBoundAsk<'_> {
    fn ask_with_guidance(&self, question: &str, guidance: &str) -> Result<String, GenerationError> {
        self.generator.generate(&GenerationRequest {
            question,
            schema: self.schema,
            guidance: Some(guidance),
        })
    }
}

/// Replays a caller-supplied candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticGenerator {
    candidate: String,
}

impl StaticGenerator {
    #[must_use]
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
        }
    }
}

impl QueryGenerator for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        Ok(self.candidate.clone())
    }

    fn supports_guidance(&self) -> bool {
        false
    }
}
