use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{GenerationRequest, QueryGenerator, build_prompt};
use crate::error::GenerationError;

pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "sqlcoder:7b";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

/// Blocking client for a local Ollama server's `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| GenerationError::Unavailable(format!("HTTP client: {error}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// `--ollama-url` wins over `OLLAMA_HOST`, which wins over the default.
    #[must_use]
    pub fn resolve_base_url(explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| std::env::var(OLLAMA_HOST_ENV).ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the server answers `/api/tags`.
    pub fn ping(&self) -> Result<(), GenerationError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .map_err(|error| GenerationError::Unavailable(format!("HTTP error: {error}")))?;
        if !response.status().is_success() {
            return Err(GenerationError::Unavailable(format!(
                "HTTP status: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

impl QueryGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody {
            model: &self.model,
            prompt: build_prompt(request),
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };

        tracing::debug!(model = %self.model, guided = request.guidance.is_some(), "calling generator");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|error| GenerationError::Unavailable(format!("HTTP error: {error}")))?;

        if !response.status().is_success() {
            return Err(GenerationError::Unavailable(format!(
                "HTTP status: {}",
                response.status()
            )));
        }

        let reply: GenerateReply = response
            .json()
            .map_err(|error| GenerationError::Unavailable(format!("invalid reply: {error}")))?;
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_OLLAMA_URL, OllamaGenerator};

    #[test]
    fn explicit_url_wins_and_trailing_slash_is_dropped() {
        assert_eq!(
            OllamaGenerator::resolve_base_url(Some("http://gpu-box:11434")),
            "http://gpu-box:11434"
        );
        let generator =
            OllamaGenerator::new("http://gpu-box:11434/", "sqlcoder:7b").expect("client builds");
        assert_eq!(generator.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn blank_explicit_url_falls_back() {
        let resolved = OllamaGenerator::resolve_base_url(Some("  "));
        assert_eq!(resolved, DEFAULT_OLLAMA_URL);
    }
}
