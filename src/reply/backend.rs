//! Text generation backends.
//!
//! A backend is an untrusted capability: it may be missing, slow, or
//! return junk. The reply generator owns one and treats every error from it
//! as a reason to use the template instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackendKind, GenerationConfig};
use crate::error::GenerationError;

/// A prompt-continuation capability.
pub trait TextGenerator: Send + Sync {
    /// Whether the backend initialized and can be asked for text.
    fn available(&self) -> bool;

    /// Continue `prompt`, producing at most `max_length` tokens.
    fn attempt_generate(&self, prompt: &str, max_length: usize) -> Result<String, GenerationError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Null backend: always unavailable.
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextGenerator for Unavailable {
    fn available(&self) -> bool {
        false
    }

    fn attempt_generate(&self, _prompt: &str, _max_length: usize) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Request body for an Ollama-style `/api/generate` endpoint.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    num_predict: usize,
    temperature: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Backend that posts prompts to a local HTTP completion endpoint.
pub struct HttpGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    top_k: u32,
}

impl HttpGenerator {
    /// Build the HTTP client. Fails only if the client cannot be constructed.
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_k: config.top_k,
        })
    }
}

impl TextGenerator for HttpGenerator {
    fn available(&self) -> bool {
        true
    }

    fn attempt_generate(&self, prompt: &str, max_length: usize) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                num_predict: max_length,
                temperature: self.temperature,
                top_k: self.top_k,
            },
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Requesting completion");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let body: GenerateResponse = response
            .json()
            .map_err(|e| GenerationError::InvalidOutput(format!("bad response body: {e}")))?;
        Ok(body.response)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Construct the backend selected in `config`.
///
/// Initialization failure is not fatal: it yields an [`Unavailable`] backend.
pub fn from_config(config: &GenerationConfig) -> Box<dyn TextGenerator> {
    match config.backend {
        BackendKind::None => Box::new(Unavailable::new("no generation backend configured")),
        BackendKind::Http => match HttpGenerator::new(config) {
            Ok(generator) => {
                info!(endpoint = %config.endpoint, model = %config.model, "Using HTTP generation backend");
                Box::new(generator)
            }
            Err(e) => {
                warn!(error = %e, "Generation backend failed to initialize, using templates");
                Box::new(Unavailable::new(e.to_string()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_backend() {
        let backend = Unavailable::new("missing");
        assert!(!backend.available());
        assert!(matches!(
            backend.attempt_generate("p", 10),
            Err(GenerationError::Unavailable(_))
        ));
    }

    #[test]
    fn test_from_config_none() {
        let backend = from_config(&GenerationConfig::default());
        assert!(!backend.available());
        assert_eq!(backend.name(), "unavailable");
    }

    #[test]
    fn test_http_backend_unreachable_is_request_error() {
        let config = GenerationConfig {
            backend: BackendKind::Http,
            // Port 9 (discard) on localhost is not expected to serve HTTP
            endpoint: "http://127.0.0.1:9/api/generate".to_string(),
            timeout_secs: 2,
            ..GenerationConfig::default()
        };
        let backend = from_config(&config);
        assert!(backend.available());
        assert!(matches!(
            backend.attempt_generate("prompt", 5),
            Err(GenerationError::Request(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            options: SamplingOptions {
                num_predict: 150,
                temperature: 0.5,
                top_k: 50,
            },
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["options"]["num_predict"], 150);
        assert_eq!(value["stream"], false);
    }
}
