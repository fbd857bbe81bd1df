//! HTTP clients for the text generation providers.
//!
//! Both clients issue requests directly against the provider's REST surface and return the raw
//! completion text. Nothing here interprets the text; callers decide what it means.

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to a generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fully qualified model identifier understood by the provider.
    pub model: String,
    /// Instruction framing the conversation.
    pub system_prompt: String,
    /// Rendered user prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object.
    pub json_output: bool,
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a completion for the supplied request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the generation client selected by configuration.
pub fn build_generation_client(config: &Config) -> Box<dyn GenerationClient> {
    match config.generation_provider {
        GenerationProvider::OpenAI => Box::new(OpenAiGenerationClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
        )),
        GenerationProvider::Ollama => {
            Box::new(OllamaGenerationClient::new(config.ollama_url.clone()))
        }
    }
}

fn http_client(agent: &str) -> Client {
    Client::builder()
        .user_agent(agent)
        .build()
        .unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Falling back to default reqwest client");
            Client::new()
        })
}

async fn check_status(
    response: Response,
    endpoint: &str,
    provider: &str,
) -> Result<Response, GenerationClientError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(GenerationClientError::ProviderUnavailable(format!(
            "{provider} endpoint {endpoint} returned 404"
        )));
    }

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationClientError::GenerationFailed(format!(
            "{provider} returned {status}: {body}"
        )));
    }

    Ok(response)
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiGenerationClient {
    /// Construct a client for `base_url` authenticated with `api_key`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: http_client("stylemine/generate"),
            base_url,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let mut payload = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.prompt},
            ],
            "temperature": request.temperature,
        });
        if request.json_output {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status(response, &endpoint, "OpenAI").await?;

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            GenerationClientError::InvalidResponse("chat completion had no choices".into())
        })?;

        let content = choice.message.content.unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

/// Client for a local Ollama runtime.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Construct a client for the Ollama runtime at `base_url`.
    pub fn new(base_url: String) -> Self {
        Self {
            http: http_client("stylemine/generate"),
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let mut payload = json!({
            "model": request.model,
            "system": request.system_prompt,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });
        if request.json_output {
            payload["format"] = json!("json");
        }

        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status(response, &endpoint, "Ollama").await?;

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "llama".into(),
            system_prompt: "You analyze style.".into(),
            prompt: "Analyze".into(),
            temperature: 0.2,
            json_output: true,
        }
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"format": "json", "stream": false}"#);
                then.status(200).json_body(json!({
                    "response": "  {\"tone\": \"dry\"}\n",
                    "done": true
                }));
            })
            .await;

        let text = client.generate(request()).await.expect("completion");

        mock.assert();
        assert_eq!(text, "{\"tone\": \"dry\"}");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client = OllamaGenerationClient::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client.generate(request()).await.expect_err("HTTP 500");
        match error {
            GenerationClientError::GenerationFailed(message) => assert!(message.contains("500")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn openai_client_sends_bearer_and_reads_first_choice() {
        let server = MockServer::start_async().await;
        let client = OpenAiGenerationClient::new(server.base_url(), "sk-test".into());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"response_format": {"type": "json_object"}}"#);
                then.status(200).json_body(json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": " {\"humor\": null} "}}
                    ]
                }));
            })
            .await;

        let text = client.generate(request()).await.expect("completion");

        mock.assert();
        assert_eq!(text, "{\"humor\": null}");
    }

    #[tokio::test]
    async fn openai_client_reports_missing_endpoint_as_unavailable() {
        let server = MockServer::start_async().await;
        let client = OpenAiGenerationClient::new(server.base_url(), "sk-test".into());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(404);
            })
            .await;

        let error = client.generate(request()).await.expect_err("404");
        assert!(matches!(error, GenerationClientError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn openai_client_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        let client = OpenAiGenerationClient::new(server.base_url(), "sk-test".into());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let error = client.generate(request()).await.expect_err("no choices");
        assert!(matches!(error, GenerationClientError::InvalidResponse(_)));
    }
}
