//! The external analysis capability used by the mining engine.
//!
//! The engine sees a single operation, [`AnalysisCapability::invoke`]: pick a template, supply
//! variables, get text back. [`PromptEngine`] implements it by rendering the template and
//! forwarding the prompt to a [`GenerationClient`].

mod client;
mod prompts;

pub use client::{
    GenerationClient, GenerationClientError, GenerationRequest, OllamaGenerationClient,
    OpenAiGenerationClient, build_generation_client,
};
pub use prompts::{PromptVariables, TemplateKey, render_template};

use crate::config::Config;
use async_trait::async_trait;

const SYSTEM_PROMPT: &str = "You are an expert in writing style analysis.";
const MINING_TEMPERATURE: f32 = 0.2;

/// Opaque text-in/text-out analysis service.
///
/// Implementations may fail or return arbitrary text; callers must not assume valid JSON.
#[async_trait]
pub trait AnalysisCapability: Send + Sync {
    /// Render `template` with `variables` and return the provider's raw answer.
    async fn invoke(
        &self,
        template: TemplateKey,
        variables: &PromptVariables,
    ) -> Result<String, GenerationClientError>;
}

/// Template renderer bound to a generation client and model.
pub struct PromptEngine {
    client: Box<dyn GenerationClient>,
    model: String,
}

impl PromptEngine {
    /// Wrap an existing client.
    pub fn new(client: Box<dyn GenerationClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Build the engine for the configured provider and model.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            build_generation_client(config),
            config.generation_model.clone(),
        )
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnalysisCapability for PromptEngine {
    async fn invoke(
        &self,
        template: TemplateKey,
        variables: &PromptVariables,
    ) -> Result<String, GenerationClientError> {
        let prompt = render_template(template.template(), variables);
        tracing::debug!(
            template = template.as_str(),
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Invoking generation provider"
        );
        self.client
            .generate(GenerationRequest {
                model: self.model.clone(),
                system_prompt: SYSTEM_PROMPT.to_string(),
                prompt,
                temperature: MINING_TEMPERATURE,
                json_output: true,
            })
            .await
    }
}
