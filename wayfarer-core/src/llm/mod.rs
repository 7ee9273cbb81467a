use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for LLM operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Temperature for generation (0.0-2.0, default: 0.7)
    pub temperature: f32,

    /// Maximum tokens to generate (default: 1024)
    pub max_tokens: usize,

    /// System prompt for context
    pub system_prompt: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            system_prompt: None,
        }
    }
}

impl LLMConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

impl From<&crate::config::LLMProviderConfig> for LLMConfig {
    fn from(config: &crate::config::LLMProviderConfig) -> Self {
        LLMConfig::new()
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Request to an LLM provider
#[derive(Debug, Clone)]
pub struct LLMRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Build a request from a prompt and the per-call settings.
    pub fn from_prompt(prompt: impl Into<String>, config: &LLMConfig) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &config.system_prompt {
            messages.push(Message {
                role: MessageRole::System,
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: MessageRole::User,
            content: prompt.into(),
        });

        Self {
            messages,
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Generated content
    pub content: String,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Trait for LLM provider implementations.
///
/// Implementors only need one of `generate` or `generate_request`; each has a
/// default written in terms of the other.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text for a single prompt.
    async fn generate(&self, prompt: &str, config: &LLMConfig) -> Result<String> {
        let request = LLMRequest::from_prompt(prompt, config);
        let response = self.generate_request(&request).await?;
        Ok(response.content)
    }

    /// Generate text from a structured request.
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let prompt = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let config = LLMConfig {
            temperature: request.temperature.unwrap_or(0.7),
            max_tokens: request.max_tokens.unwrap_or(1024),
            system_prompt: request
                .messages
                .iter()
                .find(|m| m.role == MessageRole::System)
                .map(|m| m.content.clone()),
        };

        let content = self.generate(&prompt, &config).await?;
        Ok(LLMResponse {
            content,
            usage: None,
        })
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Invoke the model and always come back with text.
///
/// Provider failures are logged and turned into an `Error: ...` string, which
/// downstream parsing treats like any other unusable answer.
pub async fn generate_text(provider: &dyn LLMProvider, prompt: &str, config: &LLMConfig) -> String {
    tracing::debug!(
        provider = %provider.model_info().provider,
        prompt_len = prompt.len(),
        "Invoking language model"
    );
    match provider.generate(prompt, config).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Language model call failed");
            format!("Error: {}", e)
        }
    }
}

/// Offline provider that answers every prompt with the same sentence.
pub struct MockLLMProvider;

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn generate(&self, prompt: &str, _config: &LLMConfig) -> Result<String> {
        let preview: String = prompt.chars().take(50).collect();
        tracing::info!("Mock LLM received prompt: {}...", preview);
        Ok("This is a mock response from the LLM.".to_string())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "mock".to_string(),
            model_name: "none".to_string(),
        }
    }
}

pub mod factory;
pub mod providers;

pub use factory::LLMProviderFactory;
