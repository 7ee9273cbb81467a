//! Factory for creating LLM providers from configuration

use crate::config::{LLMBackend, LLMProviderConfig};
use crate::error::Result;
use crate::llm::providers::ClaudeCliProvider;
use crate::llm::{LLMProvider, MockLLMProvider};
use std::sync::Arc;

#[cfg(feature = "llm-ollama")]
use crate::llm::providers::OllamaProvider;

#[cfg(feature = "llm-anthropic")]
use crate::llm::providers::AnthropicProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g., missing API key)
    pub fn create(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        let model = (!config.model.is_empty()).then(|| config.model.clone());

        match config.provider {
            LLMBackend::Mock => Ok(Arc::new(MockLLMProvider)),

            LLMBackend::ClaudeCli => Ok(Arc::new(ClaudeCliProvider::new(
                config.api_key.clone(),
                model,
                config.timeout,
            ))),

            #[cfg(feature = "llm-anthropic")]
            LLMBackend::Anthropic => {
                let provider = match &config.api_key {
                    Some(api_key) => AnthropicProvider::new(
                        api_key.clone(),
                        model,
                        config.base_url.clone(),
                        config.timeout,
                    )?,
                    None => AnthropicProvider::from_env(model, config.timeout)?,
                };
                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "llm-anthropic"))]
            LLMBackend::Anthropic => Err(crate::error::WayfarerError::Configuration(
                "Anthropic provider requires 'llm-anthropic' feature".to_string(),
            )),

            #[cfg(feature = "llm-ollama")]
            LLMBackend::Ollama => Ok(Arc::new(OllamaProvider::new(
                model,
                config.base_url.clone(),
                config.timeout,
            )?)),

            #[cfg(not(feature = "llm-ollama"))]
            LLMBackend::Ollama => Err(crate::error::WayfarerError::Configuration(
                "Ollama provider requires 'llm-ollama' feature".to_string(),
            )),
        }
    }
}
