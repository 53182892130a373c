//! LLM provider trait for generating answers

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Trait for prompt-in, text-out generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
/// - `GeminiClient`: Google Gemini API (gemini-2.0-flash)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a fully built prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

/// The selected inference model under its catalogue name
#[derive(Clone)]
pub struct ActiveLlm {
    /// Catalogue name reported as `model_used`
    pub name: String,
    pub provider: Arc<dyn LlmProvider>,
}

impl ActiveLlm {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}
