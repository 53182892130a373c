//! Provider abstractions for embeddings, generation and vector storage
//!
//! Embeddings and local generation go to an Ollama server, hosted generation to
//! Gemini, and vectors to a local SQLite collection.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use embedding::{EmbeddingProvider, RetryPolicy, RetryingEmbedder};
pub use gemini::GeminiClient;
pub use llm::{ActiveLlm, LlmProvider};
pub use local::LocalVectorStore;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use vector_store::VectorStoreProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

/// Build the retrying Ollama embedder for a catalogue model
pub fn build_embedder(config: &EmbeddingConfig, model_name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    let spec = config.model(model_name).ok_or_else(|| Error::InvalidModelSelection {
        kind: "embedding",
        name: model_name.to_string(),
    })?;

    let client = Arc::new(OllamaClient::new(
        &config.ollama_base_url,
        Duration::from_secs(config.timeout_secs),
    )?);
    let ollama = OllamaEmbedder::new(client, &spec.ollama_model, spec.dimensions);

    Ok(Arc::new(RetryingEmbedder::new(
        Arc::new(ollama),
        RetryPolicy::from_config(config),
    )))
}

/// Build the generative model for a catalogue name
pub fn build_llm(config: &LlmConfig, model_name: &str) -> Result<Arc<dyn LlmProvider>> {
    if !config.inference_models.iter().any(|m| m == model_name) {
        return Err(Error::InvalidModelSelection {
            kind: "inference",
            name: model_name.to_string(),
        });
    }

    if model_name == "gemini" {
        return Ok(Arc::new(GeminiClient::new(config)?));
    }

    let client = Arc::new(OllamaClient::new(
        &config.ollama_base_url,
        Duration::from_secs(config.timeout_secs),
    )?);
    Ok(Arc::new(OllamaLlm::new(
        client,
        model_name,
        config.temperature,
        config.max_new_tokens,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_unknown_models() {
        let embed = build_embedder(&EmbeddingConfig::default(), "nope");
        assert!(matches!(embed, Err(Error::InvalidModelSelection { kind: "embedding", .. })));

        let llm = build_llm(&LlmConfig::default(), "gpt-x");
        assert!(matches!(llm, Err(Error::InvalidModelSelection { kind: "inference", .. })));
    }

    #[test]
    fn test_build_known_models() {
        let embedder = build_embedder(&EmbeddingConfig::default(), "BAAI/bge-m3").unwrap();
        assert_eq!(embedder.dimensions(), 1024);

        let llm = build_llm(&LlmConfig::default(), "phi3").unwrap();
        assert_eq!(llm.name(), "ollama");
        assert_eq!(llm.model(), "phi3");

        let gemini = build_llm(&LlmConfig::default(), "gemini").unwrap();
        assert_eq!(gemini.model(), "gemini-2.0-flash");
    }
}
