//! Ollama-based providers for embeddings and local generation

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Thin Ollama REST client shared by the embedder and the LLM
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new client; `timeout` bounds every request at the HTTP layer
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed one text with the given model
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, prompt: text })
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {}",
                response.status()
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        Ok(embed_response.embedding)
    }

    /// Generate a completion
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        tracing::info!("Generating answer with model: {}", model);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

        Ok(generate_response.response.trim().to_string())
    }
}

/// Ollama embedding provider (all-minilm, bge-m3)
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create from an existing client
    pub fn new(client: Arc<OllamaClient>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaLlm {
    /// Create from an existing client
    pub fn new(client: Arc<OllamaClient>, model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client
            .generate(&self.model, prompt, self.temperature, self.max_tokens)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
