//! Embedding provider trait and the retrying wrapper used by the pipelines

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (all-minilm, bge-m3)
/// - `RetryingEmbedder`: retry, timeout and dimension checks around another provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, same length and order
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Vector dimension produced by the model
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Retry settings for embedding calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per text
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
    /// Bound on a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Build from configuration
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Embedder that retries transient failures and validates vector length
pub struct RetryingEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl RetryingEmbedder {
    /// Wrap a provider
    pub fn new(inner: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.policy.max_attempts {
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, self.inner.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout("Embedding request", self.policy.attempt_timeout)),
            };

            match outcome {
                Ok(vector) => return self.check_dimension(vector),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        "Embedding failed (attempt {}/{}): {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        Err(Error::EmbeddingUnavailable {
            attempts: self.policy.max_attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn check_dimension(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.inner.dimensions();
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for RetryingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_retry(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
