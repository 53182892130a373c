//! In-process providers for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Deterministic bag-of-words embedder
pub struct FakeEmbedder {
    dims: usize,
    reported_dims: usize,
    delay: Option<Duration>,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            reported_dims: dims,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Claim a different dimension than the vectors actually have
    pub fn reporting_dimensions(mut self, dims: usize) -> Self {
        self.reported_dims = dims;
        self
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % self.dims as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            v[0] = 1.0;
        } else {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.reported_dims
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Fails the first `failures` calls, then behaves like [`FakeEmbedder`]
pub struct FlakyEmbedder {
    inner: FakeEmbedder,
    failures: u32,
    pub calls: AtomicU32,
}

impl FlakyEmbedder {
    pub fn new(dims: usize, failures: u32) -> Self {
        Self {
            inner: FakeEmbedder::new(dims),
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::embedding("connection refused"));
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Scripted generative model that records every prompt
pub struct FakeLlm {
    reply: std::result::Result<String, String>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn answering(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(Error::llm)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_ok())
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}
