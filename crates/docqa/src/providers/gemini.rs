//! Gemini client for hosted answer generation
//!
//! Calls the public `generateContent` REST endpoint with an API key.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::llm::LlmProvider;

/// Gemini client via the Generative Language API
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Create a new Gemini client; a missing key only fails at generation time
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if config.gemini_api_key.is_none() {
            tracing::warn!("Gemini API key not found, gemini generation will fail");
        }

        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_new_tokens,
        })
    }

    /// Get the API endpoint URL (without the key)
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct Part {
    text: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::llm("Gemini not available, GEMINI_API_KEY is not set"))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }

        let gen_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse Gemini response: {}", e)))?;

        gen_response
            .into_text()
            .ok_or_else(|| Error::llm("No text in Gemini response"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.api_key.is_some())
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = GeminiClient::new(&LlmConfig::default()).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
        assert!(!client.health_check().await.unwrap());
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(&LlmConfig::default()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("Hello there"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.into_text().is_none());
    }
}
