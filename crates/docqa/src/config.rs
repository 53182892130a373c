//! Configuration for the document Q&A service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding model catalogue
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Generative model configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Upload log location
    pub storage: StorageConfig,
    /// Chat history location
    pub chat_history: ChatHistoryConfig,
    /// Processing limits
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.gemini_api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.ollama_base_url = url.clone();
                self.embeddings.ollama_base_url = url;
            }
        }
    }

    /// Reject settings that would break the pipelines at runtime
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.model(&self.embeddings.default_model).is_none() {
            return Err(Error::Config(format!(
                "default embedding model '{}' is not in the catalogue",
                self.embeddings.default_model
            )));
        }
        if !self.llm.inference_models.contains(&self.llm.default_model) {
            return Err(Error::Config(format!(
                "default inference model '{}' is not in the catalogue",
                self.llm.default_model
            )));
        }
        if self.vector_db.hnsw_m == 0 || self.vector_db.hnsw_ef_search == 0 {
            return Err(Error::Config(
                "vector_db.hnsw_m and vector_db.hnsw_ef_search must be positive".to_string(),
            ));
        }
        if self.embeddings.max_attempts == 0 {
            return Err(Error::Config("embeddings.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// One selectable embedding model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingModelSpec {
    /// Public name used by the API
    pub name: String,
    /// Model tag on the Ollama server
    pub ollama_model: String,
    /// Vector dimension produced by the model
    pub dimensions: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model active at startup
    pub default_model: String,
    /// Selectable models
    pub models: Vec<EmbeddingModelSpec>,
    /// Ollama base URL used for embeddings
    pub ollama_base_url: String,
    /// Attempts per embed call
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_backoff_ms: u64,
    /// Timeout for a single attempt in seconds
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Look up a model by its public name
    pub fn model(&self, name: &str) -> Option<&EmbeddingModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Public names of every selectable model
    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            default_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            models: vec![
                EmbeddingModelSpec {
                    name: "BAAI/bge-m3".to_string(),
                    ollama_model: "bge-m3".to_string(),
                    dimensions: 1024,
                },
                EmbeddingModelSpec {
                    name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                    ollama_model: "all-minilm".to_string(),
                    dimensions: 384,
                },
            ],
            ollama_base_url: "http://localhost:11434".to_string(),
            max_attempts: 3,
            retry_backoff_ms: 1000,
            timeout_secs: 30,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Generative model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model active at startup
    pub default_model: String,
    /// Selectable models; "gemini" routes to the Gemini API, anything else to Ollama
    pub inference_models: Vec<String>,
    /// Gemini API key (usually from GEMINI_API_KEY)
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    /// Gemini model id
    pub gemini_model: String,
    /// Gemini REST base URL
    pub gemini_base_url: String,
    /// Ollama base URL used for local generation
    pub ollama_base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_new_tokens: u32,
    /// Generation timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini".to_string(),
            inference_models: vec![
                "gemini".to_string(),
                "llama3.2:3b".to_string(),
                "phi3".to_string(),
            ],
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_new_tokens: 500,
            timeout_secs: 120,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// SQLite file holding every collection
    pub storage_path: PathBuf,
    /// Collection name
    pub collection: String,
    /// HNSW M parameter (connections per layer)
    pub hnsw_m: usize,
    /// HNSW ef_construction parameter
    pub hnsw_ef_construction: usize,
    /// HNSW ef_search parameter
    pub hnsw_ef_search: usize,
    /// Expected collection size, used to size the graph
    pub hnsw_max_elements: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: data_dir().join("vector_db").join("index.sqlite3"),
            collection: "documents".to_string(),
            hnsw_m: 32,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 100,
            hnsw_max_elements: 100_000,
        }
    }
}

/// Upload log location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON array of ingested files
    pub upload_log_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_log_path: data_dir().join("vector_db").join("document_log.json"),
        }
    }
}

/// Chat history location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryConfig {
    /// Directory with one JSON file per user
    pub storage_dir: PathBuf,
}

impl Default for ChatHistoryConfig {
    fn default() -> Self {
        Self {
            storage_dir: data_dir().join("chat_history"),
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Timeout for processing a single file in seconds (default: 300 = 5 minutes)
    pub file_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: 300,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docqa")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(
            config.embeddings.model("BAAI/bge-m3").map(|m| m.dimensions),
            Some(1024)
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 256
            chunk_overlap = 32

            [llm]
            default_model = "phi3"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 256);
        assert_eq!(config.llm.default_model, "phi3");
        assert_eq!(config.llm.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.server.port, 8000);
        config.validate().unwrap();
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_hnsw_settings_from_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            [vector_db]
            hnsw_m = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.vector_db.hnsw_m, 8);
        assert_eq!(config.vector_db.hnsw_ef_search, 100);
        assert_eq!(config.vector_db.collection, "documents");

        let mut config = config;
        config.vector_db.hnsw_m = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let mut config = RagConfig::default();
        config.embeddings.default_model = "missing".to_string();
        assert!(config.validate().is_err());
    }
}
