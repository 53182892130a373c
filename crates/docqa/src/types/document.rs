//! Document, chunk and upload log types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to a stored chunk, as an ordered JSON object
pub type Metadata = serde_json::Map<String, Value>;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// CSV file
    Csv,
    /// Plain text file
    Txt,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Detect file type from a filename's extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// File-level metadata extracted before parsing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

impl DocumentMetadata {
    /// Sentinel metadata when nothing could be read
    pub fn unknown() -> Self {
        Self {
            title: "Unknown".to_string(),
            author: "Unknown".to_string(),
            pages: 0,
            creation_date: None,
            modification_date: None,
        }
    }

    /// Metadata for formats without an info dictionary
    pub fn titled(title: impl Into<String>, pages: u32) -> Self {
        Self {
            title: title.into(),
            author: "Unknown".to_string(),
            pages,
            creation_date: None,
            modification_date: None,
        }
    }
}

/// Metadata stored next to every chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub filename: String,
    pub file_hash: String,
    pub chunk_length: usize,
    #[serde(flatten)]
    pub document: DocumentMetadata,
}

impl ChunkMetadata {
    /// Flatten into the JSON object persisted by the vector store
    pub fn into_map(self) -> Metadata {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Metadata::new(),
        }
    }
}

/// A chunk as held by the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A nearest-neighbour result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine distance, lower is closer
    pub distance: f32,
}

impl SearchHit {
    /// String metadata value, if present
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// One line of the upload log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadLogEntry {
    pub filename: String,
    pub chunks_stored: usize,
    pub upload_time: chrono::DateTime<chrono::Utc>,
    pub metadata: DocumentMetadata,
    pub file_hash: String,
}
