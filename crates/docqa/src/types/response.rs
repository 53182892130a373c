//! Response types for the HTTP surface

use serde::{Deserialize, Serialize};

use super::document::{DocumentMetadata, Metadata, SearchHit, UploadLogEntry};

/// Result of ingesting one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub filename: String,
    pub chunks_stored: usize,
    pub embedding_dimension: usize,
    pub metadata: DocumentMetadata,
}

/// `/upload` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(flatten)]
    pub result: IngestResult,
}

impl From<IngestResult> for UploadResponse {
    fn from(result: IngestResult) -> Self {
        Self {
            status: "success".to_string(),
            result,
        }
    }
}

/// A file that failed inside a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

/// `/upload-folder` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: String,
    pub documents_processed: Vec<IngestResult>,
    pub errors: Vec<FileError>,
    pub processed_count: usize,
    pub error_count: usize,
    pub total_files: usize,
}

impl BatchResponse {
    /// Build a response, marking the batch failed when nothing succeeded
    pub fn new(documents_processed: Vec<IngestResult>, errors: Vec<FileError>, total_files: usize) -> Self {
        let status = if documents_processed.is_empty() {
            "failed"
        } else {
            "success"
        };
        Self {
            status: status.to_string(),
            processed_count: documents_processed.len(),
            error_count: errors.len(),
            documents_processed,
            errors,
            total_files,
        }
    }

    /// Response for a request that carried no files
    pub fn empty() -> Self {
        Self::new(
            Vec::new(),
            vec![FileError {
                filename: "folder".to_string(),
                error: "No files received".to_string(),
            }],
            0,
        )
    }
}

/// A deduplicated source reference in a chat answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub filename: String,
    pub title: String,
    pub author: String,
}

impl Source {
    /// Read a source from chunk metadata, applying display defaults
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let field = |key: &str, default: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            filename: field("filename", "Unknown"),
            title: field("title", "Untitled"),
            author: field("author", "Unknown"),
        }
    }

    /// Key used to collapse repeated sources
    pub fn dedup_key(&self) -> String {
        format!("{}-{}", self.filename, self.title)
    }
}

/// Answer returned by every chat route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub model_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_used: Option<String>,
}

/// Column-oriented search results, one inner list per query vector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchColumns {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
    pub distances: Vec<Vec<f32>>,
}

impl From<Vec<SearchHit>> for SearchColumns {
    fn from(hits: Vec<SearchHit>) -> Self {
        let mut ids = Vec::with_capacity(hits.len());
        let mut documents = Vec::with_capacity(hits.len());
        let mut metadatas = Vec::with_capacity(hits.len());
        let mut distances = Vec::with_capacity(hits.len());
        for hit in hits {
            ids.push(hit.id);
            documents.push(hit.text);
            metadatas.push(hit.metadata);
            distances.push(hit.distance);
        }
        Self {
            ids: vec![ids],
            documents: vec![documents],
            metadatas: vec![metadatas],
            distances: vec![distances],
        }
    }
}

/// `/search` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: SearchColumns,
}

/// `/status` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub total_vectors_stored: usize,
    pub database_path: String,
    pub embedding_model: String,
    pub available_models: Vec<String>,
    /// Bumped on every embedding model swap
    pub index_version: u64,
}

/// `/uploaded-files` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFilesResponse {
    pub files: Vec<UploadLogEntry>,
}

/// `/delete-document` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub filename: String,
}

/// Model listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// Model selection acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelectedResponse {
    pub status: String,
    pub model: String,
}

/// `/debug-chroma` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugResponse {
    pub chroma_db_path: String,
    pub collection_count: usize,
    pub sample_documents: Vec<String>,
    pub sample_metadatas: Vec<Metadata>,
    pub available_collections: Vec<String>,
}

/// Chat session deletion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDeletedResponse {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_defaults() {
        let meta = json!({"filename": "a.pdf"});
        let source = Source::from_metadata(meta.as_object().unwrap());
        assert_eq!(source.title, "Untitled");
        assert_eq!(source.author, "Unknown");
        assert_eq!(source.dedup_key(), "a.pdf-Untitled");
    }

    #[test]
    fn test_empty_batch_shape() {
        let value = serde_json::to_value(BatchResponse::empty()).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_count"], 1);
        assert_eq!(value["total_files"], 0);
        assert_eq!(value["errors"][0]["filename"], "folder");
        assert_eq!(value["errors"][0]["error"], "No files received");
    }

    #[test]
    fn test_upload_response_is_flat() {
        let response = UploadResponse::from(IngestResult {
            filename: "a.txt".to_string(),
            chunks_stored: 2,
            embedding_dimension: 384,
            metadata: DocumentMetadata::titled("a.txt", 0),
        });
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["chunks_stored"], 2);
        assert_eq!(value["metadata"]["title"], "a.txt");
    }
}
