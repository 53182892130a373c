//! Document ingestion: extraction, chunking, embedding and storage

mod chunker;
mod parser;
mod pipeline;
mod upload_log;

pub use chunker::TextChunker;
pub use parser::{FileParser, ParsedDocument};
pub use pipeline::{hash_bytes, IngestionPipeline};
pub use upload_log::UploadLog;
