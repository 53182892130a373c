//! Text and metadata extraction for PDF, DOCX, CSV and TXT uploads

use bytes::Bytes;
use lopdf::Object;
use std::panic::UnwindSafe;

use crate::error::{Error, Result};
use crate::types::{DocumentMetadata, FileType};

/// Extracted text of one upload
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Detected file type
    pub file_type: FileType,
    /// Full text content
    pub text: String,
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Resolve the file type or fail with `UnsupportedFileType`
    pub fn detect(filename: &str) -> Result<FileType> {
        FileType::from_filename(filename)
            .ok_or_else(|| Error::UnsupportedFileType(filename.to_string()))
    }

    /// Best-effort file-level metadata; never fails
    pub fn extract_metadata(filename: &str, file_type: FileType, data: &[u8]) -> DocumentMetadata {
        match file_type {
            FileType::Pdf => Self::pdf_metadata(data),
            FileType::Docx => Self::docx_metadata(data),
            FileType::Csv | FileType::Txt => DocumentMetadata::titled(filename, 0),
        }
    }

    /// Extract the text of a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = Self::detect(filename)?;

        let text = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => Self::parse_docx(filename, data)?,
            FileType::Csv => Self::parse_csv(filename, data)?,
            FileType::Txt => Self::decode_utf8(filename, data)?,
        };

        if text.trim().is_empty() {
            return Err(Error::NoReadableText(filename.to_string()));
        }

        Ok(ParsedDocument { file_type, text })
    }

    /// Run [`FileParser::parse`] on the blocking pool
    pub async fn parse_blocking(filename: String, data: Bytes) -> Result<ParsedDocument> {
        let name = filename.clone();
        tokio::task::spawn_blocking(move || Self::parse(&filename, &data))
            .await
            .map_err(|e| Error::unreadable(name, format!("extractor aborted: {}", e)))?
    }

    fn parse_pdf(filename: &str, data: &[u8]) -> Result<String> {
        let raw = contain_panic(filename, || {
            pdf_extract::extract_text_from_mem(data).map_err(|e| Error::unreadable(filename, e.to_string()))
        })?;

        // pdf-extract separates pages with form feeds
        let pages: Vec<&str> = raw.split('\u{c}').map(str::trim).collect();
        Ok(pages.join("\n\n").replace('\0', ""))
    }

    fn parse_docx(filename: &str, data: &[u8]) -> Result<String> {
        let paragraphs = Self::docx_paragraphs(data)
            .map_err(|e| Error::unreadable(filename, e))?;

        Ok(paragraphs
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Data rows only, fields joined with " | "; falls back to the raw text
    fn parse_csv(filename: &str, data: &[u8]) -> Result<String> {
        let mut reader = csv::Reader::from_reader(data);
        let mut rows = Vec::new();

        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record.iter().collect::<Vec<_>>().join(" | ")),
                Err(e) => {
                    tracing::warn!("CSV parsing failed for {}: {}, using raw text", filename, e);
                    return Self::decode_utf8(filename, data);
                }
            }
        }

        Ok(rows.join("\n"))
    }

    fn decode_utf8(filename: &str, data: &[u8]) -> Result<String> {
        String::from_utf8(data.to_vec())
            .map_err(|e| Error::unreadable(filename, format!("invalid UTF-8: {}", e)))
    }

    fn docx_paragraphs(data: &[u8]) -> std::result::Result<Vec<String>, String> {
        let doc = docx_rs::read_docx(data).map_err(|e| e.to_string())?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut text = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(text);
            }
        }
        Ok(paragraphs)
    }

    fn docx_metadata(data: &[u8]) -> DocumentMetadata {
        match Self::docx_paragraphs(data) {
            // Rough estimate, DOCX has no page count without layout
            Ok(paragraphs) => DocumentMetadata::titled("Document", (paragraphs.len() / 50) as u32),
            Err(e) => {
                tracing::error!("DOCX metadata extraction failed: {}", e);
                DocumentMetadata::unknown()
            }
        }
    }

    fn pdf_metadata(data: &[u8]) -> DocumentMetadata {
        let doc = match lopdf::Document::load_mem(data) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("PDF metadata extraction failed: {}", e);
                return DocumentMetadata::unknown();
            }
        };

        let info = match doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
            Ok(obj) => Some(obj),
            Err(_) => None,
        }
        .and_then(|obj| obj.as_dict().ok());

        let field = |key: &[u8]| -> Option<String> {
            match info?.get(key).ok()? {
                Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
                _ => None,
            }
        };

        DocumentMetadata {
            title: field(b"Title").unwrap_or_else(|| "Untitled".to_string()),
            author: field(b"Author").unwrap_or_else(|| "Unknown".to_string()),
            pages: doc.get_pages().len() as u32,
            creation_date: field(b"CreationDate"),
            modification_date: field(b"ModDate"),
        }
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char)
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Run an extractor, turning a panic on malformed input into `UnreadableContent`
fn contain_panic<T>(filename: &str, extract: impl FnOnce() -> Result<T> + UnwindSafe) -> Result<T> {
    std::panic::catch_unwind(extract).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("Extractor panicked on {}: {}", filename, reason);
        Err(Error::unreadable(filename, format!("extractor panicked: {}", reason)))
    })
}
