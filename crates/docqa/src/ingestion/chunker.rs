//! Recursive character text splitting with overlap

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Separators tried in order, the empty one cuts between characters
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Text chunker with configurable size and overlap
///
/// Text is split on the highest-priority separator present, pieces longer than
/// the chunk size are split again with the remaining separators, and adjacent
/// pieces are merged greedily back up to the size limit. Each separator stays
/// attached to the start of the piece that follows it. All lengths are counted
/// in characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk a document's text, failing when nothing survives trimming
    pub fn chunk(&self, filename: &str, text: &str) -> Result<Vec<String>> {
        let chunks = self.split_text(text);
        if chunks.is_empty() {
            return Err(Error::EmptyChunkSet(filename.to_string()));
        }
        Ok(chunks)
    }

    /// Split text into ordered, trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily merge small pieces, carrying up to `overlap` characters forward
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, window.iter().map(|(s, _)| *s));
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        push_joined(&mut chunks, window.iter().map(|(s, _)| *s));
        chunks
    }
}

fn push_joined<'a>(chunks: &mut Vec<String>, pieces: impl Iterator<Item = &'a str>) {
    let joined: String = pieces.collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching each separator to the following piece
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
