//! Fixed-size character chunking.
//!
//! Text is trimmed and cut into contiguous, non-overlapping slices of at most `size`
//! characters. Offsets count Unicode scalar values, not bytes, and no attention is paid to word
//! or sentence boundaries: concatenating the slices in order reproduces the trimmed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chunk length, in characters, used by the ingestion stage.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk length.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Positional metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Identifier of the originating document (its filename).
    pub source_id: String,
    /// Zero-based position of the chunk within its document.
    pub chunk_index: usize,
}

/// Bounded-length text segment, the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Source and position of the chunk.
    pub meta: ChunkMeta,
}

/// Split `text` into slices of at most `size` characters.
///
/// Returns an empty vector when the input is empty or whitespace-only.
pub fn chunk_text(text: &str, size: usize) -> Result<Vec<String>, ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == size {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }
    chunks.push(text[start..].to_string());

    Ok(chunks)
}

/// Chunk one document and tag each slice with its source and position.
pub fn chunk_document(
    text: &str,
    source_id: &str,
    size: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    Ok(chunk_text(text, size)?
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            meta: ChunkMeta {
                source_id: source_id.to_string(),
                chunk_index,
            },
        })
        .collect())
}
