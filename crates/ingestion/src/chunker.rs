//! Text chunking module
//!
//! Splits each page of a document into overlapping chunks for embedding,
//! keeping the page number on every fragment.

use crate::errors::IngestionError;
use crate::pdf::extract_pages;
use papermind_common::config::IngestionConfig;
use papermind_common::models::Chunk;
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters, at most half the chunk size
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
        }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    fn bounds(&self) -> (usize, usize) {
        let size = self.chunk_size.max(1);
        (size, self.chunk_overlap.min(size / 2))
    }
}

/// Turn a PDF into ordered, page-attributed chunks.
///
/// Pages with no text after cleanup are skipped; a document where every
/// page is empty is an error.
pub fn chunk_document(
    bytes: &[u8],
    filename: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestionError> {
    let pages = extract_pages(bytes, filename)?;

    let mut chunks = Vec::new();
    for page in pages.iter().filter(|p| !p.text.is_empty()) {
        chunks.extend(split_text(&page.text, config).into_iter().map(|text| Chunk {
            text,
            page: page.number,
            source: filename.to_string(),
        }));
    }

    if chunks.is_empty() {
        return Err(IngestionError::EmptyDocument {
            filename: filename.to_string(),
        });
    }

    debug!(
        filename,
        page_count = pages.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Document chunked"
    );

    Ok(chunks)
}

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Each window ends at the latest line break it contains, else the latest
/// sentence end, else the latest space, else at the size limit. The next
/// window starts at least `chunk_overlap` characters before the previous
/// end, pulled back to the start of a word when one is near.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let (size, overlap) = config.bounds();

    if len == 0 {
        return Vec::new();
    }
    if len <= size {
        return vec![text.to_string()];
    }

    let max_snap = (size - overlap) / 4;
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut prev_end = 0;

    loop {
        let window_end = (start + size).min(len);
        let mut end = if window_end == len {
            len
        } else {
            let floor = (start + overlap).max(prev_end);
            find_break(&chars, floor, window_end)
        };
        while end > start + 1 && chars[end - 1].is_whitespace() {
            end -= 1;
        }

        chunks.push(chars[start..end].iter().collect());
        if window_end == len {
            break;
        }
        prev_end = end;

        let mut next = end.saturating_sub(overlap).max(start + 1);
        let mut snapped = 0;
        while snapped < max_snap && next - 1 > start && !chars[next - 1].is_whitespace() {
            next -= 1;
            snapped += 1;
        }
        if !chars[next - 1].is_whitespace() && next - 1 > start && snapped == max_snap {
            // no word start within reach, keep the exact overlap
            next = end.saturating_sub(overlap).max(start + 1);
        }
        start = next;
    }

    chunks
}

/// Best split position in `(floor, window_end]`
fn find_break(chars: &[char], floor: usize, window_end: usize) -> usize {
    let last = window_end.min(chars.len() - 1);

    if let Some(p) = (floor + 1..=last).rev().find(|&p| chars[p] == '\n') {
        return p;
    }

    if let Some(p) = (floor..window_end)
        .rev()
        .find(|&p| matches!(chars[p], '.' | '?' | '!') && chars.get(p + 1).is_some_and(|c| c.is_whitespace()))
    {
        return p + 1;
    }

    if let Some(p) = (floor + 1..=last).rev().find(|&p| chars[p] == ' ') {
        return p;
    }

    window_end
}
