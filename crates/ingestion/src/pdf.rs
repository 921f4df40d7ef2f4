//! PDF text extraction module
//!
//! Extracts per-page text from in-memory PDF bytes using lopdf and
//! normalises the layout artefacts typical of academic papers.

use crate::errors::IngestionError;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Cleaned text of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub number: u32,
    pub text: String,
}

/// Extract the text of every page, in order.
///
/// Fails if the bytes are not a PDF or the document has no pages. Pages
/// whose content cannot be decoded come back empty.
pub fn extract_pages(bytes: &[u8], filename: &str) -> Result<Vec<PageText>, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParse {
        filename: filename.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(IngestionError::PdfParse {
            filename: filename.to_string(),
            message: "document has no pages".to_string(),
        });
    }

    debug!(page_count = pages.len(), "Extracting text from PDF");

    let extracted = pages
        .keys()
        .map(|&number| {
            let raw = doc.extract_text(&[number]).unwrap_or_else(|e| {
                warn!(page = number, error = %e, "Failed to extract text from page, skipping");
                String::new()
            });
            PageText {
                number,
                text: clean_text(&raw),
            }
        })
        .collect();

    Ok(extracted)
}

struct Patterns {
    horizontal: Regex,
    around_newline: Regex,
    newlines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        horizontal: Regex::new(r"[ \t]+").expect("static pattern"),
        around_newline: Regex::new(r" ?\n ?").expect("static pattern"),
        newlines: Regex::new(r"\n{2,}").expect("static pattern"),
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Remove a hyphen and the line break after it when both neighbours are
/// word characters in any script.
fn join_hyphenated(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '-' && out.chars().next_back().is_some_and(is_word_char) {
            if let Some(resume) = continuation_after_break(&chars, i + 1) {
                i = resume;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

/// Index of the word character that continues a word after
/// `[ \t]*\n[ \t]*`, starting at `from`
fn continuation_after_break(chars: &[char], from: usize) -> Option<usize> {
    let horizontal = |c: &&char| **c == ' ' || **c == '\t';

    let mut i = from + chars[from..].iter().take_while(horizontal).count();
    if chars.get(i) != Some(&'\n') {
        return None;
    }
    i += 1;
    i += chars[i..].iter().take_while(horizontal).count();

    chars.get(i).filter(|c| is_word_char(**c)).map(|_| i)
}

/// Normalise extracted page text.
///
/// Joins words hyphenated across a single line break, collapses blank
/// lines and horizontal whitespace runs, and trims the result.
pub fn clean_text(text: &str) -> String {
    let p = patterns();

    let text = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{FEFF}', '\u{0}'], "")
        .replace(['\u{A0}', '\u{0B}', '\u{0C}'], " ");

    let text = join_hyphenated(&text);
    let text = p.horizontal.replace_all(&text, " ");
    let text = p.around_newline.replace_all(&text, "\n");
    let text = p.newlines.replace_all(&text, "\n");

    text.trim().to_string()
}
