//! Source markers in chat answers
//!
//! Chat answers cite as `[Source: filename, Page: n]` (page optional).
//! Only filenames that were actually in the assembled context count.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"\[Source:\s*([^\],]+?)\s*(?:,\s*Page:\s*[^\]]*)?\]").expect("static pattern")
    })
}

/// Filenames cited in `answer` that appear in `known`, in citation order
pub fn cited_sources(answer: &str, known: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();

    marker()
        .captures_iter(answer)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|name| known.contains(name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
