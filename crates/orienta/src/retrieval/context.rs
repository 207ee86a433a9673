//! Context assembly
//!
//! Concatenates retrieved chunks into the bounded string handed to the
//! generation backend. The cap is a hard character limit, not a semantic
//! boundary: a chunk may be cut mid-sentence to bound backend cost.

use crate::retrieval::types::Chunk;

/// Join chunk contents in retrieval order, blank-line separated, truncated
/// to at most `max_chars` characters. An empty chunk list yields the
/// sentinel so the backend can react to retrieval failure explicitly.
pub fn assemble(chunks: &[Chunk], max_chars: usize, empty_sentinel: &str) -> String {
    if chunks.is_empty() {
        return empty_sentinel.to_string();
    }

    let joined = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, max_chars)
}

/// Truncate to a character count, respecting char boundaries.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
