//! Approximate token accounting.
//!
//! Counts use the fixed `cl100k_base` reference encoding, which is not the
//! backend's true tokenizer. The numbers are good enough for usage metrics
//! and nothing else; they must never be treated as billing-accurate.

/// Approximate token count for a piece of text.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let bpe = tiktoken_rs::cl100k_base_singleton();
    bpe.encode_with_special_tokens(text).len()
}
