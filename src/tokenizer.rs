/// Approximate tokens per English word.
const TOKENS_PER_WORD: f64 = 1.3;

/// Estimates the token count of `text` from its word count.
///
/// There is no real tokenizer involved: English averages roughly 1.3 tokens
/// per word, so the estimate is `max(round(words * 1.3), words)`. The result
/// is deterministic and cheap enough to run over a whole response body.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    let estimate = (words as f64 * TOKENS_PER_WORD).round() as u64;
    estimate.max(words)
}
