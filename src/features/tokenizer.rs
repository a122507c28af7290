//! Event text tokenizer
//!
//! Lowercases, keeps alphabetic ASCII runs bounded by word boundaries and drops
//! English stop words. Cyrillic text yields no tokens.

use super::stopwords::is_stop_word;
use regex::Regex;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-zA-Z]+\b").unwrap());

/// Word tokenizer for event documents
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Minimum token length
    min_length: usize,
    /// Drop English stop words
    remove_stop_words: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            min_length: 2,
            remove_stop_words: true,
        }
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_length = len.max(1);
        self
    }

    pub fn with_stop_words(mut self, remove: bool) -> Self {
        self.remove_stop_words = remove;
        self
    }

    /// Split a document into lowercase tokens
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        WORD_REGEX
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|w| w.len() >= self.min_length)
            .filter(|w| !(self.remove_stop_words && is_stop_word(w)))
            .map(str::to_string)
            .collect()
    }

    /// Tokens followed by every contiguous n-gram up to `ngram_max`
    pub fn ngrams(&self, text: &str, ngram_max: usize) -> Vec<String> {
        let tokens = self.tokenize(text);
        let mut terms = tokens.clone();
        for n in 2..=ngram_max.max(1) {
            if tokens.len() < n {
                break;
            }
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_filters() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("The Jazz Night at MKC 2024 a Концерт");
        assert_eq!(tokens, vec!["jazz", "night", "mkc"]);
    }

    #[test]
    fn test_ngrams_skip_stop_words() {
        let tokenizer = Tokenizer::new();
        let terms = tokenizer.ngrams("rock of ages tour", 2);
        assert_eq!(terms, vec!["rock", "ages", "tour", "rock ages", "ages tour"]);
    }

    #[test]
    fn test_word_boundary_with_digits() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.tokenize("abc123 x1y").is_empty());
    }
}
