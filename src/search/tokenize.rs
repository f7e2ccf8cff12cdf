//! Text normalization and tokenization shared by indexing and querying.
//!
//! Record text and query text must go through the same [`Tokenizer`] built
//! from the same [`TokenizerConfig`]; the config is part of the index cache
//! fingerprint so a mismatch forces a rebuild instead of silently missing.

use ahash::AHashSet;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Default minimum token length, in characters.
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 2;

/// Common English stop words to filter out from indexing.
/// These high-frequency words add little value to search relevance.
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

/// Tokenizer settings, read from the `[search]` table of the site config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens shorter than this many characters are dropped.
    pub min_token_length: usize,
    /// Strip accents (`café` → `cafe`) in addition to compatibility folding.
    pub fold_diacritics: bool,
    /// Reduce words to their English stem (`functions` → `function`).
    pub stem: bool,
    /// Replaces the built-in stoplist when set.
    pub stop_words: Option<Vec<String>>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
            fold_diacritics: true,
            stem: true,
            stop_words: None,
        }
    }
}

/// A normalized term and its ordinal among the tokens emitted for one text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub text: String,
    pub position: u32,
}

/// Splits text into normalized tokens.
pub struct Tokenizer {
    config: TokenizerConfig,
    stop_words: AHashSet<String>,
    stemmer: Option<Stemmer>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let stop_words = match &config.stop_words {
            Some(words) => words.iter().map(|w| w.to_lowercase()).collect(),
            None => STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
        };
        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));

        Self {
            config,
            stop_words,
            stemmer,
        }
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenizes text into searchable terms.
    ///
    /// Words are maximal runs of alphanumeric characters after Unicode
    /// normalization, so punctuation, underscores and hyphens all split:
    /// - "cos(x)" → ["cos"] ("x" is below the minimum length)
    /// - "Newton's method" → ["newton", "method"]
    /// - "a₀ = b₁" → ["a0", "b1"]
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let normalized = self.normalize_chars(text);
        let mut tokens = Vec::new();

        for word in words(&normalized) {
            let lowercase = word.to_lowercase();
            if lowercase.chars().count() < self.config.min_token_length {
                continue;
            }
            if self.stop_words.contains(&lowercase) {
                continue;
            }

            let text = match &self.stemmer {
                Some(stemmer) => stemmer.stem(&lowercase).into_owned(),
                None => lowercase,
            };
            tokens.push(Token {
                text,
                position: tokens.len() as u32,
            });
        }

        tokens
    }

    /// Token texts only, in order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|t| t.text).collect()
    }

    /// Normalizes a whole phrase for substring comparison: folded, lowercased,
    /// words joined by single spaces. No stoplist, stemming or length filter.
    pub fn normalize_phrase(&self, text: &str) -> String {
        let normalized = self.normalize_chars(text);
        let mut phrase = String::with_capacity(normalized.len());
        for word in words(&normalized) {
            if !phrase.is_empty() {
                phrase.push(' ');
            }
            phrase.push_str(&word.to_lowercase());
        }
        phrase
    }

    fn normalize_chars(&self, text: &str) -> String {
        if self.config.fold_diacritics {
            text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
        } else {
            text.nfkc().collect()
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}
