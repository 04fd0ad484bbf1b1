//! Token estimation for context budgets.
//!
//! Uses tiktoken-rs for OpenAI-compatible token counts, with a
//! character heuristic when a tokenizer is unavailable. Condensing and
//! chunking only need *an* estimate that is applied identically to the
//! original and the reduced text, so anything implementing
//! [`TokenEstimator`] can be plugged in.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    #[default]
    Cl100kBase,
    /// o200k_base: GPT-4o
    O200kBase,
    /// ~4 characters per token, no tokenizer involved.
    Heuristic,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
            Encoding::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            "heuristic" | "chars" => Ok(Encoding::Heuristic),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

// Cached tokenizers - initialized once per encoding
static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    match encoding {
        Encoding::Cl100kBase => CL100K
            .get_or_init(|| tiktoken_rs::cl100k_base().ok())
            .as_ref(),
        Encoding::O200kBase => O200K
            .get_or_init(|| tiktoken_rs::o200k_base().ok())
            .as_ref(),
        Encoding::Heuristic => None,
    }
}

fn tiktoken_count(text: &str, encoding: Encoding) -> Option<usize> {
    let bpe = get_tokenizer(encoding)?;
    Some(bpe.encode_ordinary(text).len())
}

/// Character heuristic: ~4 characters per token.
pub fn heuristic_count(text: &str) -> usize {
    // Code averages ~3.5 chars/token, prose ~4.2
    (text.len() + 3) / 4
}

/// Count tokens in text using the default encoding (cl100k_base).
///
/// Never fails: falls back to [`heuristic_count`] if tiktoken is
/// unavailable.
///
/// # Examples
///
/// ```
/// use tokenfit::tokens::count_tokens;
///
/// let count = count_tokens("Hello, world!");
/// assert!(count > 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

/// Count tokens in text using the specified encoding.
pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    tiktoken_count(text, encoding).unwrap_or_else(|| heuristic_count(text))
}

/// Anything that maps text to a non-negative token estimate.
///
/// Implemented for [`TokenCounter`] and for plain functions/closures,
/// so tests and hosts can supply their own estimator:
///
/// ```
/// use tokenfit::tokens::TokenEstimator;
///
/// let by_words = |s: &str| s.split_whitespace().count();
/// assert_eq!(by_words.estimate("one two three"), 3);
/// ```
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// Reusable token counter bound to one encoding.
///
/// # Examples
///
/// ```
/// use tokenfit::tokens::{TokenCounter, Encoding};
///
/// let counter = TokenCounter::new(Encoding::Cl100kBase);
/// let count = counter.count("First text");
/// assert!(count > 0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokenCounter {
    encoding: Encoding,
}

impl TokenCounter {
    /// Create a new token counter with the specified encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    /// Count tokens in the given text.
    pub fn count(&self, text: &str) -> usize {
        count_tokens_with_encoding(text, self.encoding)
    }

    /// Count tokens for multiple texts.
    pub fn count_many<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
        texts.into_iter().map(|t| self.count(t)).collect()
    }

    /// Get the encoding this counter uses.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(Encoding::default())
    }
}

impl TokenEstimator for TokenCounter {
    fn estimate(&self, text: &str) -> usize {
        self.count(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_simple_text() {
        let count = count_tokens("Hello, world!");
        assert!(count > 0 && count < 10);
    }

    #[test]
    fn test_heuristic_approximation() {
        assert_eq!(heuristic_count(""), 0);
        assert_eq!(heuristic_count("a"), 1);
        assert_eq!(heuristic_count("abcd"), 1);
        assert_eq!(heuristic_count("abcde"), 2);
        assert_eq!(heuristic_count("abcdefgh"), 2);
    }

    #[test]
    fn test_heuristic_encoding_skips_tokenizer() {
        let text = "def f(x): return x + 1";
        assert_eq!(
            count_tokens_with_encoding(text, Encoding::Heuristic),
            heuristic_count(text)
        );
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("cl100k".parse::<Encoding>().unwrap(), Encoding::Cl100kBase);
        assert_eq!("o200k_base".parse::<Encoding>().unwrap(), Encoding::O200kBase);
        assert_eq!("heuristic".parse::<Encoding>().unwrap(), Encoding::Heuristic);
        assert!("invalid".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_count_many() {
        let counter = TokenCounter::default();
        let counts = counter.count_many(["one", "two", "three"]);
        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_estimator_impls_agree() {
        let counter = TokenCounter::new(Encoding::Heuristic);
        let closure = |s: &str| heuristic_count(s);
        assert_eq!(counter.estimate("some text"), closure.estimate("some text"));
    }
}
