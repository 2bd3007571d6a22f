//! Title normalization into word stems.
//!
//! The linguistic resources sit behind three narrow traits so the pipeline
//! does not depend on which tokenizer, stopword list or stemmer backs them.
//! [`Normalizer`] applies them in a fixed order:
//!
//! 1. split into lowercase word tokens,
//! 2. drop stopwords,
//! 3. keep ASCII letters only, dropping tokens left empty,
//! 4. stem.
//!
//! Reordering these steps changes the vocabulary.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer as SnowballStemmer};
use unicode_segmentation::UnicodeSegmentation;

use crate::stopwords::EnglishStopwords;

/// Splits raw text into word tokens.
pub trait WordSplitter {
    fn split(&self, text: &str) -> Vec<String>;
}

/// Membership test for high-frequency, low-information words.
pub trait StopwordSet {
    fn is_stopword(&self, token: &str) -> bool;
}

/// Reduces a word to its canonical root form.
pub trait Stemmer {
    fn stem(&self, token: &str) -> String;
}

/// Word-boundary splitter following Unicode text segmentation (UAX #29).
///
/// Punctuation attached to words is separated out; apostrophes inside a word
/// (`don't`) are kept. Tokens are lowercased.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeWords;

impl WordSplitter for UnicodeWords {
    fn split(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(str::to_lowercase).collect()
    }
}

/// Snowball English (Porter2) stemmer.
pub struct EnglishStemmer {
    inner: SnowballStemmer,
}

impl EnglishStemmer {
    pub fn new() -> Self {
        Self {
            inner: SnowballStemmer::create(Algorithm::English),
        }
    }
}

impl Default for EnglishStemmer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stemmer for EnglishStemmer {
    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }
}

/// Fixed, caller-supplied stopword set.
#[derive(Clone, Debug, Default)]
pub struct FixedStopwords {
    words: HashSet<String>,
}

impl FixedStopwords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

impl StopwordSet for FixedStopwords {
    fn is_stopword(&self, token: &str) -> bool {
        self.words.contains(token)
    }
}

/// Stemmer that returns its input unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Turns titles into ordered stem sequences.
pub struct Normalizer<W = UnicodeWords, S = EnglishStopwords, T = EnglishStemmer> {
    splitter: W,
    stopwords: S,
    stemmer: T,
}

impl Normalizer {
    /// Normalizer backed by the default English resources.
    pub fn english() -> Self {
        Self::new(UnicodeWords, EnglishStopwords::new(), EnglishStemmer::new())
    }
}

impl<W, S, T> Normalizer<W, S, T>
where
    W: WordSplitter,
    S: StopwordSet,
    T: Stemmer,
{
    pub fn new(splitter: W, stopwords: S, stemmer: T) -> Self {
        Self {
            splitter,
            stopwords,
            stemmer,
        }
    }

    /// Normalizes a single title into stems, preserving token order.
    pub fn normalize(&self, title: &str) -> Vec<String> {
        self.splitter
            .split(title)
            .into_iter()
            .filter(|token| !self.stopwords.is_stopword(token))
            .map(|token| ascii_letters(&token))
            .filter(|token| !token.is_empty())
            .map(|token| self.stemmer.stem(&token))
            .collect()
    }

    /// Normalizes every title of a corpus, one stem sequence per title.
    pub fn normalize_all<'a, I>(&self, titles: I) -> Vec<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        titles.into_iter().map(|title| self.normalize(title)).collect()
    }
}

fn ascii_letters(token: &str) -> String {
    token.chars().filter(char::is_ascii_alphabetic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_normalizer() -> Normalizer<UnicodeWords, FixedStopwords, IdentityStemmer> {
        Normalizer::new(
            UnicodeWords,
            FixedStopwords::new(["the", "today"]),
            IdentityStemmer,
        )
    }

    #[test]
    fn splitter_lowercases_and_detaches_punctuation() {
        let tokens = UnicodeWords.split("Show HN: Rust, finally!");
        assert_eq!(tokens, vec!["show", "hn", "rust", "finally"]);
    }

    #[test]
    fn stopwords_are_removed_before_character_filtering() {
        let normalizer = Normalizer::new(
            UnicodeWords,
            FixedStopwords::new(["c3po"]),
            IdentityStemmer,
        );
        // "c3po" is a stopword as written, "r2d2" only reduces to letters.
        assert_eq!(normalizer.normalize("C3PO meets R2D2"), vec!["meets", "rd"]);
    }

    #[test]
    fn tokens_without_ascii_letters_are_dropped() {
        let normalizer = stub_normalizer();
        assert_eq!(
            normalizer.normalize("2024 café – über news"),
            vec!["caf", "ber", "news"]
        );
    }

    #[test]
    fn order_is_preserved() {
        let normalizer = stub_normalizer();
        assert_eq!(
            normalizer.normalize("The great news today is great"),
            vec!["great", "news", "is", "great"]
        );
    }

    #[test]
    fn english_resources_stem_and_filter() {
        let normalizer = Normalizer::english();
        assert_eq!(
            normalizer.normalize("The Running of the Foxes"),
            vec!["run", "fox"]
        );
    }

    #[test]
    fn empty_title_yields_no_stems() {
        assert!(Normalizer::english().normalize("").is_empty());
        assert!(Normalizer::english().normalize("?! 42").is_empty());
    }
}
