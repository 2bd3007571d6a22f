//! Frequency-ranked vocabulary over corpus stems.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::sequence::EncodedTitle;

/// Errors raised while building a [`Vocabulary`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabularyError {
    /// The requested vocabulary size was zero.
    #[error("vocabulary size must be at least 1")]
    InvalidCapacity,
    /// The corpus produced no stems to count.
    #[error("corpus produced no stems")]
    Empty,
}

/// A ranked vocabulary slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VocabEntry {
    /// Normalized word stem.
    pub stem: String,
    /// Number of occurrences across the corpus that built the vocabulary.
    pub count: usize,
}

/// Injective mapping from stem to a dense index in `[0, len)`.
///
/// Built once from the whole training corpus and treated as immutable
/// afterwards. Stems outside the kept range are unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Counts stems over all titles and keeps the `capacity` most frequent.
    ///
    /// Ties in frequency are ordered by first appearance in the corpus, so
    /// identical input always produces the identical mapping.
    pub fn build<I, T>(titles: I, capacity: usize) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[String]>,
    {
        if capacity == 0 {
            return Err(VocabularyError::InvalidCapacity);
        }

        // stem -> (count, first seen position)
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut seen = 0usize;
        for title in titles {
            for stem in title.as_ref() {
                match counts.entry(stem.clone()) {
                    Entry::Occupied(mut slot) => slot.get_mut().0 += 1,
                    Entry::Vacant(slot) => {
                        slot.insert((1, seen));
                        seen += 1;
                    }
                }
            }
        }
        if counts.is_empty() {
            return Err(VocabularyError::Empty);
        }

        let distinct = counts.len();
        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(stem, (count, first))| (stem, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.truncate(capacity);

        let entries: Vec<VocabEntry> = ranked
            .into_iter()
            .map(|(stem, count, _)| VocabEntry { stem, count })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.stem.clone(), position as u32))
            .collect();

        info!(
            distinct_stems = distinct,
            kept = entries.len(),
            capacity,
            "vocabulary built"
        );
        Ok(Self { entries, index })
    }

    /// Number of indexed stems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index assigned to `stem`, if it made the cut.
    pub fn get(&self, stem: &str) -> Option<u32> {
        self.index.get(stem).copied()
    }

    /// Stem stored at `index`.
    pub fn stem(&self, index: u32) -> Option<&str> {
        self.entries
            .get(index as usize)
            .map(|entry| entry.stem.as_str())
    }

    /// Entries in index order.
    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    /// Replaces each stem with its index, dropping unknown stems.
    pub fn encode(&self, stems: &[String]) -> EncodedTitle {
        stems
            .iter()
            .filter_map(|stem| self.get(stem))
            .collect()
    }

    /// Pretty JSON dump of the ranked entries.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
