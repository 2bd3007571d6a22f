//! Index sequences built from stem sequences.

use crate::vocab::Vocabulary;

/// Ordered vocabulary indices for one title. May be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedTitle(Vec<u32>);

impl EncodedTitle {
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for EncodedTitle {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<u32>> for EncodedTitle {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

/// Encodes stem sequences against a fixed vocabulary.
#[derive(Clone, Copy, Debug)]
pub struct SequenceEncoder<'v> {
    vocabulary: &'v Vocabulary,
}

impl<'v> SequenceEncoder<'v> {
    pub fn new(vocabulary: &'v Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &'v Vocabulary {
        self.vocabulary
    }

    /// Encodes one title. The output is never longer than `stems`.
    pub fn encode(&self, stems: &[String]) -> EncodedTitle {
        self.vocabulary.encode(stems)
    }

    /// Encodes every title, keeping corpus order.
    pub fn encode_all<T>(&self, titles: &[T]) -> Vec<EncodedTitle>
    where
        T: AsRef<[String]>,
    {
        titles
            .iter()
            .map(|stems| self.encode(stems.as_ref()))
            .collect()
    }
}
