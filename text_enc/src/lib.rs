//! Text side of the title scorer: normalization into stems, the ranked
//! vocabulary, and index sequences fed to the recurrent model.

pub mod normalize;
pub mod sequence;
pub mod stopwords;
pub mod vocab;

pub use normalize::{
    EnglishStemmer, FixedStopwords, IdentityStemmer, Normalizer, StopwordSet, Stemmer,
    UnicodeWords, WordSplitter,
};
pub use sequence::{EncodedTitle, SequenceEncoder};
pub use stopwords::EnglishStopwords;
pub use vocab::{VocabEntry, Vocabulary, VocabularyError};
