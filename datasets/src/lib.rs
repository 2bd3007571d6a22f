//! Corpus side of the title scorer: the tabular title/score dump and the
//! utility that produces it from the item API.

pub mod corpus;
pub mod fetch;

pub use corpus::{
    CORPUS_COLUMNS, Corpus, CorpusError, CorpusRecord, LoadReport, MmapCorpus, read_corpus,
};
pub use fetch::{
    DEFAULT_BASE_URL, FetchError, FetchReport, Item, ItemClient, id_range, write_items,
    write_items_to_path,
};
