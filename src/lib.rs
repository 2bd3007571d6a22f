//! Title score regression: corpus preparation glue over the workspace crates.

pub mod pipeline;

pub use pipeline::{
    PipelineError, PreparedCorpus, build_scorer, prepare_corpus, train_epoch,
};
