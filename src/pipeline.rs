//! Records → stems → vocabulary → encoded samples → one training epoch.

use candle_core::Device;
use datasets::{CorpusError, CorpusRecord};
use model_rnn::{RecurrentScorer, ScorerConfig, ScorerError};
use text_enc::normalize::{Normalizer, Stemmer, StopwordSet, WordSplitter};
use text_enc::{SequenceEncoder, Vocabulary, VocabularyError};
use thiserror::Error;
use tracing::{info, warn};
use trainer::{
    EpochReport, EpochTrainer, TrainError, TrainerConfig, TrainingObserver, TrainingSample,
};

/// Fatal pipeline failures, tagged with the stage that raised them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input: {0}")]
    Input(#[from] CorpusError),
    #[error("normalization: no titles to normalize")]
    NoTitles,
    #[error("vocabulary build: {0}")]
    Vocabulary(#[from] VocabularyError),
    #[error("scoring: {0}")]
    Scoring(#[from] ScorerError),
    /// A sample could not be run through the scorer during training.
    #[error("scoring: {0}")]
    SampleScoring(TrainError),
    #[error("optimization: {0}")]
    Training(TrainError),
}

impl From<TrainError> for PipelineError {
    fn from(error: TrainError) -> Self {
        match error {
            TrainError::Scoring { .. } => Self::SampleScoring(error),
            other => Self::Training(other),
        }
    }
}

/// Vocabulary and encoded samples for one corpus.
#[derive(Clone, Debug)]
pub struct PreparedCorpus {
    pub vocabulary: Vocabulary,
    pub samples: Vec<TrainingSample>,
}

impl PreparedCorpus {
    /// Samples whose encoded title has at least one token.
    pub fn encoded_samples(&self) -> usize {
        self.samples
            .iter()
            .filter(|sample| !sample.tokens.is_empty())
            .count()
    }
}

/// Normalizes every title, builds the vocabulary over the whole corpus and
/// encodes each title against it. Samples keep their source row.
pub fn prepare_corpus<W, S, T>(
    records: &[CorpusRecord],
    normalizer: &Normalizer<W, S, T>,
    vocabulary_size: usize,
) -> Result<PreparedCorpus, PipelineError>
where
    W: WordSplitter,
    S: StopwordSet,
    T: Stemmer,
{
    if records.is_empty() {
        return Err(PipelineError::NoTitles);
    }
    let stems = normalizer.normalize_all(records.iter().map(|record| record.title.as_str()));
    let vocabulary = Vocabulary::build(&stems, vocabulary_size)?;

    let encoder = SequenceEncoder::new(&vocabulary);
    let samples: Vec<TrainingSample> = records
        .iter()
        .zip(encoder.encode_all(&stems))
        .map(|(record, tokens)| {
            TrainingSample::new(record.row, record.title.clone(), record.score as f32, tokens)
        })
        .collect();

    let prepared = PreparedCorpus {
        vocabulary,
        samples,
    };
    let encoded = prepared.encoded_samples();
    if encoded < prepared.samples.len() {
        warn!(
            empty = prepared.samples.len() - encoded,
            "titles with no in-vocabulary stems will be skipped"
        );
    }
    info!(
        samples = prepared.samples.len(),
        vocabulary = prepared.vocabulary.len(),
        "corpus prepared"
    );
    Ok(prepared)
}

/// Scorer whose one-hot width is the configured vocabulary size.
pub fn build_scorer(
    vocabulary_size: usize,
    mut config: ScorerConfig,
    device: &Device,
) -> Result<RecurrentScorer, PipelineError> {
    config.vector_size = vocabulary_size;
    Ok(RecurrentScorer::new(config, device)?)
}

/// Trains `scorer` for one epoch over the prepared samples.
pub fn train_epoch(
    scorer: RecurrentScorer,
    config: TrainerConfig,
    prepared: &PreparedCorpus,
    observer: Option<&mut dyn TrainingObserver>,
) -> Result<(RecurrentScorer, EpochReport), PipelineError> {
    let mut trainer = EpochTrainer::new(config, scorer)?;
    let report = trainer.run_epoch(&prepared.samples, observer)?;
    Ok((trainer.into_scorer(), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use text_enc::normalize::{FixedStopwords, IdentityStemmer, UnicodeWords};

    fn record(row: usize, title: &str, score: f64) -> CorpusRecord {
        CorpusRecord {
            row,
            id: None,
            title: title.to_string(),
            score,
        }
    }

    fn normalizer() -> Normalizer<UnicodeWords, FixedStopwords, IdentityStemmer> {
        Normalizer::new(UnicodeWords, FixedStopwords::new(["the"]), IdentityStemmer)
    }

    #[test]
    fn samples_keep_rows_and_vocabulary_indices() {
        let records = [
            record(0, "The cat sat", 3.0),
            record(4, "cat cat dog", 1.0),
        ];
        let prepared = prepare_corpus(&records, &normalizer(), 10).unwrap();

        assert_eq!(prepared.vocabulary.len(), 3);
        assert_eq!(prepared.vocabulary.get("cat"), Some(0));
        let rows: Vec<usize> = prepared.samples.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![0, 4]);
        assert_eq!(prepared.samples[1].tokens.as_slice(), &[0, 0, 2]);
        assert_eq!(prepared.samples[0].score, 3.0);
    }

    #[test]
    fn stopword_only_corpus_fails_vocabulary_build() {
        let records = [record(0, "the the", 1.0)];
        let error = prepare_corpus(&records, &normalizer(), 10).unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Vocabulary(VocabularyError::Empty)
        ));
        assert!(error.to_string().starts_with("vocabulary build:"));
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(
            prepare_corpus(&[], &normalizer(), 10),
            Err(PipelineError::NoTitles)
        ));
    }

    #[test]
    fn scorer_too_narrow_for_vocabulary_fails_at_scoring() {
        let records = [record(0, "cat sat dog", 2.0)];
        let prepared = prepare_corpus(&records, &normalizer(), 10).unwrap();
        let scorer = build_scorer(
            2,
            ScorerConfig {
                input_l2_size: 2,
                hidden_size: 2,
                ..ScorerConfig::default()
            },
            &Device::Cpu,
        )
        .unwrap();

        let error = train_epoch(scorer, TrainerConfig::default(), &prepared, None).unwrap_err();
        assert!(matches!(
            error,
            PipelineError::SampleScoring(TrainError::Scoring {
                row: 0,
                source: ScorerError::TokenOutOfRange { token: 2, .. }
            })
        ));
        assert!(error.to_string().starts_with("scoring:"));
    }

    #[test]
    fn trainer_config_errors_stay_in_optimization_stage() {
        let error = PipelineError::from(TrainError::InvalidConfig(
            "batch_size must be at least 1",
        ));
        assert!(matches!(error, PipelineError::Training(_)));
        assert!(error.to_string().starts_with("optimization:"));
    }

    #[test]
    fn scorer_width_follows_vocabulary_size() {
        let scorer = build_scorer(
            7,
            ScorerConfig {
                input_l2_size: 2,
                hidden_size: 2,
                ..ScorerConfig::default()
            },
            &Device::Cpu,
        )
        .unwrap();
        assert_eq!(scorer.config().vector_size, 7);
    }
}
