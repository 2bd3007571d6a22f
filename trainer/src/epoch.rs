//! Single pass over the corpus with batch-accumulated gradient steps.

use std::fmt;

use model_rnn::{RecurrentScorer, ScorerError};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::batch::BatchAccumulator;
use crate::config::{BatchPolicy, TrainerConfig};
use crate::dataset::TrainingSample;
use crate::loss::smooth_l1;
use crate::metrics::RunningMean;
use crate::optimizer::{Sgd, StepOutcome};

/// Fatal training failures. Per-sample problems are skipped instead.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid trainer configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("scoring failed at row {row}: {source}")]
    Scoring { row: usize, source: ScorerError },
    #[error("loss computation failed at row {row}: {source}")]
    Loss {
        row: usize,
        source: candle_core::Error,
    },
    #[error("optimization step failed at row {row}: {source}")]
    Optimization {
        row: usize,
        source: candle_core::Error,
    },
}

/// Periodic diagnostic about one scored sample.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressRecord {
    pub row: usize,
    pub total: usize,
    pub title: String,
    pub score: f32,
    pub predicted: f32,
    pub loss: f32,
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} out of {}, Sample \"{}\", score = {}, predicted score {}, loss = {}",
            self.row, self.total, self.title, self.score, self.predicted, self.loss
        )
    }
}

/// An applied optimizer step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    /// 1-based count of applied steps.
    pub step: usize,
    /// Row of the sample that closed the batch.
    pub row: usize,
    pub samples: usize,
    pub batch_loss: f32,
    pub learning_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    EmptySequence,
    NonFiniteLoss,
}

/// A sample that did not contribute to the batch loss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkippedSample {
    pub row: usize,
    pub reason: SkipReason,
}

/// Hooks invoked while an epoch runs. All methods default to no-ops.
pub trait TrainingObserver {
    fn on_progress(&mut self, _record: &ProgressRecord) {}
    fn on_step(&mut self, _record: &StepRecord) {}
    fn on_skip(&mut self, _skipped: &SkippedSample) {}
}

/// Summary of one epoch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochReport {
    pub samples: usize,
    /// Samples the scorer produced a prediction for.
    pub scored: usize,
    pub empty_sequences: usize,
    pub non_finite_losses: usize,
    pub optimizer_steps: usize,
    /// Steps abandoned because of non-finite gradients.
    pub skipped_steps: usize,
    /// Samples accumulated after the last boundary and never applied.
    pub unflushed_samples: usize,
    pub mean_loss: Option<f64>,
    pub mean_absolute_error: Option<f64>,
}

/// Trains a [`RecurrentScorer`] one epoch at a time.
pub struct EpochTrainer {
    config: TrainerConfig,
    scorer: RecurrentScorer,
    optimizer: Sgd,
}

impl EpochTrainer {
    pub fn new(config: TrainerConfig, scorer: RecurrentScorer) -> Result<Self, TrainError> {
        validate_config(&config)?;
        let optimizer = Sgd::new(
            scorer.parameters(),
            config.learning_rate,
            config.schedule.clone(),
        );
        Ok(Self {
            config,
            scorer,
            optimizer,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn scorer(&self) -> &RecurrentScorer {
        &self.scorer
    }

    pub fn into_scorer(self) -> RecurrentScorer {
        self.scorer
    }

    /// Optimizer steps applied so far, across epochs.
    pub fn optimizer_steps(&self) -> usize {
        self.optimizer.steps()
    }

    /// Runs every sample once, in order.
    ///
    /// Empty encoded titles are skipped and counted. Each sample's loss joins
    /// the running batch; at a boundary the batch is backpropagated, the
    /// parameters updated and the accumulator cleared.
    #[instrument(skip(self, samples, observer), fields(samples = samples.len()))]
    pub fn run_epoch(
        &mut self,
        samples: &[TrainingSample],
        mut observer: Option<&mut dyn TrainingObserver>,
    ) -> Result<EpochReport, TrainError> {
        let total = samples.len();
        let mut batch = BatchAccumulator::new();
        let mut report = EpochReport {
            samples: total,
            ..EpochReport::default()
        };
        let mut loss_mean = RunningMean::new();
        let mut error_mean = RunningMean::new();

        for sample in samples {
            let row = sample.row;
            let prediction = match self.scorer.forward(sample.tokens.as_slice()) {
                Ok(prediction) => prediction,
                Err(ScorerError::EmptyInput) => {
                    warn!(row, title = %sample.title, "empty encoded title, skipping sample");
                    report.empty_sequences += 1;
                    if let Some(hook) = observer.as_mut() {
                        hook.on_skip(&SkippedSample {
                            row,
                            reason: SkipReason::EmptySequence,
                        });
                    }
                    continue;
                }
                Err(source) => return Err(TrainError::Scoring { row, source }),
            };
            let ordinal = report.scored;
            report.scored += 1;

            let loss = smooth_l1(&prediction, sample.score, self.config.smooth_l1_beta)
                .map_err(|source| TrainError::Loss { row, source })?;
            let loss_value = loss
                .to_scalar::<f32>()
                .map_err(|source| TrainError::Loss { row, source })?;
            let predicted = prediction
                .to_scalar::<f32>()
                .map_err(|source| TrainError::Loss { row, source })?;

            if loss_value.is_finite() {
                batch
                    .add(loss)
                    .map_err(|source| TrainError::Loss { row, source })?;
                loss_mean.push(f64::from(loss_value));
                error_mean.push(f64::from((predicted - sample.score).abs()));
            } else {
                error!(
                    row,
                    predicted,
                    score = sample.score,
                    "non-finite loss, excluded from batch"
                );
                report.non_finite_losses += 1;
                if let Some(hook) = observer.as_mut() {
                    hook.on_skip(&SkippedSample {
                        row,
                        reason: SkipReason::NonFiniteLoss,
                    });
                }
            }

            let position = match self.config.batch_policy {
                BatchPolicy::Processed => ordinal,
                BatchPolicy::RowIndex => row,
            };
            if position % self.config.batch_size == 0 {
                if let Some(step) = self.flush(&mut batch, row, &mut report)? {
                    if let Some(hook) = observer.as_mut() {
                        hook.on_step(&step);
                    }
                }
            }

            if row % self.config.progress_interval == 0 {
                let record = ProgressRecord {
                    row,
                    total,
                    title: sample.title.clone(),
                    score: sample.score,
                    predicted,
                    loss: loss_value,
                };
                info!(
                    row,
                    total,
                    score = record.score,
                    predicted,
                    loss = loss_value,
                    "training progress"
                );
                if let Some(hook) = observer.as_mut() {
                    hook.on_progress(&record);
                }
            }
        }

        if !batch.is_empty() {
            let last_row = samples.last().map_or(0, |sample| sample.row);
            if self.config.flush_trailing_batch {
                if let Some(step) = self.flush(&mut batch, last_row, &mut report)? {
                    if let Some(hook) = observer.as_mut() {
                        hook.on_step(&step);
                    }
                }
            } else {
                report.unflushed_samples = batch.len();
                debug!(
                    samples = report.unflushed_samples,
                    "trailing partial batch left unapplied"
                );
            }
        }

        report.mean_loss = loss_mean.mean();
        report.mean_absolute_error = error_mean.mean();
        info!(
            scored = report.scored,
            empty_sequences = report.empty_sequences,
            non_finite_losses = report.non_finite_losses,
            optimizer_steps = report.optimizer_steps,
            skipped_steps = report.skipped_steps,
            mean_loss = report.mean_loss,
            "epoch finished"
        );
        Ok(report)
    }

    fn flush(
        &mut self,
        batch: &mut BatchAccumulator,
        row: usize,
        report: &mut EpochReport,
    ) -> Result<Option<StepRecord>, TrainError> {
        let Some(pending) = batch.take() else {
            return Ok(None);
        };
        let batch_loss = pending
            .loss
            .to_scalar::<f32>()
            .map_err(|source| TrainError::Optimization { row, source })?;
        let outcome = self
            .optimizer
            .backward_step(&pending.loss)
            .map_err(|source| TrainError::Optimization { row, source })?;

        match outcome {
            StepOutcome::Applied { learning_rate } => {
                report.optimizer_steps += 1;
                let step = StepRecord {
                    step: self.optimizer.steps(),
                    row,
                    samples: pending.samples,
                    batch_loss,
                    learning_rate,
                };
                debug!(
                    step = step.step,
                    row,
                    samples = step.samples,
                    batch_loss,
                    learning_rate,
                    "optimizer step"
                );
                Ok(Some(step))
            }
            StepOutcome::NonFiniteGradient => {
                error!(row, batch_loss, "non-finite gradient, optimizer step skipped");
                report.skipped_steps += 1;
                Ok(None)
            }
        }
    }
}

fn validate_config(config: &TrainerConfig) -> Result<(), TrainError> {
    if config.batch_size == 0 {
        return Err(TrainError::InvalidConfig("batch_size must be at least 1"));
    }
    if config.progress_interval == 0 {
        return Err(TrainError::InvalidConfig(
            "progress_interval must be at least 1",
        ));
    }
    if !(config.learning_rate.is_finite() && config.learning_rate > 0.0) {
        return Err(TrainError::InvalidConfig(
            "learning_rate must be positive and finite",
        ));
    }
    if !(config.smooth_l1_beta.is_finite() && config.smooth_l1_beta > 0.0) {
        return Err(TrainError::InvalidConfig(
            "smooth_l1_beta must be positive and finite",
        ));
    }
    Ok(())
}
