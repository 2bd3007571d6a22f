use serde::{Deserialize, Serialize};

use crate::optimizer::LearningRateSchedule;

/// Which position decides a batch boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Ordinal of successfully scored samples, so skipped samples do not
    /// shift the boundaries.
    #[default]
    Processed,
    /// Corpus row index of the sample; boundaries drift when rows are dropped.
    RowIndex,
}

/// Configuration for the single-epoch trainer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Samples per optimizer step.
    pub batch_size: usize,
    pub learning_rate: f64,
    pub schedule: LearningRateSchedule,
    /// Rows between progress reports.
    pub progress_interval: usize,
    pub batch_policy: BatchPolicy,
    /// Apply one last step for samples accumulated after the final boundary.
    pub flush_trailing_batch: bool,
    /// Transition point between the quadratic and linear branch of the loss.
    pub smooth_l1_beta: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            learning_rate: 1e-3,
            schedule: LearningRateSchedule::Constant,
            progress_interval: 1000,
            batch_policy: BatchPolicy::Processed,
            flush_trailing_batch: false,
            smooth_l1_beta: 1.0,
        }
    }
}
