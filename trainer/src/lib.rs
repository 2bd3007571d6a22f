//! Single-epoch training of the recurrent scorer with batch loss accumulation.

pub mod batch;
pub mod config;
pub mod dataset;
pub mod epoch;
pub mod loss;
pub mod metrics;
pub mod optimizer;

pub use batch::{BatchAccumulator, PendingBatch};
pub use config::{BatchPolicy, TrainerConfig};
pub use dataset::TrainingSample;
pub use epoch::{
    EpochReport, EpochTrainer, ProgressRecord, SkipReason, SkippedSample, StepRecord, TrainError,
    TrainingObserver,
};
pub use loss::smooth_l1;
pub use metrics::RunningMean;
pub use optimizer::{LearningRateSchedule, Sgd, StepOutcome};
