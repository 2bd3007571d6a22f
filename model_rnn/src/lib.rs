//! Recurrent scorer: three affine layers driven one token at a time, with
//! the prediction taken from the last step.

pub mod affine;
pub mod config;
pub mod scorer;

pub use affine::Affine;
pub use config::{Activation, ScorerConfig};
pub use scorer::{RecurrentScorer, ScorerError};
