use serde::{Deserialize, Serialize};

/// Nonlinearity applied to the hidden projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Purely affine recurrence.
    #[default]
    Identity,
    Tanh,
}

/// Shape and initialisation of a [`RecurrentScorer`](crate::RecurrentScorer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Width of the one-hot token encoding.
    pub vector_size: usize,
    /// Output width of the input projection.
    pub input_l2_size: usize,
    /// Hidden state width.
    pub hidden_size: usize,
    pub activation: Activation,
    /// Seed for parameter initialisation.
    pub seed: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            vector_size: 10_000,
            input_l2_size: 100,
            hidden_size: 1000,
            activation: Activation::Identity,
            seed: 1,
        }
    }
}

impl ScorerConfig {
    /// Width of the concatenated `[input_l2, hidden]` vector.
    pub fn combined_size(&self) -> usize {
        self.input_l2_size + self.hidden_size
    }
}
