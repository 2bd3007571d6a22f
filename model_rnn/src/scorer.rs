//! Token-by-token recurrence producing a scalar score per title.

use candle_core::{DType, Device, Tensor, Var};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::info;

use crate::affine::Affine;
use crate::config::{Activation, ScorerConfig};

/// Errors raised while building or running a [`RecurrentScorer`].
#[derive(Debug, Error)]
pub enum ScorerError {
    /// The encoded title had no tokens, so no step produced an output.
    #[error("encoded title is empty, no prediction was produced")]
    EmptyInput,
    /// A token index does not fit the one-hot width.
    #[error("token index {token} out of range for vector size {vector_size}")]
    TokenOutOfRange { token: u32, vector_size: usize },
    /// A configured dimension was zero.
    #[error("invalid scorer configuration: {0}")]
    InvalidConfig(&'static str),
    /// A supplied layer does not have the shape the configuration requires.
    #[error("{layer} projection must be {expected:?}, found {found:?}")]
    ShapeMismatch {
        layer: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Tensor backend failure.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Recurrent regressor over vocabulary index sequences.
///
/// For every token `t` the scorer computes
///
/// ```text
/// input_l2 = InputProjection(onehot(t))
/// hidden'  = act(HiddenProjection([input_l2, hidden]))
/// output   = OutputProjection([input_l2, hidden'])
/// ```
///
/// starting from a zero hidden state, and reports the output of the last
/// token as the prediction.
#[derive(Clone, Debug)]
pub struct RecurrentScorer {
    config: ScorerConfig,
    device: Device,
    input: Affine,
    hidden: Affine,
    output: Affine,
}

impl RecurrentScorer {
    /// Initialises all parameters from `config.seed`.
    pub fn new(config: ScorerConfig, device: &Device) -> Result<Self, ScorerError> {
        validate_config(&config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let combined = config.combined_size();
        let input = Affine::uniform(config.vector_size, config.input_l2_size, &mut rng, device)?;
        let hidden = Affine::uniform(combined, config.hidden_size, &mut rng, device)?;
        let output = Affine::uniform(combined, 1, &mut rng, device)?;

        let scorer = Self::from_layers(config, input, hidden, output)?;
        info!(
            vector_size = scorer.config.vector_size,
            input_l2_size = scorer.config.input_l2_size,
            hidden_size = scorer.config.hidden_size,
            parameters = scorer.parameter_count(),
            "recurrent scorer initialised"
        );
        Ok(scorer)
    }

    /// Assembles a scorer from explicit layers.
    pub fn from_layers(
        config: ScorerConfig,
        input: Affine,
        hidden: Affine,
        output: Affine,
    ) -> Result<Self, ScorerError> {
        validate_config(&config)?;
        let combined = config.combined_size();
        check_shape("input", &input, (config.vector_size, config.input_l2_size))?;
        check_shape("hidden", &hidden, (combined, config.hidden_size))?;
        check_shape("output", &output, (combined, 1))?;
        let device = input.weight().device().clone();
        Ok(Self {
            config,
            device,
            input,
            hidden,
            output,
        })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Fresh `1 × hidden_size` zero state.
    pub fn zero_hidden(&self) -> Result<Tensor, ScorerError> {
        Ok(Tensor::zeros(
            (1, self.config.hidden_size),
            DType::F32,
            &self.device,
        )?)
    }

    /// One recurrence step, returning `(output, next_hidden)`.
    pub fn step(&self, token: u32, hidden: &Tensor) -> Result<(Tensor, Tensor), ScorerError> {
        let index = token as usize;
        if index >= self.config.vector_size {
            return Err(ScorerError::TokenOutOfRange {
                token,
                vector_size: self.config.vector_size,
            });
        }
        let input_l2 = self.input.forward_one_hot(index)?;
        let combined = Tensor::cat(&[&input_l2, hidden], 1)?;
        let next_hidden = self.activate(self.hidden.forward(&combined)?)?;
        let new_combined = Tensor::cat(&[&input_l2, &next_hidden], 1)?;
        let output = self.output.forward(&new_combined)?;
        Ok((output, next_hidden))
    }

    /// Runs the whole sequence and returns the last step's output as a
    /// scalar tensor attached to the autograd graph.
    pub fn forward(&self, tokens: &[u32]) -> Result<Tensor, ScorerError> {
        if tokens.is_empty() {
            return Err(ScorerError::EmptyInput);
        }
        let mut hidden = self.zero_hidden()?;
        let mut output = None;
        for &token in tokens {
            let (step_output, next_hidden) = self.step(token, &hidden)?;
            output = Some(step_output);
            hidden = next_hidden;
        }
        let output = output.ok_or(ScorerError::EmptyInput)?;
        Ok(output.reshape(())?)
    }

    /// Prediction as a plain number.
    pub fn predict(&self, tokens: &[u32]) -> Result<f32, ScorerError> {
        Ok(self.forward(tokens)?.to_scalar::<f32>()?)
    }

    /// Trainable parameters of all three layers, sharing storage with them.
    pub fn parameters(&self) -> Vec<Var> {
        [&self.input, &self.hidden, &self.output]
            .into_iter()
            .flat_map(Affine::vars)
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|var| var.elem_count()).sum()
    }

    fn activate(&self, tensor: Tensor) -> Result<Tensor, ScorerError> {
        match self.config.activation {
            Activation::Identity => Ok(tensor),
            Activation::Tanh => Ok(tensor.tanh()?),
        }
    }
}

fn validate_config(config: &ScorerConfig) -> Result<(), ScorerError> {
    if config.vector_size == 0 {
        return Err(ScorerError::InvalidConfig("vector_size must be non-zero"));
    }
    if config.input_l2_size == 0 {
        return Err(ScorerError::InvalidConfig("input_l2_size must be non-zero"));
    }
    if config.hidden_size == 0 {
        return Err(ScorerError::InvalidConfig("hidden_size must be non-zero"));
    }
    Ok(())
}

fn check_shape(
    layer: &'static str,
    affine: &Affine,
    expected: (usize, usize),
) -> Result<(), ScorerError> {
    let found = (affine.in_dim(), affine.out_dim());
    if found != expected {
        return Err(ScorerError::ShapeMismatch {
            layer,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const INPUT_W: [f32; 6] = [1.0, 2.0, 0.5, -1.0, 0.25, 0.75];
    const INPUT_B: [f32; 2] = [0.5, -0.5];
    const HIDDEN_W: [f32; 8] = [1.0, 0.5, -1.0, 0.25, 2.0, 1.0, 1.0, -2.0];
    const HIDDEN_B: [f32; 2] = [0.25, 0.0];
    const OUTPUT_W: [f32; 4] = [1.0, 2.0, 4.0, -1.0];
    const OUTPUT_B: [f32; 1] = [0.5];

    fn fixture_config(activation: Activation) -> ScorerConfig {
        ScorerConfig {
            vector_size: 3,
            input_l2_size: 2,
            hidden_size: 2,
            activation,
            seed: 1,
        }
    }

    fn layer(weight: &[f32], bias: &[f32], shape: (usize, usize)) -> Affine {
        let device = Device::Cpu;
        Affine::from_tensors(
            Tensor::from_vec(weight.to_vec(), shape, &device).unwrap(),
            Tensor::from_vec(bias.to_vec(), (1, shape.1), &device).unwrap(),
        )
        .unwrap()
    }

    fn fixture(activation: Activation) -> RecurrentScorer {
        RecurrentScorer::from_layers(
            fixture_config(activation),
            layer(&INPUT_W, &INPUT_B, (3, 2)),
            layer(&HIDDEN_W, &HIDDEN_B, (4, 2)),
            layer(&OUTPUT_W, &OUTPUT_B, (4, 1)),
        )
        .unwrap()
    }

    /// `x · W + b` on row-major `W` with `x.len()` rows.
    fn affine_ref(x: &[f32], weight: &[f32], bias: &[f32]) -> Vec<f32> {
        let out = bias.len();
        (0..out)
            .map(|col| {
                x.iter()
                    .enumerate()
                    .map(|(row, value)| value * weight[row * out + col])
                    .sum::<f32>()
                    + bias[col]
            })
            .collect()
    }

    fn forward_ref(tokens: &[u32]) -> f32 {
        let mut hidden = vec![0.0f32; 2];
        let mut output = f32::NAN;
        for &token in tokens {
            let mut one_hot = vec![0.0f32; 3];
            one_hot[token as usize] = 1.0;
            let input_l2 = affine_ref(&one_hot, &INPUT_W, &INPUT_B);
            let combined: Vec<f32> = input_l2.iter().chain(&hidden).copied().collect();
            let next = affine_ref(&combined, &HIDDEN_W, &HIDDEN_B);
            let new_combined: Vec<f32> = input_l2.iter().chain(&next).copied().collect();
            output = affine_ref(&new_combined, &OUTPUT_W, &OUTPUT_B)[0];
            hidden = next;
        }
        output
    }

    #[test]
    fn single_token_matches_hand_computation() {
        let scorer = fixture(Activation::Identity);
        // input_l2 = [1.5, 1.5], hidden' = [0.25, 1.125]
        assert_eq!(scorer.predict(&[0]).unwrap(), 4.875);
        assert_eq!(forward_ref(&[0]), 4.875);
    }

    #[test]
    fn hidden_state_carries_across_tokens() {
        let scorer = fixture(Activation::Identity);
        let prediction = scorer.predict(&[0, 2]).unwrap();
        assert_eq!(prediction, 12.8125);
        assert_eq!(prediction, forward_ref(&[0, 2]));
        assert_ne!(prediction, scorer.predict(&[2]).unwrap());
    }

    #[test]
    fn hidden_state_is_reset_between_titles() {
        let scorer = fixture(Activation::Identity);
        let first = scorer.predict(&[1, 2]).unwrap();
        let _ = scorer.predict(&[0, 0, 0]).unwrap();
        assert_eq!(scorer.predict(&[1, 2]).unwrap(), first);
        let zero = scorer.zero_hidden().unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(zero, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn empty_sequence_is_an_error_not_a_value() {
        let scorer = fixture(Activation::Identity);
        assert!(matches!(scorer.forward(&[]), Err(ScorerError::EmptyInput)));
        assert!(matches!(scorer.predict(&[]), Err(ScorerError::EmptyInput)));
    }

    #[test]
    fn out_of_range_token_is_rejected() {
        let scorer = fixture(Activation::Identity);
        assert!(matches!(
            scorer.predict(&[0, 3]),
            Err(ScorerError::TokenOutOfRange {
                token: 3,
                vector_size: 3
            })
        ));
    }

    #[test]
    fn tanh_activation_squashes_hidden_state() {
        let scorer = fixture(Activation::Tanh);
        let hidden = [0.25f32.tanh(), 1.125f32.tanh()];
        let expected = 1.5 + 3.0 + 4.0 * hidden[0] - hidden[1] + 0.5;
        assert_relative_eq!(scorer.predict(&[0]).unwrap(), expected, epsilon = 1e-5);
    }

    #[test]
    fn seeded_initialisation_is_reproducible() {
        let config = ScorerConfig {
            vector_size: 5,
            input_l2_size: 3,
            hidden_size: 4,
            ..ScorerConfig::default()
        };
        let first = RecurrentScorer::new(config.clone(), &Device::Cpu).unwrap();
        let second = RecurrentScorer::new(config, &Device::Cpu).unwrap();
        assert_eq!(
            first.predict(&[4, 1, 0]).unwrap(),
            second.predict(&[4, 1, 0]).unwrap()
        );
        assert_eq!(first.parameters().len(), 6);
        assert_eq!(first.parameter_count(), 5 * 3 + 3 + 7 * 4 + 4 + 7 + 1);
    }

    #[test]
    fn layers_with_wrong_shape_are_rejected() {
        let result = RecurrentScorer::from_layers(
            fixture_config(Activation::Identity),
            layer(&INPUT_W, &INPUT_B, (3, 2)),
            layer(&OUTPUT_W, &OUTPUT_B, (4, 1)),
            layer(&OUTPUT_W, &OUTPUT_B, (4, 1)),
        );
        assert!(matches!(
            result,
            Err(ScorerError::ShapeMismatch {
                layer: "hidden",
                ..
            })
        ));
    }

    #[test]
    fn gradients_reach_every_layer() {
        let scorer = fixture(Activation::Identity);
        let grads = scorer.forward(&[0, 1]).unwrap().backward().unwrap();
        for var in scorer.parameters() {
            assert!(grads.get(var.as_tensor()).is_some());
        }
    }
}
