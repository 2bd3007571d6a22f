use candle_core::{Result, Tensor, Var};
use serde::{Deserialize, Serialize};

/// Learning rate as a function of the optimizer step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearningRateSchedule {
    /// The base rate for every step.
    #[default]
    Constant,
    /// Linear warmup to the base rate, then cosine decay to `min_lr`.
    WarmupCosine {
        warmup_steps: usize,
        total_steps: usize,
        min_lr: f64,
    },
}

impl LearningRateSchedule {
    pub fn learning_rate(&self, base_lr: f64, step: usize) -> f64 {
        match *self {
            Self::Constant => base_lr,
            Self::WarmupCosine {
                warmup_steps,
                total_steps,
                min_lr,
            } => {
                if total_steps == 0 {
                    return min_lr;
                }
                if step < warmup_steps {
                    return base_lr * (step + 1) as f64 / warmup_steps as f64;
                }
                let decay_steps = total_steps.saturating_sub(warmup_steps).max(1);
                let progress = ((step - warmup_steps) as f64 / decay_steps as f64).min(1.0);
                let cosine = (std::f64::consts::PI * progress).cos();
                (min_lr + 0.5 * (base_lr - min_lr) * (1.0 + cosine)).max(min_lr)
            }
        }
    }
}

/// Result of one optimizer step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    Applied { learning_rate: f64 },
    /// Some gradient held NaN or infinity; parameters were left untouched.
    NonFiniteGradient,
}

/// Plain stochastic gradient descent over candle variables.
///
/// Every step backpropagates a fresh loss graph, so gradients from earlier
/// steps never leak into the current one.
pub struct Sgd {
    vars: Vec<Var>,
    base_lr: f64,
    schedule: LearningRateSchedule,
    steps: usize,
}

impl Sgd {
    pub fn new(vars: Vec<Var>, base_lr: f64, schedule: LearningRateSchedule) -> Self {
        Self {
            vars,
            base_lr,
            schedule,
            steps: 0,
        }
    }

    /// Number of applied updates.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn learning_rate(&self) -> f64 {
        self.schedule.learning_rate(self.base_lr, self.steps)
    }

    /// Backpropagates `loss` and moves every variable against its gradient.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<StepOutcome> {
        let grads = loss.backward()?;
        for var in &self.vars {
            if let Some(grad) = grads.get(var.as_tensor()) {
                if !grad.sum_all()?.to_scalar::<f32>()?.is_finite() {
                    return Ok(StepOutcome::NonFiniteGradient);
                }
            }
        }

        let learning_rate = self.learning_rate();
        for var in &self.vars {
            if let Some(grad) = grads.get(var.as_tensor()) {
                let updated = var.as_tensor().sub(&grad.affine(learning_rate, 0.0)?)?;
                var.set(&updated)?;
            }
        }
        self.steps += 1;
        Ok(StepOutcome::Applied { learning_rate })
    }
}
