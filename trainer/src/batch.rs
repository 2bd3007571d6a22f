use candle_core::{Result, Tensor};

/// Loss summed over the samples of one batch, ready for backpropagation.
#[derive(Debug)]
pub struct PendingBatch {
    pub loss: Tensor,
    pub samples: usize,
}

/// Running sum of per-sample losses between two optimizer steps.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    total: Option<Tensor>,
    samples: usize,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, loss: Tensor) -> Result<()> {
        self.total = Some(match self.total.take() {
            Some(total) => total.add(&loss)?,
            None => loss,
        });
        self.samples += 1;
        Ok(())
    }

    /// Samples accumulated since the last flush.
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Hands out the accumulated loss and resets to zero.
    pub fn take(&mut self) -> Option<PendingBatch> {
        let samples = std::mem::take(&mut self.samples);
        self.total.take().map(|loss| PendingBatch { loss, samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn take_returns_sum_and_resets() {
        let device = Device::Cpu;
        let mut batch = BatchAccumulator::new();
        assert!(batch.take().is_none());

        batch.add(Tensor::new(0.5f32, &device).unwrap()).unwrap();
        batch.add(Tensor::new(1.25f32, &device).unwrap()).unwrap();
        assert_eq!(batch.len(), 2);

        let pending = batch.take().unwrap();
        assert_eq!(pending.samples, 2);
        assert_eq!(pending.loss.to_scalar::<f32>().unwrap(), 1.75);
        assert!(batch.is_empty());
        assert!(batch.take().is_none());
    }
}
