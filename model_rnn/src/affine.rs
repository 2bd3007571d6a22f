//! Dense affine layer with trainable parameters.

use candle_core::{Device, Result, Tensor, Var, bail};
use rand::Rng;
use rand::distributions::Uniform;

/// `y = x · W + b` with `W` stored as `in × out` and `b` as `1 × out`.
#[derive(Clone, Debug)]
pub struct Affine {
    weight: Var,
    bias: Var,
}

impl Affine {
    /// Wraps explicit parameters, checking that their shapes agree.
    pub fn from_tensors(weight: Tensor, bias: Tensor) -> Result<Self> {
        let (_, out_dim) = weight.dims2()?;
        let (rows, bias_dim) = bias.dims2()?;
        if rows != 1 || bias_dim != out_dim {
            bail!(
                "bias shape {:?} does not match weight shape {:?}",
                bias.dims(),
                weight.dims()
            );
        }
        Ok(Self {
            weight: Var::from_tensor(&weight)?,
            bias: Var::from_tensor(&bias)?,
        })
    }

    /// Samples weight and bias from `U(-1/sqrt(in), 1/sqrt(in))`.
    pub fn uniform<R: Rng>(
        in_dim: usize,
        out_dim: usize,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            bail!("affine layer dimensions must be non-zero, got {in_dim}x{out_dim}");
        }
        let bound = 1.0 / (in_dim as f32).sqrt();
        let range = Uniform::new(-bound, bound);
        let weight: Vec<f32> = (0..in_dim * out_dim).map(|_| rng.sample(range)).collect();
        let bias: Vec<f32> = (0..out_dim).map(|_| rng.sample(range)).collect();
        Self::from_tensors(
            Tensor::from_vec(weight, (in_dim, out_dim), device)?,
            Tensor::from_vec(bias, (1, out_dim), device)?,
        )
    }

    pub fn in_dim(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn out_dim(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn weight(&self) -> &Tensor {
        self.weight.as_tensor()
    }

    pub fn bias(&self) -> &Tensor {
        self.bias.as_tensor()
    }

    /// Applies the layer to a `1 × in` row.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        input
            .matmul(self.weight.as_tensor())?
            .broadcast_add(self.bias.as_tensor())
    }

    /// Applies the layer to the one-hot row for `index` without materialising it.
    ///
    /// Selecting weight row `index` is exactly the product of the one-hot row
    /// with `W`, so gradients only reach that row.
    pub fn forward_one_hot(&self, index: usize) -> Result<Tensor> {
        self.weight
            .as_tensor()
            .narrow(0, index, 1)?
            .broadcast_add(self.bias.as_tensor())
    }

    /// Trainable parameters, sharing storage with the layer.
    pub fn vars(&self) -> [Var; 2] {
        [self.weight.clone(), self.bias.clone()]
    }
}
