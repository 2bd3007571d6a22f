use candle_core::{Result, Tensor};

/// Smooth L1 loss between a scalar prediction and its target.
///
/// Quadratic `0.5 * d^2 / beta` while `|d| < beta`, linear `|d| - 0.5 * beta`
/// beyond. The branch is picked from the current value; the returned scalar
/// stays attached to the prediction's graph.
pub fn smooth_l1(prediction: &Tensor, target: f32, beta: f64) -> Result<Tensor> {
    let diff = prediction.affine(1.0, -f64::from(target))?;
    let magnitude = diff.abs()?;
    let distance = f64::from(magnitude.to_scalar::<f32>()?);
    if distance < beta {
        diff.sqr()?.affine(0.5 / beta, 0.0)
    } else {
        magnitude.affine(1.0, -0.5 * beta)
    }
}
