//! Noise simulation and reconstruction quality measures.

use ndarray::{Array2, ArrayView2, Zip};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{ensure_shape, DeblurError, Result};
use crate::float_trait::DeblurFloat;

/// Add i.i.d. `N(0, sigma^2)` noise to every pixel.
///
/// Draws are standard normal scaled by `sigma`, so the same seed gives the same
/// noise pattern at every noise level.
pub fn add_gaussian_noise<F, R>(image: ArrayView2<F>, sigma: F, rng: &mut R) -> Result<Array2<F>>
where
    F: DeblurFloat,
    R: Rng + ?Sized,
{
    if !sigma.is_finite() || sigma < F::zero() {
        return Err(DeblurError::InvalidParameter(format!(
            "noise sigma must be finite and >= 0, got {}",
            sigma
        )));
    }
    let mut noisy = image.to_owned();
    for v in noisy.iter_mut() {
        let z = F::from_f64_c(rng.sample::<f64, _>(StandardNormal));
        *v += sigma * z;
    }
    Ok(noisy)
}

fn squared_distance<F: DeblurFloat>(a: ArrayView2<F>, b: ArrayView2<F>) -> F {
    let mut acc = F::zero();
    Zip::from(&a).and(&b).for_each(|&x, &y| {
        let d = x - y;
        acc += d * d;
    });
    acc
}

/// `||estimate - truth|| / ||truth||` in the Frobenius norm.
pub fn relative_error<F: DeblurFloat>(estimate: ArrayView2<F>, truth: ArrayView2<F>) -> Result<F> {
    ensure_shape("estimate", truth.dim(), estimate.dim())?;
    let norm = truth.iter().map(|&v| v * v).sum::<F>().sqrt();
    if norm == F::zero() {
        return Err(DeblurError::InvalidParameter(
            "relative error against an all-zero reference".to_string(),
        ));
    }
    Ok(squared_distance(estimate, truth).sqrt() / norm)
}

/// Sum of squared periodic forward differences along both axes.
pub fn gradient_energy<F: DeblurFloat>(image: ArrayView2<F>) -> F {
    let (rows, cols) = image.dim();
    let mut energy = F::zero();
    for r in 0..rows {
        for c in 0..cols {
            let v = image[[r, c]];
            let dr = image[[(r + 1) % rows, c]] - v;
            let dc = image[[r, (c + 1) % cols]] - v;
            energy += dr * dr + dc * dc;
        }
    }
    energy
}

/// Peak signal-to-noise ratio in dB. Infinite for identical images.
pub fn psnr<F: DeblurFloat>(estimate: ArrayView2<F>, truth: ArrayView2<F>, peak: F) -> Result<F> {
    ensure_shape("estimate", truth.dim(), estimate.dim())?;
    if truth.is_empty() {
        return Err(DeblurError::EmptyImage);
    }
    if !peak.is_finite() || peak <= F::zero() {
        return Err(DeblurError::InvalidParameter(format!(
            "psnr peak must be finite and > 0, got {}",
            peak
        )));
    }
    let mse = squared_distance(estimate, truth) / F::usize_as(truth.len());
    if mse == F::zero() {
        return Ok(F::infinity());
    }
    Ok(F::from_f64_c(10.0) * (peak * peak / mse).log10())
}
