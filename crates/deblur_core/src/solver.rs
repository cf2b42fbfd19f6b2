//! Closed-form Tikhonov deconvolution for circulant operators.
//!
//! Minimizes `||A x - y||^2 + gamma ||L x||^2` where `A` (blur) and `L`
//! (regularizer) are both diagonalized by the unitary 2-D DFT with real
//! eigenvalues `Lambda` and `Pi`. The normal equations decouple into one scalar
//! equation per frequency:
//!
//! ```text
//! X[k] = Lambda[k] / (Lambda[k]^2 + gamma * Pi[k]^2) * Y[k]
//! ```
//!
//! With `gamma = 0` this is plain inversion, unstable wherever `Lambda[k]` is
//! near zero. Frequencies where the denominator is exactly zero are set to 0.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;
use rustfft::num_complex::Complex;

use crate::error::{ensure_non_empty, ensure_shape, DeblurError, Result};
use crate::float_trait::DeblurFloat;
use crate::kernels::{kernel_eigenvalues, KernelSpec};
use crate::regularization::{regularization_eigenvalues, Regularizer};
use crate::transforms::{fft2d_ortho, ifft2d_ortho_real, Fft2dPlans};

fn validate_gamma<F: DeblurFloat>(gamma: F) -> Result<()> {
    if !gamma.is_finite() || gamma < F::zero() {
        return Err(DeblurError::InvalidParameter(format!(
            "gamma must be finite and >= 0, got {}",
            gamma
        )));
    }
    Ok(())
}

/// Per-frequency Tikhonov gain `Lambda / (Lambda^2 + gamma Pi^2)`.
/// Returns the gain grid and the number of frequencies with a zero denominator.
fn tikhonov_gain<F: DeblurFloat>(
    lambda: ArrayView2<F>,
    pi: ArrayView2<F>,
    gamma: F,
) -> (Array2<F>, usize) {
    let mut gain = Array2::zeros(lambda.dim());
    let mut singular = 0usize;
    Zip::from(&mut gain)
        .and(&lambda)
        .and(&pi)
        .for_each(|g, &l, &p| {
            let denom = l * l + gamma * p * p;
            if denom == F::zero() {
                singular += 1;
                *g = F::zero();
            } else {
                *g = l / denom;
            }
        });
    (gain, singular)
}

fn apply_gain<F: DeblurFloat>(
    spectrum: &Array2<Complex<F>>,
    gain: &Array2<F>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<F>> {
    let mut filtered = spectrum.clone();
    Zip::from(&mut filtered)
        .and(gain)
        .for_each(|x, &g| *x = *x * g);
    ifft2d_ortho_real(filtered.view(), plans)
}

fn report_singular(singular: usize, gamma: f64) {
    if singular > 0 {
        warn!(
            "{} frequencies have a zero Tikhonov denominator at gamma={:e}; their coefficients were set to 0",
            singular, gamma
        );
    }
}

/// Solve the regularized deconvolution problem for one observation.
///
/// `lambda` and `pi` must have the same shape as `observed`; `gamma >= 0`.
pub fn solve_regularized<F: DeblurFloat>(
    observed: ArrayView2<F>,
    lambda: ArrayView2<F>,
    pi: ArrayView2<F>,
    gamma: F,
) -> Result<Array2<F>> {
    validate_gamma(gamma)?;
    let shape = observed.dim();
    ensure_non_empty(shape)?;
    ensure_shape("blur eigenvalues", shape, lambda.dim())?;
    ensure_shape("regularization eigenvalues", shape, pi.dim())?;

    let plans = Fft2dPlans::new(shape.0, shape.1)?;
    let spectrum = fft2d_ortho(observed, &plans)?;
    let (gain, singular) = tikhonov_gain(lambda, pi, gamma);
    report_singular(singular, gamma.as_f64());
    apply_gain(&spectrum, &gain, &plans)
}

/// Reusable solver for one blur operator and one regularizer.
///
/// Holds FFT plans and both eigenvalue grids so they are computed once and
/// shared across observations and regularization weights.
pub struct CirculantDeconvolver<F: DeblurFloat> {
    plans: Fft2dPlans<F>,
    lambda: Array2<F>,
    pi: Array2<F>,
}

impl<F: DeblurFloat> CirculantDeconvolver<F> {
    /// Build from precomputed eigenvalue grids (e.g. from probing).
    pub fn new(lambda: Array2<F>, pi: Array2<F>) -> Result<Self> {
        let shape = lambda.dim();
        ensure_non_empty(shape)?;
        ensure_shape("regularization eigenvalues", shape, pi.dim())?;
        let plans = Fft2dPlans::new(shape.0, shape.1)?;
        Ok(Self { plans, lambda, pi })
    }

    /// Build around existing plans; both grids must match the plan shape.
    pub fn with_plans(plans: Fft2dPlans<F>, lambda: Array2<F>, pi: Array2<F>) -> Result<Self> {
        let shape = plans.shape();
        ensure_non_empty(shape)?;
        ensure_shape("blur eigenvalues", shape, lambda.dim())?;
        ensure_shape("regularization eigenvalues", shape, pi.dim())?;
        Ok(Self { plans, lambda, pi })
    }

    /// Build with exact kernel eigenvalues and closed-form regularizer.
    pub fn from_kernel(
        kernel: &KernelSpec<F>,
        regularizer: Regularizer,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        let plans = Fft2dPlans::new(rows, cols)?;
        let lambda = kernel_eigenvalues(kernel, &plans)?;
        let pi = regularization_eigenvalues(regularizer, rows, cols)?;
        Ok(Self { plans, lambda, pi })
    }

    /// Grid shape `(rows, cols)` this solver was built for.
    pub fn shape(&self) -> (usize, usize) {
        self.plans.shape()
    }

    /// Blur eigenvalues `Lambda`.
    pub fn eigenvalues(&self) -> ArrayView2<'_, F> {
        self.lambda.view()
    }

    /// Regularization eigenvalues `Pi`.
    pub fn regularization_eigenvalues(&self) -> ArrayView2<'_, F> {
        self.pi.view()
    }

    /// Per-frequency gain applied to the observation spectrum at `gamma`.
    pub fn filter(&self, gamma: F) -> Result<Array2<F>> {
        validate_gamma(gamma)?;
        Ok(tikhonov_gain(self.lambda.view(), self.pi.view(), gamma).0)
    }

    /// Deconvolve one observation.
    pub fn solve(&self, observed: ArrayView2<F>, gamma: F) -> Result<Array2<F>> {
        validate_gamma(gamma)?;
        ensure_shape("observed image", self.shape(), observed.dim())?;
        let spectrum = fft2d_ortho(observed, &self.plans)?;
        let (gain, singular) = tikhonov_gain(self.lambda.view(), self.pi.view(), gamma);
        report_singular(singular, gamma.as_f64());
        apply_gain(&spectrum, &gain, &self.plans)
    }

    /// Deconvolve one observation for several regularization weights.
    /// The observation spectrum is computed once; weights run in parallel.
    pub fn solve_many(&self, observed: ArrayView2<F>, gammas: &[F]) -> Result<Vec<Array2<F>>> {
        for &gamma in gammas {
            validate_gamma(gamma)?;
        }
        ensure_shape("observed image", self.shape(), observed.dim())?;
        let spectrum = fft2d_ortho(observed, &self.plans)?;
        debug!(
            "solving {}x{} observation for {} regularization weights",
            self.shape().0,
            self.shape().1,
            gammas.len()
        );

        gammas
            .par_iter()
            .map(|&gamma| {
                let (gain, singular) = tikhonov_gain(self.lambda.view(), self.pi.view(), gamma);
                report_singular(singular, gamma.as_f64());
                apply_gain(&spectrum, &gain, &self.plans)
            })
            .collect()
    }
}
