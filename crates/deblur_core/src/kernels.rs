//! Periodic (wraparound) blur operators.
//!
//! These are the forward models of the deconvolution problem: every operator
//! here is a 2-D circular convolution, i.e. a BCCB matrix applied without ever
//! being formed. Boundary handling is always `wrap` (indices taken modulo the
//! image size), which is what makes the operators diagonal in the Fourier basis.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;

use crate::error::{ensure_non_empty, DeblurError, Result};
use crate::float_trait::DeblurFloat;
use crate::transforms::{fft2d_unnormalized, Fft2dPlans};

// =============================================================================
// Constants for Periodic Convolution
// =============================================================================

/// Minimum number of lanes before a separable pass runs on rayon.
const PARALLEL_LANE_THRESHOLD: usize = 512;

/// Description of a spatially invariant, periodic blur.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelSpec<F: DeblurFloat> {
    /// No blur.
    Identity,
    /// Separable Gaussian with standard deviation `sigma` (pixels), truncated at
    /// `GAUSSIAN_TRUNCATE * sigma`. `sigma == 0` is the identity.
    Gaussian { sigma: F },
    /// Arbitrary kernel with odd dimensions, centred on its middle sample.
    Stencil(Array2<F>),
}

impl<F: DeblurFloat> KernelSpec<F> {
    /// Check the kernel parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            KernelSpec::Identity => Ok(()),
            KernelSpec::Gaussian { sigma } => {
                if !sigma.is_finite() || *sigma < F::zero() {
                    return Err(DeblurError::InvalidParameter(format!(
                        "gaussian sigma must be finite and >= 0, got {}",
                        sigma
                    )));
                }
                Ok(())
            }
            KernelSpec::Stencil(weights) => {
                let (kh, kw) = weights.dim();
                if kh == 0 || kw == 0 || kh % 2 == 0 || kw % 2 == 0 {
                    return Err(DeblurError::InvalidParameter(format!(
                        "stencil dimensions must be odd and non-zero, got {}x{}",
                        kh, kw
                    )));
                }
                if weights.iter().any(|w| !w.is_finite()) {
                    return Err(DeblurError::InvalidParameter(
                        "stencil weights must be finite".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Compute 1D Gaussian kernel with given sigma.
/// Kernel size is ceil(4 * sigma) * 2 + 1 to match scipy's default truncate=4.0
pub(crate) fn gaussian_kernel_1d<F: DeblurFloat>(sigma: F) -> Vec<F> {
    if sigma <= F::zero() {
        return vec![F::one()];
    }

    let radius = (F::GAUSSIAN_TRUNCATE * sigma)
        .ceil()
        .to_usize()
        .unwrap_or(0);
    let size = 2 * radius + 1;
    let mut kernel = vec![F::zero(); size];

    let two_sigma2 = F::from_f64_c(2.0) * sigma * sigma;
    let mut sum = F::zero();

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = F::usize_as(i) - F::usize_as(radius);
        let val = (-(x * x) / two_sigma2).exp();
        *k = val;
        sum += val;
    }

    let inv_sum = F::one() / sum;
    for val in kernel.iter_mut() {
        *val *= inv_sum;
    }

    kernel
}

#[inline(always)]
fn wrap_index(idx: isize, len: usize) -> usize {
    idx.rem_euclid(len as isize) as usize
}

/// Fill `padded` with `lane` extended by `radius` wrapped samples on each side.
/// Kernels wider than the lane wrap around more than once.
#[inline]
fn fill_wrapped_lane<F: DeblurFloat>(lane: ArrayView1<F>, radius: usize, padded: &mut Vec<F>) {
    let n = lane.len();
    padded.clear();
    padded.extend(
        (0..n + 2 * radius).map(|j| lane[wrap_index(j as isize - radius as isize, n)]),
    );
}

/// Convolve every lane running along `along` with a symmetric 1-D kernel.
fn convolve_lanes_periodic<F: DeblurFloat>(
    input: ArrayView2<F>,
    kernel: &[F],
    along: Axis,
) -> Array2<F> {
    let radius = kernel.len() / 2;
    let mut output = Array2::zeros(input.dim());

    let process = |padded: &mut Vec<F>, in_lane: ArrayView1<F>, mut out_lane: ArrayViewMut1<F>| {
        fill_wrapped_lane(in_lane, radius, padded);
        for (i, out) in out_lane.iter_mut().enumerate() {
            *out = padded[i..i + kernel.len()]
                .iter()
                .zip(kernel.iter())
                .map(|(&p, &w)| p * w)
                .sum();
        }
    };

    let in_lanes: Vec<_> = input.lanes(along).into_iter().collect();
    let out_lanes: Vec<_> = output.lanes_mut(along).into_iter().collect();

    if in_lanes.len() >= PARALLEL_LANE_THRESHOLD {
        out_lanes
            .into_par_iter()
            .zip(in_lanes.into_par_iter())
            .for_each_init(Vec::new, |padded, (out_lane, in_lane)| {
                process(padded, in_lane, out_lane)
            });
    } else {
        let mut padded = Vec::new();
        for (out_lane, in_lane) in out_lanes.into_iter().zip(in_lanes) {
            process(&mut padded, in_lane, out_lane);
        }
    }

    output
}

/// Direct 2-D circular convolution with an odd-sized stencil.
fn convolve_stencil_periodic<F: DeblurFloat>(
    input: ArrayView2<F>,
    weights: ArrayView2<F>,
) -> Array2<F> {
    let (rows, cols) = input.dim();
    let (kh, kw) = weights.dim();
    let (rh, rw) = ((kh / 2) as isize, (kw / 2) as isize);

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut sum = F::zero();
        for ((a, b), &w) in weights.indexed_iter() {
            if w == F::zero() {
                continue;
            }
            let src_r = wrap_index(r as isize - (a as isize - rh), rows);
            let src_c = wrap_index(c as isize - (b as isize - rw), cols);
            sum += w * input[[src_r, src_c]];
        }
        sum
    })
}

/// Apply a periodic blur to `image` (the forward operator `A x`).
pub fn apply_periodic_blur<F: DeblurFloat>(
    image: ArrayView2<F>,
    kernel: &KernelSpec<F>,
) -> Result<Array2<F>> {
    ensure_non_empty(image.dim())?;
    kernel.validate()?;

    let blurred = match kernel {
        KernelSpec::Identity => image.to_owned(),
        KernelSpec::Gaussian { sigma } => {
            let taps = gaussian_kernel_1d(*sigma);
            let horizontal = convolve_lanes_periodic(image, &taps, Axis(1));
            convolve_lanes_periodic(horizontal.view(), &taps, Axis(0))
        }
        KernelSpec::Stencil(weights) => convolve_stencil_periodic(image, weights.view()),
    };
    Ok(blurred)
}

/// Embed the kernel into a `rows x cols` grid in FFT order (centre at `(0, 0)`,
/// negative offsets wrapped to the far edge). This is the first column of the
/// BCCB matrix.
pub fn kernel_psf<F: DeblurFloat>(
    kernel: &KernelSpec<F>,
    rows: usize,
    cols: usize,
) -> Result<Array2<F>> {
    ensure_non_empty((rows, cols))?;
    kernel.validate()?;

    let mut psf = Array2::zeros((rows, cols));
    match kernel {
        KernelSpec::Identity => psf[[0, 0]] = F::one(),
        KernelSpec::Gaussian { sigma } => {
            let taps = gaussian_kernel_1d(*sigma);
            let radius = (taps.len() / 2) as isize;
            let mut along_rows = vec![F::zero(); rows];
            let mut along_cols = vec![F::zero(); cols];
            for (k, &w) in taps.iter().enumerate() {
                along_rows[wrap_index(k as isize - radius, rows)] += w;
                along_cols[wrap_index(k as isize - radius, cols)] += w;
            }
            for ((r, c), v) in psf.indexed_iter_mut() {
                *v = along_rows[r] * along_cols[c];
            }
        }
        KernelSpec::Stencil(weights) => {
            let (kh, kw) = weights.dim();
            let (rh, rw) = ((kh / 2) as isize, (kw / 2) as isize);
            for ((a, b), &w) in weights.indexed_iter() {
                let r = wrap_index(a as isize - rh, rows);
                let c = wrap_index(b as isize - rw, cols);
                psf[[r, c]] += w;
            }
        }
    }
    Ok(psf)
}

/// Exact eigenvalues of the blur operator: the unnormalized DFT of its PSF.
///
/// Fails with [`DeblurError::OperatorNotDiagonalizable`] when the eigenvalues
/// are not real (a kernel that is not point-symmetric).
pub fn kernel_eigenvalues<F: DeblurFloat>(
    kernel: &KernelSpec<F>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<F>> {
    kernel_eigenvalues_with_tolerance(kernel, plans, F::default_imag_tolerance())
}

/// [`kernel_eigenvalues`] with an explicit relative tolerance on the imaginary
/// part, measured against `max(1, max |Re|)`.
pub fn kernel_eigenvalues_with_tolerance<F: DeblurFloat>(
    kernel: &KernelSpec<F>,
    plans: &Fft2dPlans<F>,
    imag_tolerance: F,
) -> Result<Array2<F>> {
    if !imag_tolerance.is_finite() || imag_tolerance < F::zero() {
        return Err(DeblurError::InvalidParameter(format!(
            "imag_tolerance must be finite and >= 0, got {}",
            imag_tolerance
        )));
    }
    let (rows, cols) = plans.shape();
    let psf = kernel_psf(kernel, rows, cols)?;
    let spectrum = fft2d_unnormalized(psf.view(), plans)?;

    let max_re = spectrum.iter().fold(F::zero(), |m, c| m.max(c.re.abs()));
    let max_imag = spectrum.iter().fold(F::zero(), |m, c| m.max(c.im.abs()));
    let tolerance = imag_tolerance * max_re.max(F::one());
    if max_imag > tolerance {
        return Err(DeblurError::OperatorNotDiagonalizable {
            max_imag: max_imag.as_f64(),
            tolerance: tolerance.as_f64(),
        });
    }
    Ok(spectrum.mapv(|c| c.re))
}

/// Periodic 5-point discrete Laplacian:
/// `x[i-1,j] + x[i+1,j] + x[i,j-1] + x[i,j+1] - 4 x[i,j]`.
pub fn apply_periodic_laplacian<F: DeblurFloat>(image: ArrayView2<F>) -> Result<Array2<F>> {
    let (rows, cols) = image.dim();
    ensure_non_empty((rows, cols))?;
    let four = F::from_f64_c(4.0);

    Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
        let up = image[[wrap_index(r as isize - 1, rows), c]];
        let down = image[[(r + 1) % rows, c]];
        let left = image[[r, wrap_index(c as isize - 1, cols)]];
        let right = image[[r, (c + 1) % cols]];
        up + down + left + right - four * image[[r, c]]
    }))
}
