//! 2-D discrete Fourier transforms on full image grids.
//!
//! All transforms here are separable: a 1-D FFT over every row followed by a
//! 1-D FFT over every column, using plans computed once per grid shape.
//! The `_ortho` variants use unitary scaling (`1/sqrt(rows*cols)` on both the
//! forward and inverse transform), which is what the eigenvalue probe and the
//! regularized solver assume.

use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{ensure_non_empty, ensure_shape, Result};
use crate::float_trait::DeblurFloat;

// =============================================================================
// Constants for Transform Operations
// =============================================================================

/// Minimum number of lanes (rows or columns) before a pass runs on rayon.
const PARALLEL_LANE_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

/// Pre-computed FFT plans for one grid shape.
///
/// Planning is the expensive part of rustfft; a deconvolver keeps one of these
/// and reuses it for every transform of the same shape.
pub struct Fft2dPlans<F: DeblurFloat> {
    rows: usize,
    cols: usize,
    fft_row: Arc<dyn Fft<F>>,
    fft_col: Arc<dyn Fft<F>>,
    ifft_row: Arc<dyn Fft<F>>,
    ifft_col: Arc<dyn Fft<F>>,
}

impl<F: DeblurFloat> Fft2dPlans<F> {
    /// Plan forward and inverse transforms for a `rows x cols` grid.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        ensure_non_empty((rows, cols))?;
        let mut planner = FftPlanner::new();
        Ok(Self {
            rows,
            cols,
            fft_row: planner.plan_fft_forward(cols),
            fft_col: planner.plan_fft_forward(rows),
            ifft_row: planner.plan_fft_inverse(cols),
            ifft_col: planner.plan_fft_inverse(rows),
        })
    }

    /// Grid shape these plans were built for, as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn ortho_scale(&self) -> F {
        F::one() / F::usize_as(self.rows * self.cols).sqrt()
    }

    fn transform_in_place(&self, data: &mut Array2<Complex<F>>, direction: Direction) {
        let (row_plan, col_plan) = match direction {
            Direction::Forward => (&self.fft_row, &self.fft_col),
            Direction::Inverse => (&self.ifft_row, &self.ifft_col),
        };
        // Rows are lanes along Axis(1); columns are lanes along Axis(0).
        transform_lanes(data.lanes_mut(Axis(1)).into_iter().collect(), row_plan);
        transform_lanes(data.lanes_mut(Axis(0)).into_iter().collect(), col_plan);
    }
}

/// Run a 1-D FFT over each lane, copying through a contiguous buffer.
fn transform_lanes<F: DeblurFloat>(
    lanes: Vec<ArrayViewMut1<'_, Complex<F>>>,
    plan: &Arc<dyn Fft<F>>,
) {
    let len = plan.len();
    let run = |buffer: &mut Vec<Complex<F>>, mut lane: ArrayViewMut1<'_, Complex<F>>| {
        buffer.clear();
        buffer.extend(lane.iter().copied());
        plan.process(buffer);
        for (dst, &src) in lane.iter_mut().zip(buffer.iter()) {
            *dst = src;
        }
    };

    if lanes.len() >= PARALLEL_LANE_THRESHOLD {
        lanes
            .into_par_iter()
            .for_each_init(|| Vec::with_capacity(len), |buffer, lane| run(buffer, lane));
    } else {
        let mut buffer = Vec::with_capacity(len);
        for lane in lanes {
            run(&mut buffer, lane);
        }
    }
}

fn to_complex<F: DeblurFloat>(input: ArrayView2<F>) -> Array2<Complex<F>> {
    input.mapv(|v| Complex::new(v, F::zero()))
}

/// Unitary 2-D FFT of a real grid.
pub fn fft2d_ortho<F: DeblurFloat>(
    input: ArrayView2<F>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<Complex<F>>> {
    ensure_shape("fft2d input", plans.shape(), input.dim())?;
    let mut data = to_complex(input);
    plans.transform_in_place(&mut data, Direction::Forward);
    let scale = plans.ortho_scale();
    data.mapv_inplace(|c| c * scale);
    Ok(data)
}

/// Unitary 2-D FFT of a complex grid.
pub fn fft2d_ortho_complex<F: DeblurFloat>(
    input: ArrayView2<Complex<F>>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<Complex<F>>> {
    ensure_shape("fft2d input", plans.shape(), input.dim())?;
    let mut data = input.to_owned();
    plans.transform_in_place(&mut data, Direction::Forward);
    let scale = plans.ortho_scale();
    data.mapv_inplace(|c| c * scale);
    Ok(data)
}

/// Unitary 2-D inverse FFT, keeping the complex result.
pub fn ifft2d_ortho<F: DeblurFloat>(
    input: ArrayView2<Complex<F>>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<Complex<F>>> {
    ensure_shape("ifft2d input", plans.shape(), input.dim())?;
    let mut data = input.to_owned();
    plans.transform_in_place(&mut data, Direction::Inverse);
    let scale = plans.ortho_scale();
    data.mapv_inplace(|c| c * scale);
    Ok(data)
}

/// Unitary 2-D inverse FFT, returning only the real part.
pub fn ifft2d_ortho_real<F: DeblurFloat>(
    input: ArrayView2<Complex<F>>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<F>> {
    Ok(ifft2d_ortho(input, plans)?.mapv(|c| c.re))
}

/// Unnormalized 2-D FFT of a real grid (sum convention, no scaling).
///
/// The DFT of a point-spread function laid out in FFT order is exactly the
/// eigenvalue grid of the corresponding periodic convolution.
pub fn fft2d_unnormalized<F: DeblurFloat>(
    input: ArrayView2<F>,
    plans: &Fft2dPlans<F>,
) -> Result<Array2<Complex<F>>> {
    ensure_shape("fft2d input", plans.shape(), input.dim())?;
    let mut data = to_complex(input);
    plans.transform_in_place(&mut data, Direction::Forward);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeblurError;

    // Helper: Simple Linear Congruential Generator for deterministic "random" test data
    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_f64(&mut self) -> f64 {
            // LCG parameters from Numerical Recipes
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((self.state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        }
    }

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = SimpleLcg::new(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.next_f64())
    }

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f64, f64::max)
    }

    #[test]
    fn test_ortho_roundtrip_various_sizes() {
        let sizes = [(1, 1), (4, 4), (8, 8), (5, 7), (16, 3), (32, 64)];

        for (rows, cols) in sizes {
            let input = random_matrix(rows, cols, (rows * 1000 + cols) as u64);
            let plans = Fft2dPlans::new(rows, cols).unwrap();

            let freq = fft2d_ortho(input.view(), &plans).unwrap();
            let output = ifft2d_ortho_real(freq.view(), &plans).unwrap();

            let diff = max_abs_diff(&input, &output);
            assert!(
                diff < 1e-12,
                "ortho roundtrip failed for {}x{}: max diff = {}",
                rows,
                cols,
                diff
            );
        }
    }

    #[test]
    fn test_ortho_constant_has_only_dc() {
        // All ones on 8x8: unitary DC = 64 / sqrt(64) = 8
        let input = Array2::<f64>::ones((8, 8));
        let plans = Fft2dPlans::new(8, 8).unwrap();
        let output = fft2d_ortho(input.view(), &plans).unwrap();

        assert!((output[[0, 0]].re - 8.0).abs() < 1e-12);
        for ((r, c), val) in output.indexed_iter() {
            if r != 0 || c != 0 {
                assert!(
                    val.norm() < 1e-12,
                    "Non-DC component [{},{}] should be ~0, got {}",
                    r,
                    c,
                    val.norm()
                );
            }
        }
    }

    #[test]
    fn test_unnormalized_impulse_is_flat() {
        let mut input = Array2::<f64>::zeros((6, 10));
        input[[0, 0]] = 1.0;
        let plans = Fft2dPlans::new(6, 10).unwrap();
        let output = fft2d_unnormalized(input.view(), &plans).unwrap();

        for val in output.iter() {
            assert!((val.re - 1.0).abs() < 1e-12 && val.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_ortho_parseval() {
        // Unitary transform preserves energy exactly.
        let input = random_matrix(12, 20, 42);
        let plans = Fft2dPlans::new(12, 20).unwrap();
        let output = fft2d_ortho(input.view(), &plans).unwrap();

        let energy_spatial: f64 = input.iter().map(|x| x * x).sum();
        let energy_freq: f64 = output.iter().map(|x| x.norm_sqr()).sum();
        assert!(
            (energy_spatial - energy_freq).abs() / energy_spatial < 1e-12,
            "Parseval violated: spatial={}, freq={}",
            energy_spatial,
            energy_freq
        );
    }

    #[test]
    fn test_complex_roundtrip_keeps_imaginary_part() {
        let re = random_matrix(9, 9, 7);
        let im = random_matrix(9, 9, 8);
        let input = Array2::from_shape_fn((9, 9), |(r, c)| Complex::new(re[[r, c]], im[[r, c]]));
        let plans = Fft2dPlans::new(9, 9).unwrap();

        let freq = fft2d_ortho_complex(input.view(), &plans).unwrap();
        let back = ifft2d_ortho(freq.view(), &plans).unwrap();

        for (a, b) in input.iter().zip(back.iter()) {
            assert!((*a - *b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_parallel_path_matches_roundtrip() {
        // 300 rows crosses PARALLEL_LANE_THRESHOLD for the row pass.
        let input = random_matrix(300, 24, 99);
        let plans = Fft2dPlans::new(300, 24).unwrap();
        let freq = fft2d_ortho(input.view(), &plans).unwrap();
        let output = ifft2d_ortho_real(freq.view(), &plans).unwrap();
        assert!(max_abs_diff(&input, &output) < 1e-12);
    }

    #[test]
    fn test_f32_roundtrip() {
        let input = random_matrix(16, 16, 5).mapv(|v| v as f32);
        let plans = Fft2dPlans::<f32>::new(16, 16).unwrap();
        let freq = fft2d_ortho(input.view(), &plans).unwrap();
        let output = ifft2d_ortho_real(freq.view(), &plans).unwrap();
        for (a, b) in input.iter().zip(output.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shape_checked_against_plans() {
        let plans = Fft2dPlans::<f64>::new(8, 8).unwrap();
        let input = Array2::<f64>::zeros((8, 4));
        let err = fft2d_ortho(input.view(), &plans).unwrap_err();
        assert!(matches!(err, DeblurError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_plans_rejected() {
        assert!(matches!(
            Fft2dPlans::<f64>::new(0, 4),
            Err(DeblurError::EmptyImage)
        ));
    }
}
