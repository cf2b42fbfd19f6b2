//! Eigenvalue probing for operators known to be diagonal in the Fourier basis.
//!
//! If `A = F* diag(lambda) F` with `F` the unitary 2-D DFT, then for any `v`
//! with no zero entries `F A F* v = lambda .* v`, so one random `v` and one
//! application of `A` recover every eigenvalue. This is not a general
//! eigensolver: operators that are not circulant produce a complex ratio,
//! which is rejected rather than silently truncated.
//!
//! Entries of `v` close to zero amplify floating-point error in the ratio.
//! Exact zeros have probability zero for a continuous draw; small entries are
//! counted and logged but not corrected. The non-circulant check runs on
//! `Im(w)` relative to `max |w|`, which small entries do not inflate.

use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::num_complex::Complex;

use crate::error::{ensure_non_empty, ensure_shape, DeblurError, Result};
use crate::float_trait::DeblurFloat;
use crate::transforms::{fft2d_ortho_complex, ifft2d_ortho, Fft2dPlans};

/// Settings for [`estimate_operator_eigenvalues`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeConfig<F: DeblurFloat> {
    /// Largest accepted `max |Im(w)|` relative to `max |w|`, where
    /// `w = FFT2(A(IFFT2(v)))` for the real random vector `v`.
    /// `None` uses `F::default_imag_tolerance()`.
    pub imag_tolerance: Option<F>,
}

impl<F: DeblurFloat> Default for ProbeConfig<F> {
    fn default() -> Self {
        Self {
            imag_tolerance: None,
        }
    }
}

impl<F: DeblurFloat> ProbeConfig<F> {
    /// Resolved relative tolerance on the imaginary part.
    pub fn tolerance(&self) -> F {
        self.imag_tolerance.unwrap_or_else(F::default_imag_tolerance)
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        let tol = self.tolerance();
        if !tol.is_finite() || tol < F::zero() {
            return Err(DeblurError::InvalidParameter(format!(
                "imag_tolerance must be finite and >= 0, got {}",
                tol
            )));
        }
        Ok(())
    }
}

/// Estimate the Fourier eigenvalues of a periodic operator from its action.
///
/// `apply` maps a `rows x cols` image to its transformed image. Randomness
/// comes only from `rng`, so a seeded generator gives reproducible output.
pub fn estimate_operator_eigenvalues<F, Op, R>(
    mut apply: Op,
    rows: usize,
    cols: usize,
    rng: &mut R,
    config: &ProbeConfig<F>,
) -> Result<Array2<F>>
where
    F: DeblurFloat,
    Op: FnMut(ArrayView2<F>) -> Array2<F>,
    R: Rng + ?Sized,
{
    try_estimate_operator_eigenvalues(|x| Ok(apply(x)), rows, cols, rng, config)
}

/// Like [`estimate_operator_eigenvalues`], for operators that can fail.
pub fn try_estimate_operator_eigenvalues<F, Op, R>(
    apply: Op,
    rows: usize,
    cols: usize,
    rng: &mut R,
    config: &ProbeConfig<F>,
) -> Result<Array2<F>>
where
    F: DeblurFloat,
    Op: FnMut(ArrayView2<F>) -> Result<Array2<F>>,
    R: Rng + ?Sized,
{
    let plans = Fft2dPlans::new(rows, cols)?;
    probe_with_plans(apply, &plans, rng, config)
}

/// Probe using existing FFT plans; the grid shape is taken from `plans`.
pub fn probe_with_plans<F, Op, R>(
    mut apply: Op,
    plans: &Fft2dPlans<F>,
    rng: &mut R,
    config: &ProbeConfig<F>,
) -> Result<Array2<F>>
where
    F: DeblurFloat,
    Op: FnMut(ArrayView2<F>) -> Result<Array2<F>>,
    R: Rng + ?Sized,
{
    config.validate()?;
    let shape = plans.shape();
    ensure_non_empty(shape)?;

    let v: Array2<F> =
        Array2::from_shape_fn(shape, |_| F::from_f64_c(rng.sample::<f64, _>(StandardNormal)));
    let v_complex = v.mapv(|x| Complex::new(x, F::zero()));
    let u = ifft2d_ortho(v_complex.view(), plans)?;

    // A is real-linear, so A(u) = A(Re u) + i A(Im u).
    let applied_re = apply(u.mapv(|c| c.re).view())?;
    ensure_shape("operator output", shape, applied_re.dim())?;
    let applied_im = apply(u.mapv(|c| c.im).view())?;
    ensure_shape("operator output", shape, applied_im.dim())?;

    let mut applied = Array2::from_elem(shape, Complex::new(F::zero(), F::zero()));
    Zip::from(&mut applied)
        .and(&applied_re)
        .and(&applied_im)
        .for_each(|out, &re, &im| *out = Complex::new(re, im));

    let w = fft2d_ortho_complex(applied.view(), plans)?;

    let mut ratio = Array2::from_elem(shape, Complex::new(F::zero(), F::zero()));
    Zip::from(&mut ratio)
        .and(&w)
        .and(&v)
        .for_each(|out, &wk, &vk| *out = wk / vk);

    // v is real, so |Im(ratio_k)| * |v_k| = |Im(w_k)|. Checking w keeps small
    // probe entries from inflating round-off in the residual.
    let max_w = w.iter().fold(F::zero(), |m, c| m.max(c.norm()));
    let max_imag = w.iter().fold(F::zero(), |m, c| m.max(c.im.abs()));
    let tolerance = config.tolerance() * max_w;

    let small_threshold = F::epsilon().sqrt();
    let small_entries = v.iter().filter(|x| x.abs() < small_threshold).count();
    debug!(
        "eigenvalue probe {}x{}: max|w|={:.3e} max|im w|={:.3e} tol={:.3e} small_probe_entries={}",
        shape.0,
        shape.1,
        max_w.as_f64(),
        max_imag.as_f64(),
        tolerance.as_f64(),
        small_entries
    );

    if max_imag.is_nan() || max_imag > tolerance {
        return Err(DeblurError::OperatorNotDiagonalizable {
            max_imag: max_imag.as_f64(),
            tolerance: tolerance.as_f64(),
        });
    }

    Ok(ratio.mapv(|c| c.re))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{
        apply_periodic_blur, apply_periodic_laplacian, kernel_eigenvalues, KernelSpec,
    };
    use crate::regularization::laplacian_eigenvalues;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f64, f64::max)
    }

    #[test]
    fn test_identity_probe_is_all_ones() {
        for seed in [0u64, 1, 42, 7919] {
            let mut rng = StdRng::seed_from_u64(seed);
            let eig = estimate_operator_eigenvalues(
                |x: ArrayView2<f64>| x.to_owned(),
                8,
                12,
                &mut rng,
                &ProbeConfig::default(),
            )
            .unwrap();
            assert!(
                eig.iter().all(|&v| (v - 1.0).abs() < 1e-9),
                "seed {} gave non-unit eigenvalues",
                seed
            );
        }
    }

    #[test]
    fn test_three_tap_kernel_matches_analytic() {
        let (rows, cols) = (16, 16);
        let kernel = KernelSpec::Stencil(array![[0.1, 0.8, 0.1]]);
        let mut rng = StdRng::seed_from_u64(3);
        let eig = try_estimate_operator_eigenvalues(
            |x| apply_periodic_blur(x, &kernel),
            rows,
            cols,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap();

        for ((_, l), &v) in eig.indexed_iter() {
            let expected = 0.8 + 0.2 * (2.0 * std::f64::consts::PI * l as f64 / cols as f64).cos();
            assert!((v - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gaussian_probe_matches_psf_spectrum() {
        let (rows, cols) = (32, 24);
        let kernel = KernelSpec::Gaussian { sigma: 2.0 };
        let plans = Fft2dPlans::new(rows, cols).unwrap();
        let exact = kernel_eigenvalues(&kernel, &plans).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let probed = probe_with_plans(
            |x| apply_periodic_blur(x, &kernel),
            &plans,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap();
        assert!(max_abs_diff(&exact, &probed) < 1e-9);
    }

    #[test]
    fn test_laplacian_probe_matches_closed_form() {
        let mut rng = StdRng::seed_from_u64(5);
        let probed = try_estimate_operator_eigenvalues(
            apply_periodic_laplacian,
            10,
            14,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap();
        let exact = laplacian_eigenvalues::<f64>(10, 14).unwrap();
        assert!(max_abs_diff(&exact, &probed) < 1e-9);
    }

    #[test]
    fn test_different_seeds_agree() {
        let kernel = KernelSpec::Gaussian { sigma: 5.0 };
        let probe = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            try_estimate_operator_eigenvalues(
                |x| apply_periodic_blur(x, &kernel),
                64,
                64,
                &mut rng,
                &ProbeConfig::default(),
            )
            .unwrap()
        };
        let a = probe(1);
        let b = probe(2);
        assert!(max_abs_diff(&a, &b) < 1e-8);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let kernel = KernelSpec::Gaussian { sigma: 1.0 };
        let run = || {
            let mut rng = StdRng::seed_from_u64(99);
            try_estimate_operator_eigenvalues(
                |x| apply_periodic_blur(x, &kernel),
                8,
                8,
                &mut rng,
                &ProbeConfig::default(),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_circular_shift_has_complex_eigenvalues() {
        // Circulant, but not symmetric: eigenvalues exp(-2 pi i l / N) are complex.
        let mut rng = StdRng::seed_from_u64(0);
        let err = estimate_operator_eigenvalues(
            |x: ArrayView2<f64>| {
                let cols = x.ncols();
                Array2::from_shape_fn(x.dim(), |(r, c)| x[[r, (c + cols - 1) % cols]])
            },
            8,
            8,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeblurError::OperatorNotDiagonalizable { .. }));
    }

    #[test]
    fn test_shift_variant_mask_is_not_diagonalizable() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = estimate_operator_eigenvalues(
            |x: ArrayView2<f64>| {
                Array2::from_shape_fn(x.dim(), |(r, c)| x[[r, c]] * (1.0 + r as f64))
            },
            8,
            8,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeblurError::OperatorNotDiagonalizable { .. }));
    }

    #[test]
    fn test_operator_output_shape_checked() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = estimate_operator_eigenvalues(
            |_: ArrayView2<f64>| Array2::zeros((4, 4)),
            8,
            8,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeblurError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_operator_error_propagates() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = try_estimate_operator_eigenvalues(
            |_: ArrayView2<f64>| Err(DeblurError::Operator("boom".to_string())),
            4,
            4,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, DeblurError::Operator("boom".to_string()));
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = ProbeConfig {
            imag_tolerance: Some(-1.0),
        };
        let err = estimate_operator_eigenvalues(
            |x: ArrayView2<f64>| x.to_owned(),
            4,
            4,
            &mut rng,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, DeblurError::InvalidParameter(_)));
    }

    fn fraction_off_by<F: DeblurFloat>(a: &Array2<F>, b: &Array2<F>, tol: F) -> f64 {
        let off = a
            .iter()
            .zip(b.iter())
            .filter(|(x, y)| (**x - **y).abs() > tol)
            .count();
        off as f64 / a.len() as f64
    }

    #[test]
    fn test_f32_large_grids_accept_circulant_operators() {
        // Near-zero entries of v become common on large grids and must not cause rejection.
        let kernel = KernelSpec::Gaussian { sigma: 2.0f32 };
        for n in [128usize, 256] {
            let plans = Fft2dPlans::<f32>::new(n, n).unwrap();
            let exact = kernel_eigenvalues(&kernel, &plans).unwrap();
            let ones = Array2::<f32>::ones((n, n));
            for seed in 0..5u64 {
                let mut rng = StdRng::seed_from_u64(seed);
                let identity = estimate_operator_eigenvalues(
                    |x: ArrayView2<f32>| x.to_owned(),
                    n,
                    n,
                    &mut rng,
                    &ProbeConfig::default(),
                )
                .unwrap_or_else(|e| panic!("identity n={} seed={}: {}", n, seed, e));
                assert!(fraction_off_by(&identity, &ones, 1e-3) < 0.01);

                let mut rng = StdRng::seed_from_u64(seed);
                let blur = try_estimate_operator_eigenvalues(
                    |x| apply_periodic_blur(x, &kernel),
                    n,
                    n,
                    &mut rng,
                    &ProbeConfig::default(),
                )
                .unwrap_or_else(|e| panic!("gaussian n={} seed={}: {}", n, seed, e));
                assert!(fraction_off_by(&blur, &exact, 1e-3) < 0.01);
            }
        }
    }

    #[test]
    fn test_f32_shift_still_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = estimate_operator_eigenvalues(
            |x: ArrayView2<f32>| {
                let cols = x.ncols();
                Array2::from_shape_fn(x.dim(), |(r, c)| x[[r, (c + cols - 1) % cols]])
            },
            128,
            128,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeblurError::OperatorNotDiagonalizable { .. }));
    }

    #[test]
    fn test_f32_identity_probe() {
        let mut rng = StdRng::seed_from_u64(17);
        let eig = estimate_operator_eigenvalues(
            |x: ArrayView2<f32>| x.to_owned(),
            8,
            8,
            &mut rng,
            &ProbeConfig::default(),
        )
        .unwrap();
        assert!(eig.iter().all(|&v| (v - 1.0).abs() < 1e-3));
    }
}
