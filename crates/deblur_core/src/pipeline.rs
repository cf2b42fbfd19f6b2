//! End-to-end deblurring: eigenvalues, regularizer, solve.
//!
//! Stages:
//! 1. Blur eigenvalues `Lambda`, probed from the blur action or taken from the
//!    kernel's point spread function
//! 2. Regularizer eigenvalues `Pi` in closed form
//! 3. Per-frequency Tikhonov solve
//!
//! Set `DEBLUR_PROFILE_TIMING=1` to log per-stage wall times.

use std::time::Instant;

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{resolve_profile_timing, DeblurConfig, EigenvalueSource};
use crate::error::{ensure_non_empty, Result};
use crate::float_trait::DeblurFloat;
use crate::kernels::{apply_periodic_blur, kernel_eigenvalues_with_tolerance, KernelSpec};
use crate::metrics::add_gaussian_noise;
use crate::probe::probe_with_plans;
use crate::regularization::regularization_eigenvalues;
use crate::solver::CirculantDeconvolver;
use crate::transforms::Fft2dPlans;

fn elapsed_ms(started: Option<Instant>) -> f64 {
    started
        .map(|t| t.elapsed().as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

/// Blur a clean image with `kernel` and add Gaussian noise of std `noise_sigma`.
pub fn simulate_observation<F, R>(
    clean: ArrayView2<F>,
    kernel: &KernelSpec<F>,
    noise_sigma: F,
    rng: &mut R,
) -> Result<Array2<F>>
where
    F: DeblurFloat,
    R: Rng + ?Sized,
{
    let blurred = apply_periodic_blur(clean, kernel)?;
    add_gaussian_noise(blurred.view(), noise_sigma, rng)
}

/// Build a reusable deconvolver for `rows x cols` images blurred by `kernel`.
///
/// `rng` is only consumed when `config.eigenvalue_source` is `Probe`.
pub fn build_deconvolver<F, R>(
    kernel: &KernelSpec<F>,
    rows: usize,
    cols: usize,
    config: &DeblurConfig<F>,
    rng: &mut R,
) -> Result<CirculantDeconvolver<F>>
where
    F: DeblurFloat,
    R: Rng + ?Sized,
{
    config.validate()?;
    kernel.validate()?;
    ensure_non_empty((rows, cols))?;

    let profile_timing = resolve_profile_timing();
    let plans = Fft2dPlans::new(rows, cols)?;

    let started = profile_timing.then(Instant::now);
    let lambda = match config.eigenvalue_source {
        EigenvalueSource::Probe => probe_with_plans(
            |x| apply_periodic_blur(x, kernel),
            &plans,
            rng,
            &config.probe_config(),
        )?,
        EigenvalueSource::Analytic => {
            kernel_eigenvalues_with_tolerance(kernel, &plans, config.probe_config().tolerance())?
        }
    };
    let eigen_ms = elapsed_ms(started);

    let started = profile_timing.then(Instant::now);
    let pi = regularization_eigenvalues(config.regularizer, rows, cols)?;
    let reg_ms = elapsed_ms(started);

    if profile_timing {
        info!(
            "deblur_profile size={}x{} source={:?} regularizer={} eigenvalues_ms={:.3} regularizer_ms={:.3}",
            rows,
            cols,
            config.eigenvalue_source,
            config.regularizer.name(),
            eigen_ms,
            reg_ms
        );
    }

    CirculantDeconvolver::with_plans(plans, lambda, pi)
}

/// Deblur `observed` using an explicit random source for probing.
pub fn deblur_with_rng<F, R>(
    observed: ArrayView2<F>,
    kernel: &KernelSpec<F>,
    config: &DeblurConfig<F>,
    rng: &mut R,
) -> Result<Array2<F>>
where
    F: DeblurFloat,
    R: Rng + ?Sized,
{
    let (rows, cols) = observed.dim();
    let deconv = build_deconvolver(kernel, rows, cols, config, rng)?;

    let started = resolve_profile_timing().then(Instant::now);
    let restored = deconv.solve(observed, config.gamma)?;
    if started.is_some() {
        info!("deblur_profile solve_ms={:.3}", elapsed_ms(started));
    }
    debug!(
        "deblurred {}x{} image with gamma={} regularizer={}",
        rows,
        cols,
        config.gamma,
        config.regularizer.name()
    );
    Ok(restored)
}

/// Deblur `observed`, seeding the probe from `config.seed`.
///
/// # Example
///
/// ```
/// use deblur_core::{deblur, DeblurConfig, KernelSpec};
/// use ndarray::Array2;
///
/// let observed = Array2::<f64>::from_elem((16, 16), 0.5);
/// let kernel = KernelSpec::Gaussian { sigma: 1.0 };
/// let restored = deblur(observed.view(), &kernel, &DeblurConfig::default()).unwrap();
/// assert_eq!(restored.dim(), (16, 16));
/// ```
pub fn deblur<F: DeblurFloat>(
    observed: ArrayView2<F>,
    kernel: &KernelSpec<F>,
    config: &DeblurConfig<F>,
) -> Result<Array2<F>> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    deblur_with_rng(observed, kernel, config, &mut rng)
}
