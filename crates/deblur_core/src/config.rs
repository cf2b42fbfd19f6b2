//! Configuration for the end-to-end deblurring pipeline.

use crate::error::{DeblurError, Result};
use crate::float_trait::DeblurFloat;
use crate::probe::ProbeConfig;
use crate::regularization::Regularizer;

// =============================================================================
// Constants
// =============================================================================

/// Default Tikhonov weight
const DEFAULT_GAMMA: f64 = 0.01;

/// Default probe seed
const DEFAULT_SEED: u64 = 0;

/// Environment switch for per-stage timing logs
const PROFILE_TIMING_ENV: &str = "DEBLUR_PROFILE_TIMING";

// =============================================================================
// Types
// =============================================================================

/// Where the blur eigenvalues come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EigenvalueSource {
    /// Random probe of the blur operator's action.
    #[default]
    Probe,
    /// Exact DFT of the kernel's point spread function.
    Analytic,
}

/// Configuration for [`crate::pipeline::deblur`].
#[derive(Debug, Clone)]
pub struct DeblurConfig<F: DeblurFloat> {
    /// Tikhonov weight `gamma`. Default: 0.01
    pub gamma: F,
    /// Regularization operator `L`. Default: Laplacian
    pub regularizer: Regularizer,
    /// Source of the blur eigenvalues. Default: Probe
    pub eigenvalue_source: EigenvalueSource,
    /// Probe seed; `None` draws one from OS entropy. Default: Some(0)
    pub seed: Option<u64>,
    /// Relative imaginary-part tolerance for probing and analytic eigenvalues.
    /// Default: precision based
    pub imag_tolerance: Option<F>,
}

impl<F: DeblurFloat> Default for DeblurConfig<F> {
    fn default() -> Self {
        Self {
            gamma: F::from_f64_c(DEFAULT_GAMMA),
            regularizer: Regularizer::default(),
            eigenvalue_source: EigenvalueSource::default(),
            seed: Some(DEFAULT_SEED),
            imag_tolerance: None,
        }
    }
}

impl<F: DeblurFloat> DeblurConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gamma(mut self, gamma: F) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_regularizer(mut self, regularizer: Regularizer) -> Self {
        self.regularizer = regularizer;
        self
    }

    pub fn with_eigenvalue_source(mut self, source: EigenvalueSource) -> Self {
        self.eigenvalue_source = source;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Relative tolerance on imaginary eigenvalue parts, for both the probe and
    /// the analytic kernel spectrum. `None` uses the precision default.
    pub fn with_imag_tolerance(mut self, imag_tolerance: Option<F>) -> Self {
        self.imag_tolerance = imag_tolerance;
        self
    }

    /// Probe settings derived from this configuration.
    pub fn probe_config(&self) -> ProbeConfig<F> {
        ProbeConfig {
            imag_tolerance: self.imag_tolerance,
        }
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.gamma.is_finite() || self.gamma < F::zero() {
            return Err(DeblurError::InvalidParameter(format!(
                "gamma must be finite and >= 0, got {}",
                self.gamma
            )));
        }
        self.probe_config().validate()
    }
}

pub(crate) fn resolve_profile_timing() -> bool {
    std::env::var(PROFILE_TIMING_ENV)
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    let v = value.trim();
    v == "1"
        || v.eq_ignore_ascii_case("true")
        || v.eq_ignore_ascii_case("yes")
        || v.eq_ignore_ascii_case("on")
}
