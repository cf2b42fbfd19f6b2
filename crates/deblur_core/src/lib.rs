//! Circulant Deconvolution Core Library
//!
//! Pure Rust Tikhonov-regularized deblurring for images under periodic (wrap)
//! boundary conditions. Blur and regularization operators are block-circulant
//! with circulant blocks, so the unitary 2-D DFT diagonalizes both and the
//! regularized least-squares problem is solved independently per frequency.
//! This crate contains all numerical logic without CLI or Python bindings.

pub mod config;
pub mod error;
pub mod float_trait;
pub mod kernels;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod regularization;
pub mod solver;
pub mod transforms;

// Re-export commonly used types at the crate root
pub use config::{DeblurConfig, EigenvalueSource};
pub use error::{DeblurError, Result};
pub use float_trait::DeblurFloat;
pub use kernels::{
    apply_periodic_blur, apply_periodic_laplacian, kernel_eigenvalues,
    kernel_eigenvalues_with_tolerance, kernel_psf, KernelSpec,
};
pub use metrics::{add_gaussian_noise, gradient_energy, psnr, relative_error};
pub use pipeline::{build_deconvolver, deblur, deblur_with_rng, simulate_observation};
pub use probe::{estimate_operator_eigenvalues, try_estimate_operator_eigenvalues, ProbeConfig};
pub use regularization::{laplacian_eigenvalues, regularization_eigenvalues, Regularizer};
pub use solver::{solve_regularized, CirculantDeconvolver};
pub use transforms::{fft2d_ortho, ifft2d_ortho, ifft2d_ortho_real, Fft2dPlans};
