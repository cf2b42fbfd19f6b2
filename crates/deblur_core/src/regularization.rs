//! Eigenvalues of the Tikhonov regularization operator `L`.
//!
//! The solver penalizes `gamma * ||L x||^2` and only ever needs the Fourier
//! eigenvalues `Pi` of `L` itself; it squares them. All variants below are
//! circulant, so `Pi` is known in closed form and no probing is needed.

use ndarray::Array2;

use crate::error::{ensure_non_empty, Result};
use crate::float_trait::DeblurFloat;

/// Choice of regularization operator `L`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Regularizer {
    /// `L = I`: penalizes `||x||^2`.
    Identity,
    /// `L = sqrt(-Laplacian)`: penalizes gradient energy `||grad x||^2`.
    Gradient,
    /// `L` = periodic 5-point Laplacian: penalizes `||Laplacian x||^2`.
    #[default]
    Laplacian,
}

impl Regularizer {
    /// Lower-case name, as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Regularizer::Identity => "identity",
            Regularizer::Gradient => "gradient",
            Regularizer::Laplacian => "laplacian",
        }
    }
}

/// Eigenvalues of the periodic 5-point Laplacian on a `rows x cols` grid:
/// `2cos(2 pi k / rows) + 2cos(2 pi l / cols) - 4` (all <= 0).
pub fn laplacian_eigenvalues<F: DeblurFloat>(rows: usize, cols: usize) -> Result<Array2<F>> {
    ensure_non_empty((rows, cols))?;
    let two = F::from_f64_c(2.0);
    let four = F::from_f64_c(4.0);
    let two_pi = two * F::PI;

    let row_terms: Vec<F> = (0..rows)
        .map(|k| two * (two_pi * F::usize_as(k) / F::usize_as(rows)).cos())
        .collect();
    let col_terms: Vec<F> = (0..cols)
        .map(|l| two * (two_pi * F::usize_as(l) / F::usize_as(cols)).cos())
        .collect();

    Ok(Array2::from_shape_fn((rows, cols), |(k, l)| {
        row_terms[k] + col_terms[l] - four
    }))
}

/// Eigenvalues `Pi` of the chosen regularization operator.
pub fn regularization_eigenvalues<F: DeblurFloat>(
    kind: Regularizer,
    rows: usize,
    cols: usize,
) -> Result<Array2<F>> {
    ensure_non_empty((rows, cols))?;
    match kind {
        Regularizer::Identity => Ok(Array2::ones((rows, cols))),
        Regularizer::Laplacian => laplacian_eigenvalues(rows, cols),
        // Round-off can leave tiny positive values where the Laplacian is 0.
        Regularizer::Gradient => {
            Ok(laplacian_eigenvalues(rows, cols)?.mapv(|v: F| (-v).max(F::zero()).sqrt()))
        }
    }
}
