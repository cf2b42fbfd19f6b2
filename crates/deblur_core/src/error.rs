//! Error type shared by all deconvolution routines.

/// Errors raised by the deconvolution pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeblurError {
    /// Two grids that must share a shape do not.
    #[error("{what}: expected shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// The probed operator is not diagonal in the 2-D Fourier basis
    /// (or its eigenvalues are not real).
    #[error(
        "operator is not diagonalizable by the 2-D DFT with real eigenvalues: \
         max |imag| = {max_imag:e} exceeds tolerance {tolerance:e}"
    )]
    OperatorNotDiagonalizable { max_imag: f64, tolerance: f64 },
    /// A grid has zero rows or zero columns.
    #[error("image must have at least one row and one column")]
    EmptyImage,
    /// A scalar or kernel parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A caller-supplied operator failed.
    #[error("operator application failed: {0}")]
    Operator(String),
}

pub type Result<T> = std::result::Result<T, DeblurError>;

/// Fail with [`DeblurError::ShapeMismatch`] unless `found == expected`.
pub(crate) fn ensure_shape(
    what: &'static str,
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<()> {
    if expected != found {
        return Err(DeblurError::ShapeMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Fail with [`DeblurError::EmptyImage`] if either dimension is zero.
pub(crate) fn ensure_non_empty(shape: (usize, usize)) -> Result<()> {
    if shape.0 == 0 || shape.1 == 0 {
        return Err(DeblurError::EmptyImage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = ensure_shape("eigenvalues", (4, 4), (4, 5)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "eigenvalues: expected shape (4, 4), found (4, 5)"
        );
    }

    #[test]
    fn test_matching_shapes_pass() {
        assert!(ensure_shape("observed", (3, 7), (3, 7)).is_ok());
        assert!(ensure_non_empty((1, 1)).is_ok());
    }

    #[test]
    fn test_empty_shapes_rejected() {
        assert_eq!(ensure_non_empty((0, 8)), Err(DeblurError::EmptyImage));
        assert_eq!(ensure_non_empty((8, 0)), Err(DeblurError::EmptyImage));
    }
}
