//! Float trait abstraction for f32/f64 support.
//!
//! Every numerical routine in this crate is generic over [`DeblurFloat`], so the
//! same deconvolution code runs in single or double precision.

use num_traits::{Float, FromPrimitive, NumAssign};
use rustfft::FftNum;
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Floating point types supported by the deconvolution routines.
///
/// Combines the bounds needed across the crate:
/// - Basic float operations (Float, NumAssign)
/// - FFT compatibility (FftNum from rustfft)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Debug/Display for error messages and logs
pub trait DeblurFloat:
    Float + FftNum + FromPrimitive + NumAssign + Sum + Debug + Display + Send + Sync + 'static
{
    /// The constant PI for this float type.
    const PI: Self;

    /// Gaussian truncation factor (4.0), matching scipy's `truncate` default.
    const GAUSSIAN_TRUNCATE: Self;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Create a value from an isize constant.
    fn isize_as(val: isize) -> Self;

    /// Lossless (f64) or widening (f32) conversion for logging and metrics.
    fn as_f64(self) -> f64;

    /// Default tolerance on the imaginary part of probed eigenvalues: sqrt(eps).
    fn default_imag_tolerance() -> Self {
        Self::epsilon().sqrt()
    }
}

impl DeblurFloat for f32 {
    const PI: Self = std::f32::consts::PI;
    const GAUSSIAN_TRUNCATE: Self = 4.0;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl DeblurFloat for f64 {
    const PI: Self = std::f64::consts::PI;
    const GAUSSIAN_TRUNCATE: Self = 4.0;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_trait_impl() {
        let val: f32 = DeblurFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f32::consts::PI).abs() < 1e-5);

        let usize_val: f32 = DeblurFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f32);

        let isize_val: f32 = DeblurFloat::isize_as(-5);
        assert_eq!(isize_val, -5.0f32);
    }

    #[test]
    fn test_f64_trait_impl() {
        let val: f64 = DeblurFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f64::consts::PI).abs() < 1e-14);
        assert_eq!(DeblurFloat::as_f64(2.5f64), 2.5);
    }

    #[test]
    fn test_default_imag_tolerance_scales_with_precision() {
        let tol32 = f32::default_imag_tolerance();
        let tol64 = f64::default_imag_tolerance();
        assert!((tol32 - f32::EPSILON.sqrt()).abs() < 1e-12);
        assert!((tol64 - f64::EPSILON.sqrt()).abs() < 1e-20);
        assert!((tol32 as f64) > tol64);
    }

    #[test]
    fn test_gaussian_truncate() {
        assert_eq!(f32::GAUSSIAN_TRUNCATE, 4.0f32);
        assert_eq!(f64::GAUSSIAN_TRUNCATE, 4.0f64);
    }
}
