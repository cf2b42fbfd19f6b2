//! PyO3 Python bindings for circulant deconvolution.
//!
//! Thin wrappers over deblur_core; this crate only handles Python/NumPy type
//! conversions. All arrays are float64.

use std::cell::RefCell;

use numpy::{PyArray2, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use deblur_core::{
    apply_periodic_blur, deblur, kernel_eigenvalues, try_estimate_operator_eigenvalues,
    DeblurConfig, DeblurError, EigenvalueSource, Fft2dPlans, KernelSpec, ProbeConfig,
    Regularizer,
};

fn value_error(e: DeblurError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_regularizer(name: &str) -> PyResult<Regularizer> {
    match name.to_ascii_lowercase().as_str() {
        "identity" => Ok(Regularizer::Identity),
        "gradient" => Ok(Regularizer::Gradient),
        "laplacian" => Ok(Regularizer::Laplacian),
        other => Err(PyValueError::new_err(format!(
            "unknown regularizer '{}'; expected identity, gradient or laplacian",
            other
        ))),
    }
}

fn parse_source(name: &str) -> PyResult<EigenvalueSource> {
    match name.to_ascii_lowercase().as_str() {
        "probe" => Ok(EigenvalueSource::Probe),
        "analytic" => Ok(EigenvalueSource::Analytic),
        other => Err(PyValueError::new_err(format!(
            "unknown eigenvalue source '{}'; expected probe or analytic",
            other
        ))),
    }
}

/// Blur an image with a periodic (wrap) Gaussian kernel.
#[pyfunction]
pub fn periodic_gaussian_blur<'py>(
    py: Python<'py>,
    image: PyReadonlyArray2<f64>,
    sigma: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let output =
        apply_periodic_blur(image.as_array(), &KernelSpec::Gaussian { sigma }).map_err(value_error)?;
    Ok(output.to_pyarray(py))
}

/// Exact Fourier eigenvalues of the periodic Gaussian blur.
#[pyfunction]
pub fn gaussian_eigenvalues<'py>(
    py: Python<'py>,
    rows: usize,
    cols: usize,
    sigma: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let plans = Fft2dPlans::new(rows, cols).map_err(value_error)?;
    let eig = kernel_eigenvalues(&KernelSpec::Gaussian { sigma }, &plans).map_err(value_error)?;
    Ok(eig.to_pyarray(py))
}

/// Eigenvalues of the periodic 5-point Laplacian.
#[pyfunction]
pub fn laplacian_eigenvalues<'py>(
    py: Python<'py>,
    rows: usize,
    cols: usize,
) -> PyResult<&'py PyArray2<f64>> {
    let eig = deblur_core::laplacian_eigenvalues::<f64>(rows, cols).map_err(value_error)?;
    Ok(eig.to_pyarray(py))
}

/// Eigenvalues of a named regularization operator.
#[pyfunction]
#[pyo3(signature = (rows, cols, regularizer="laplacian"))]
pub fn regularization_eigenvalues<'py>(
    py: Python<'py>,
    rows: usize,
    cols: usize,
    regularizer: &str,
) -> PyResult<&'py PyArray2<f64>> {
    let kind = parse_regularizer(regularizer)?;
    let eig = deblur_core::regularization_eigenvalues::<f64>(kind, rows, cols)
        .map_err(value_error)?;
    Ok(eig.to_pyarray(py))
}

/// Probe the Fourier eigenvalues of a Python callable `operator(image) -> image`.
///
/// Exceptions raised by `operator` propagate unchanged.
#[pyfunction]
#[pyo3(signature = (operator, rows, cols, seed=0, imag_tolerance=None))]
pub fn estimate_operator_eigenvalues<'py>(
    py: Python<'py>,
    operator: &'py PyAny,
    rows: usize,
    cols: usize,
    seed: u64,
    imag_tolerance: Option<f64>,
) -> PyResult<&'py PyArray2<f64>> {
    let callback_error: RefCell<Option<PyErr>> = RefCell::new(None);
    let mut rng = StdRng::seed_from_u64(seed);
    let config = ProbeConfig { imag_tolerance };

    let result = try_estimate_operator_eigenvalues(
        |x| {
            let call = || -> PyResult<ndarray::Array2<f64>> {
                let out = operator.call1((x.to_pyarray(py),))?;
                let arr: PyReadonlyArray2<f64> = out.extract()?;
                Ok(arr.as_array().to_owned())
            };
            call().map_err(|err| {
                let message = err.to_string();
                callback_error.borrow_mut().get_or_insert(err);
                DeblurError::Operator(message)
            })
        },
        rows,
        cols,
        &mut rng,
        &config,
    );

    if let Some(err) = callback_error.into_inner() {
        return Err(err);
    }
    Ok(result.map_err(value_error)?.to_pyarray(py))
}

/// Closed-form Tikhonov solve given both eigenvalue grids.
#[pyfunction]
pub fn solve_regularized<'py>(
    py: Python<'py>,
    observed: PyReadonlyArray2<f64>,
    eigenvalues: PyReadonlyArray2<f64>,
    regularization: PyReadonlyArray2<f64>,
    gamma: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let output = deblur_core::solve_regularized(
        observed.as_array(),
        eigenvalues.as_array(),
        regularization.as_array(),
        gamma,
    )
    .map_err(value_error)?;
    Ok(output.to_pyarray(py))
}

/// Deblur an image observed through a periodic Gaussian blur.
#[pyfunction]
#[pyo3(signature = (observed, blur_sigma, gamma=0.01, regularizer="laplacian", eigenvalues="probe", seed=Some(0)))]
pub fn deblur_gaussian<'py>(
    py: Python<'py>,
    observed: PyReadonlyArray2<f64>,
    blur_sigma: f64,
    gamma: f64,
    regularizer: &str,
    eigenvalues: &str,
    seed: Option<u64>,
) -> PyResult<&'py PyArray2<f64>> {
    let config = DeblurConfig::default()
        .with_gamma(gamma)
        .with_regularizer(parse_regularizer(regularizer)?)
        .with_eigenvalue_source(parse_source(eigenvalues)?)
        .with_seed(seed);
    let kernel = KernelSpec::Gaussian { sigma: blur_sigma };
    let output = deblur(observed.as_array(), &kernel, &config).map_err(value_error)?;
    Ok(output.to_pyarray(py))
}

/// A Python module implemented in Rust.
#[pymodule]
fn deblur_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(periodic_gaussian_blur, m)?)?;
    m.add_function(wrap_pyfunction!(gaussian_eigenvalues, m)?)?;
    m.add_function(wrap_pyfunction!(laplacian_eigenvalues, m)?)?;
    m.add_function(wrap_pyfunction!(regularization_eigenvalues, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_operator_eigenvalues, m)?)?;
    m.add_function(wrap_pyfunction!(solve_regularized, m)?)?;
    m.add_function(wrap_pyfunction!(deblur_gaussian, m)?)?;
    Ok(())
}
