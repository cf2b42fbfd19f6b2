//! Grayscale image loading and saving.
//!
//! Images are `Array2<f64>` indexed `[row, col]`. Integer sources are scaled to
//! [0, 1] by the maximum of their sample type; float TIFF data is kept as is.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::Array2;
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};
use tiff::ColorType;

#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
}

fn is_tiff(path: &Path) -> bool {
    has_extension(path, &["tif", "tiff"])
}

fn has_extension(path: &Path, candidates: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| candidates.iter().any(|c| e.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

/// Load an image as grayscale.
pub fn load_image(path: &Path) -> Result<Array2<f64>, ImageIoError> {
    if is_tiff(path) {
        load_tiff(path)
    } else {
        load_raster(path)
    }
}

fn load_raster(path: &Path) -> Result<Array2<f64>, ImageIoError> {
    let gray = image::open(path)?.into_luma16();
    let (width, height) = gray.dimensions();
    let scale = f64::from(u16::MAX);
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(r, c)| f64::from(gray.get_pixel(c as u32, r as u32).0[0]) / scale,
    ))
}

/// Read the first page of a grayscale TIFF.
fn load_tiff(path: &Path) -> Result<Array2<f64>, ImageIoError> {
    let reader = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    if !matches!(
        color_type,
        ColorType::Gray(8) | ColorType::Gray(16) | ColorType::Gray(32) | ColorType::Gray(64)
    ) {
        return Err(ImageIoError::UnsupportedDataType(format!(
            "TIFF color type {:?}; only grayscale is supported",
            color_type
        )));
    }

    let pixels: Vec<f64> = match decoder.read_image()? {
        DecodingResult::U8(data) => scaled(data, f64::from(u8::MAX)),
        DecodingResult::U16(data) => scaled(data, f64::from(u16::MAX)),
        DecodingResult::U32(data) => scaled(data, f64::from(u32::MAX)),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64 / u64::MAX as f64).collect(),
        DecodingResult::I8(data) => scaled(data, f64::from(i8::MAX)),
        DecodingResult::I16(data) => scaled(data, f64::from(i16::MAX)),
        DecodingResult::I32(data) => scaled(data, f64::from(i32::MAX)),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64 / i64::MAX as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
    };

    let (rows, cols) = (height as usize, width as usize);
    Array2::from_shape_vec((rows, cols), pixels).map_err(|e| {
        ImageIoError::InvalidDimensions(format!("expected {}x{} pixels: {}", rows, cols, e))
    })
}

fn scaled<T: Into<f64>>(data: Vec<T>, max: f64) -> Vec<f64> {
    data.into_iter().map(|v| v.into() / max).collect()
}

/// Save an image. `.tif`/`.tiff` keeps raw 32-bit float values; other formats
/// are clamped to [0, 1] and quantized (16-bit for PNG, 8-bit otherwise).
pub fn save_image(image: &Array2<f64>, path: &Path) -> Result<(), ImageIoError> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(ImageIoError::InvalidDimensions(
            "cannot save an empty image".to_string(),
        ));
    }

    if is_tiff(path) {
        let writer = BufWriter::new(File::create(path)?);
        let mut encoder = TiffEncoder::new(writer)?;
        let data: Vec<f32> = image.iter().map(|&v| v as f32).collect();
        encoder.write_image::<Gray32Float>(cols as u32, rows as u32, &data)?;
        return Ok(());
    }

    let max = f64::from(u16::MAX);
    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
            let v = image[[y as usize, x as usize]];
            Luma([(v.clamp(0.0, 1.0) * max).round() as u16])
        });
    let dynamic = DynamicImage::ImageLuma16(buffer);
    if has_extension(path, &["png"]) {
        dynamic.save(path)?;
    } else {
        DynamicImage::ImageLuma8(dynamic.into_luma8()).save(path)?;
    }
    Ok(())
}
