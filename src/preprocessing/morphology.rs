//! # Morphological Operations
//!
//! Rectangular-kernel erosion and dilation plus the operators built from them:
//! the three-stage denoise and the stroke thinning/thickening helpers.
//!
//! Samples outside the image never win the min/max, so borders neither grow
//! nor shrink artificially. Color images are processed per channel.

use image::DynamicImage;
use tracing;

use super::color::invert;
use super::filtering::median_blur;
use super::samples::map_samples;
use super::types::{validate_iterations, DenoiseParams, Kernel};
use crate::errors::PipelineResult;

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks bright regions)
    Erosion,
    /// Dilation operation (expands bright regions)
    Dilation,
}

impl MorphologicalOperation {
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            MorphologicalOperation::Erosion => a.min(b),
            MorphologicalOperation::Dilation => a.max(b),
        }
    }
}

/// Grows bright regions by `kernel`, `iterations` times.
pub fn dilate(image: &DynamicImage, kernel: Kernel, iterations: u32) -> PipelineResult<DynamicImage> {
    apply_morphological_operation(image, MorphologicalOperation::Dilation, kernel, iterations)
}

/// Shrinks bright regions by `kernel`, `iterations` times.
pub fn erode(image: &DynamicImage, kernel: Kernel, iterations: u32) -> PipelineResult<DynamicImage> {
    apply_morphological_operation(image, MorphologicalOperation::Erosion, kernel, iterations)
}

/// Applies erosion or dilation with a rectangular structuring element.
///
/// # Errors
///
/// Returns `PipelineError::InvalidParameter` for a zero-sized kernel or a zero
/// iteration count.
pub fn apply_morphological_operation(
    image: &DynamicImage,
    operation: MorphologicalOperation,
    kernel: Kernel,
    iterations: u32,
) -> PipelineResult<DynamicImage> {
    kernel.validate("kernel")?;
    validate_iterations("iterations", iterations)?;
    let start_time = std::time::Instant::now();

    let processed = map_samples(image, |src, dst, width, height, channels| {
        if kernel.is_identity() {
            return;
        }
        let mut current = src.to_vec();
        let mut rows = vec![0u8; src.len()];
        for _ in 0..iterations {
            rank_rows(&current, &mut rows, width, height, channels, kernel, operation);
            rank_columns(&rows, &mut current, width, height, channels, kernel, operation);
        }
        dst.copy_from_slice(&current);
    });

    tracing::debug!(
        target: "page_preprocessing",
        "Morphological operation completed in {}ms: operation={:?}, kernel={}, iterations={}, dimensions={}x{}",
        start_time.elapsed().as_millis(),
        operation,
        kernel,
        iterations,
        processed.width(),
        processed.height()
    );

    Ok(processed)
}

/// Dilate, then erode, then median-filter.
///
/// The dilate/erode pair closes small holes and gaps in the foreground; with
/// different kernels the original boundaries are not fully restored. The
/// median pass removes remaining salt-and-pepper specks. All parameters are
/// validated before any stage runs.
pub fn denoise(image: &DynamicImage, params: &DenoiseParams) -> PipelineResult<DynamicImage> {
    params.validate()?;

    let dilated = dilate(image, params.dilate_kernel, params.dilate_iterations)?;
    let closed = erode(&dilated, params.erode_kernel, params.erode_iterations)?;
    median_blur(&closed, params.median_ksize)
}

/// Thins dark strokes on a light background: invert, erode, invert back.
pub fn thin_font(image: &DynamicImage, kernel: Kernel, iterations: u32) -> PipelineResult<DynamicImage> {
    kernel.validate("kernel")?;
    validate_iterations("iterations", iterations)?;
    let eroded = erode(&invert(image), kernel, iterations)?;
    Ok(invert(&eroded))
}

/// Thickens dark strokes on a light background: invert, dilate, invert back.
pub fn thicken_font(
    image: &DynamicImage,
    kernel: Kernel,
    iterations: u32,
) -> PipelineResult<DynamicImage> {
    kernel.validate("kernel")?;
    validate_iterations("iterations", iterations)?;
    let dilated = dilate(&invert(image), kernel, iterations)?;
    Ok(invert(&dilated))
}

fn rank_rows(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: usize,
    kernel: Kernel,
    operation: MorphologicalOperation,
) {
    let (ax, _) = kernel.anchor();
    let row_len = width as usize * channels;
    for y in 0..height as usize {
        let row = &src[y * row_len..(y + 1) * row_len];
        for x in 0..width as i64 {
            let start = (x - ax as i64).max(0) as usize;
            let end = ((x - ax as i64 + kernel.width as i64).min(width as i64)) as usize;
            for c in 0..channels {
                let mut value = row[x as usize * channels + c];
                for sx in start..end {
                    value = operation.pick(value, row[sx * channels + c]);
                }
                dst[y * row_len + x as usize * channels + c] = value;
            }
        }
    }
}

fn rank_columns(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: usize,
    kernel: Kernel,
    operation: MorphologicalOperation,
) {
    let (_, ay) = kernel.anchor();
    let row_len = width as usize * channels;
    for y in 0..height as i64 {
        let start = (y - ay as i64).max(0) as usize;
        let end = ((y - ay as i64 + kernel.height as i64).min(height as i64)) as usize;
        for i in 0..row_len {
            let mut value = src[y as usize * row_len + i];
            for sy in start..end {
                value = operation.pick(value, src[sy * row_len + i]);
            }
            dst[y as usize * row_len + i] = value;
        }
    }
}
