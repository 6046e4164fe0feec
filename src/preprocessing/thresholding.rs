//! # Image Thresholding Module
//!
//! Inverted binary thresholding with the level chosen automatically by
//! Otsu's method. Dark ink becomes foreground.

use image::{DynamicImage, GrayImage, Luma};
use tracing;

use super::types::{ThresholdParams, ThresholdedImageResult};
use crate::errors::PipelineResult;

/// Binarizes an image so that pixels at or below the Otsu level become
/// `params.high` (foreground) and brighter pixels become 0 (background).
///
/// The level maximises the between-class variance of the two intensity
/// populations; `params.low` does not fix it. Color input is reduced to luma
/// first. An image holding a single intensity has no split to find and comes
/// back as a single class.
///
/// # Errors
///
/// Returns `PipelineError::InvalidParameter` if `params.low >= params.high`.
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, GrayImage, Luma};
/// use page_segmenter::preprocessing::{apply_otsu_threshold, ThresholdParams};
///
/// let img = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([20]) } else { Luma([230]) });
/// let result = apply_otsu_threshold(&DynamicImage::ImageLuma8(img), ThresholdParams::default())?;
/// let binary = result.image.to_luma8();
/// assert_eq!(binary.get_pixel(0, 0)[0], 252);
/// assert_eq!(binary.get_pixel(9, 0)[0], 0);
/// # Ok::<(), page_segmenter::errors::PipelineError>(())
/// ```
pub fn apply_otsu_threshold(
    image: &DynamicImage,
    params: ThresholdParams,
) -> PipelineResult<ThresholdedImageResult> {
    params.validate()?;
    let start_time = std::time::Instant::now();

    let gray = match image {
        DynamicImage::ImageLuma8(buf) => buf.clone(),
        other => other.to_luma8(),
    };

    let level = imageproc::contrast::otsu_level(&gray);

    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (src, dst) in gray.pixels().zip(binary.pixels_mut()) {
        *dst = if src[0] > level {
            Luma([0u8])
        } else {
            Luma([params.high])
        };
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "page_preprocessing",
        "Otsu thresholding completed in {}ms: level={}, high={}, dimensions={}x{}",
        processing_time.as_millis(),
        level,
        params.high,
        gray.width(),
        gray.height()
    );

    Ok(ThresholdedImageResult {
        image: DynamicImage::ImageLuma8(binary),
        threshold: level,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}
