//! # Image Filtering Module
//!
//! Gaussian smoothing driven by an explicit kernel size, and the median filter
//! used as the last stage of denoising.

use image::buffer::ConvertBuffer;
use image::{DynamicImage, GrayImage, GrayAlphaImage, RgbImage, RgbaImage};
use imageproc::filter::separable_filter;
use tracing;

use super::samples::to_eight_bit;
use super::types::Kernel;
use crate::errors::{PipelineError, PipelineResult};

/// Applies Gaussian smoothing with a `width x height` kernel.
///
/// The standard deviation on each axis is derived from the kernel size
/// (`0.3 * ((k - 1) * 0.5 - 1) + 0.8`), so callers tune blur strength purely
/// through the kernel. Output keeps the dimensions and channel layout of the
/// input; edge pixels are replicated past the border.
///
/// # Errors
///
/// Returns `PipelineError::InvalidParameter` if the kernel is not odd in both
/// dimensions.
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, GrayImage, Luma};
/// use page_segmenter::preprocessing::{blur, Kernel};
///
/// let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([90])));
/// let blurred = blur(&img, Kernel::square(5)?)?;
/// assert_eq!(blurred, img); // flat images are unchanged
/// # Ok::<(), page_segmenter::errors::PipelineError>(())
/// ```
pub fn blur(image: &DynamicImage, kernel: Kernel) -> PipelineResult<DynamicImage> {
    kernel.validate_odd("blur_kernel")?;
    let start_time = std::time::Instant::now();

    let weights_x = gaussian_weights(kernel.width);
    let weights_y = gaussian_weights(kernel.height);

    // Filter in f32 so the result is rounded once, not truncated per pass.
    let color = image.color();
    let blurred = match (color.channel_count(), color.has_alpha()) {
        (1, _) => {
            let out: GrayImage =
                separable_filter(&image.to_luma32f(), &weights_x, &weights_y).convert();
            DynamicImage::ImageLuma8(out)
        }
        (2, _) => {
            let out: GrayAlphaImage =
                separable_filter(&image.to_luma_alpha32f(), &weights_x, &weights_y).convert();
            DynamicImage::ImageLumaA8(out)
        }
        (_, true) => {
            let out: RgbaImage =
                separable_filter(&image.to_rgba32f(), &weights_x, &weights_y).convert();
            DynamicImage::ImageRgba8(out)
        }
        _ => {
            let out: RgbImage =
                separable_filter(&image.to_rgb32f(), &weights_x, &weights_y).convert();
            DynamicImage::ImageRgb8(out)
        }
    };

    tracing::debug!(
        target: "page_preprocessing",
        "Gaussian blur completed in {}ms: kernel={}, dimensions={}x{}",
        start_time.elapsed().as_millis(),
        kernel,
        blurred.width(),
        blurred.height()
    );

    Ok(blurred)
}

/// Replaces each sample with the median of its `ksize x ksize` neighbourhood.
///
/// `ksize` must be odd; 1 returns an 8-bit copy of the input.
pub fn median_blur(image: &DynamicImage, ksize: u32) -> PipelineResult<DynamicImage> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(PipelineError::invalid(
            "median_ksize",
            format!("median aperture must be odd and positive, got {}", ksize),
        ));
    }

    let radius = ksize / 2;
    let filtered = match to_eight_bit(image) {
        eight_bit if radius == 0 => eight_bit,
        DynamicImage::ImageLuma8(buf) => {
            DynamicImage::ImageLuma8(imageproc::filter::median_filter(&buf, radius, radius))
        }
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(imageproc::filter::median_filter(&buf, radius, radius))
        }
        DynamicImage::ImageRgba8(buf) => {
            DynamicImage::ImageRgba8(imageproc::filter::median_filter(&buf, radius, radius))
        }
        other => DynamicImage::ImageRgb8(imageproc::filter::median_filter(
            &other.to_rgb8(),
            radius,
            radius,
        )),
    };

    tracing::debug!(
        target: "page_preprocessing",
        "Median filter applied: ksize={}, dimensions={}x{}",
        ksize,
        filtered.width(),
        filtered.height()
    );

    Ok(filtered)
}

/// Normalised 1-D Gaussian weights for an odd aperture.
fn gaussian_weights(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, GrayImage, Luma, RgbImage};

    #[test]
    fn test_gaussian_weights_normalised_and_symmetric() {
        for size in [1, 3, 5, 9] {
            let weights = gaussian_weights(size);
            assert_eq!(weights.len(), size as usize);
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            for i in 0..weights.len() {
                assert!((weights[i] - weights[weights.len() - 1 - i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_blur_preserves_shape_and_layout() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 25));
        let blurred = blur(&img, Kernel::new(5, 3).unwrap()).unwrap();
        assert_eq!(blurred.color(), ColorType::Rgb8);
        assert_eq!((blurred.width(), blurred.height()), (40, 25));
    }

    #[test]
    fn test_blur_rejects_even_kernel() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(matches!(
            blur(&img, Kernel::new(4, 3).unwrap()),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_blur_spreads_single_dot() {
        let mut img = GrayImage::new(9, 9);
        img.put_pixel(4, 4, Luma([255]));
        let blurred = blur(&DynamicImage::ImageLuma8(img), Kernel::square(3).unwrap())
            .unwrap()
            .to_luma8();
        assert!(blurred.get_pixel(4, 4)[0] < 255);
        assert!(blurred.get_pixel(3, 4)[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_blur_replicates_edges() {
        // A bright left column stays bright at the border instead of fading
        let img = GrayImage::from_fn(7, 5, |x, _| Luma([if x == 0 { 200 } else { 0 }]));
        let blurred = blur(&DynamicImage::ImageLuma8(img), Kernel::new(3, 1).unwrap())
            .unwrap()
            .to_luma8();
        assert!(blurred.get_pixel(0, 2)[0] > blurred.get_pixel(1, 2)[0]);
        assert!(blurred.get_pixel(0, 2)[0] < 200);
        assert_eq!(blurred.get_pixel(3, 2)[0], 0);
    }

    #[test]
    fn test_blur_keeps_alpha_layout() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(6, 6, image::Rgba([10, 20, 30, 255])));
        let blurred = blur(&img, Kernel::square(3).unwrap()).unwrap();
        assert_eq!(blurred, img);
    }

    #[test]
    fn test_median_removes_salt_noise() {
        let mut img = GrayImage::new(7, 7);
        img.put_pixel(3, 3, Luma([255]));
        let filtered = median_blur(&DynamicImage::ImageLuma8(img), 3).unwrap().to_luma8();
        assert!(filtered.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_median_rejects_even_aperture() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        assert!(median_blur(&img, 2).is_err());
        assert!(median_blur(&img, 0).is_err());
        assert_eq!(median_blur(&img, 1).unwrap(), img);
    }
}
