//! # Color and Intensity Transforms
//!
//! Bitwise inversion and luma conversion. Both are total functions: they
//! accept any decoded raster and always return a freshly allocated image.

use image::DynamicImage;
use tracing;

use super::samples::map_samples;

/// Returns the bitwise complement of every sample, alpha included.
///
/// Applying it twice yields the original image exactly. Non-8-bit inputs are
/// narrowed to 8 bits per sample first so the complement is `255 - v`.
pub fn invert(image: &DynamicImage) -> DynamicImage {
    let start_time = std::time::Instant::now();

    let inverted = map_samples(image, |src, dst, _, _, _| {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = !*s;
        }
    });

    tracing::debug!(
        target: "page_preprocessing",
        "Inversion completed in {}ms: dimensions={}x{}",
        start_time.elapsed().as_millis(),
        inverted.width(),
        inverted.height()
    );

    inverted
}

/// Collapses any image to a single 8-bit luma channel.
///
/// Width and height are preserved; an image that is already `Luma8` is copied.
pub fn grayscale(image: &DynamicImage) -> DynamicImage {
    let gray = match image {
        DynamicImage::ImageLuma8(buf) => buf.clone(),
        other => other.to_luma8(),
    };

    tracing::debug!(
        target: "page_preprocessing",
        "Grayscale conversion: {:?} -> L8, dimensions={}x{}",
        image.color(),
        gray.width(),
        gray.height()
    );

    DynamicImage::ImageLuma8(gray)
}
