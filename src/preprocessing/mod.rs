//! # Image Preprocessing Module
//!
//! The transform library: pure, parameterized image-to-image operations.
//! Every function borrows its input and returns a newly allocated image;
//! none of them touch any stored pipeline state. Committing results into a
//! working image is the job of [`crate::image_store::ImageStore`].
//!
//! The module is organized into focused sub-modules:
//! - `color`: bitwise inversion and grayscale conversion
//! - `filtering`: Gaussian blur and median filtering
//! - `thresholding`: inverted binary thresholding using Otsu's method
//! - `morphology`: erosion/dilation, denoising and stroke thinning/thickening
//! - `types`: kernels, parameter sets and result types

pub mod color;
pub mod filtering;
pub mod morphology;
mod samples;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{DenoiseParams, Kernel, PreprocessParams, ThresholdParams, ThresholdedImageResult};

pub use color::{grayscale, invert};
pub use filtering::{blur, median_blur};
pub use morphology::{
    apply_morphological_operation, denoise, dilate, erode, thicken_font, thin_font,
    MorphologicalOperation,
};
pub use thresholding::apply_otsu_threshold;
