//! # Page Segmenter
//!
//! Preprocesses raster page images (grayscale, Otsu binarization, morphological
//! denoising) and segments them into rectangular regions of interest using
//! external contour detection.

pub mod config;
pub mod errors;
pub mod image_store;
pub mod observability;
pub mod observability_config;
pub mod path_validation;
pub mod preprocessing;
pub mod report;
pub mod segmentation;

// Re-export types for easier access
pub use config::PipelineConfig;
pub use errors::{PipelineError, PipelineResult};
pub use image_store::{save_image, ImageStore};
pub use preprocessing::{DenoiseParams, Kernel, PreprocessParams, ThresholdParams};
pub use report::{RegionRecord, SegmentationReport};
pub use segmentation::{get_segment, BoundingBox, Region, SegmentOptions, Segmentation};
