//! # Pipeline Configuration
//!
//! Collects every tunable of a page run (threshold bounds, denoise kernels,
//! segmentation filters, output options and observability) into one
//! structure. Values are read from environment variables; a value that cannot
//! be parsed is logged and replaced with its default, and [`PipelineConfig::validate`]
//! then rejects anything semantically invalid.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{PipelineError, PipelineResult};
use crate::observability_config::ObservabilityConfig;
use crate::path_validation::parse_format_name;
use crate::preprocessing::{DenoiseParams, Kernel, PreprocessParams, ThresholdParams};
use crate::segmentation::SegmentOptions;

/// Settings for the dilate-then-segment stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Kernel used to merge glyphs into blobs before contour detection
    pub dilate_kernel: Kernel,
    pub dilate_iterations: u32,
    pub height_thresh: f64,
    pub width_thresh: f64,
    pub use_average_thresh: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            dilate_kernel: Kernel { width: 9, height: 9 },
            dilate_iterations: 1,
            height_thresh: 0.0,
            width_thresh: 0.0,
            use_average_thresh: false,
        }
    }
}

impl SegmentationConfig {
    /// Size filter handed to the segmenter
    pub fn options(&self) -> SegmentOptions {
        SegmentOptions {
            height_thresh: self.height_thresh,
            width_thresh: self.width_thresh,
            use_average_thresh: self.use_average_thresh,
        }
    }

    /// Validate segmentation configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.dilate_kernel.width == 0 || self.dilate_kernel.height == 0 {
            return Err(PipelineError::Config(format!(
                "SEGMENT_DILATE_KERNEL must have positive dimensions, got {}",
                self.dilate_kernel
            )));
        }
        if self.dilate_iterations == 0 {
            return Err(PipelineError::Config(
                "SEGMENT_DILATE_ITERATIONS cannot be 0".to_string(),
            ));
        }
        self.options()
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))
    }
}

/// Where and how results are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Format name for the annotated image and crops (`png`, `jpg`, ...)
    pub format: String,
    pub write_region_crops: bool,
    /// Also save the preprocessed and dilated masks
    pub write_intermediate: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            format: "png".to_string(),
            write_region_crops: true,
            write_intermediate: false,
        }
    }
}

impl OutputConfig {
    /// Resolved encoder for `format`
    pub fn image_format(&self) -> PipelineResult<ImageFormat> {
        parse_format_name(&self.format)
            .map_err(|e| PipelineError::Config(format!("OUTPUT_FORMAT: {}", e)))
    }

    /// Validate output configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(PipelineError::Config("OUTPUT_DIR cannot be empty".to_string()));
        }
        self.image_format().map(|_| ())
    }
}

/// Unified configuration for a page run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub preprocess: PreprocessParams,
    pub segmentation: SegmentationConfig,
    pub output: OutputConfig,
    #[serde(skip)]
    pub observability: ObservabilityConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| env::var(key).ok());
        config.observability = ObservabilityConfig::from_env();
        config
    }

    /// Build the pipeline sections from an arbitrary key lookup.
    /// Observability settings keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let threshold_defaults = defaults.preprocess.threshold;
        let denoise_defaults = defaults.preprocess.denoise;
        let segment_defaults = defaults.segmentation;
        let output_defaults = defaults.output;

        let read = |key: &str| lookup(key);

        Self {
            preprocess: PreprocessParams {
                threshold: ThresholdParams {
                    low: parse_or(&read, "THRESHOLD_LOW", threshold_defaults.low),
                    high: parse_or(&read, "THRESHOLD_HIGH", threshold_defaults.high),
                },
                denoise: DenoiseParams {
                    dilate_kernel: parse_or(&read, "DENOISE_DILATE_KERNEL", denoise_defaults.dilate_kernel),
                    erode_kernel: parse_or(&read, "DENOISE_ERODE_KERNEL", denoise_defaults.erode_kernel),
                    dilate_iterations: parse_or(
                        &read,
                        "DENOISE_DILATE_ITERATIONS",
                        denoise_defaults.dilate_iterations,
                    ),
                    erode_iterations: parse_or(
                        &read,
                        "DENOISE_ERODE_ITERATIONS",
                        denoise_defaults.erode_iterations,
                    ),
                    median_ksize: parse_or(&read, "DENOISE_MEDIAN_KSIZE", denoise_defaults.median_ksize),
                },
            },
            segmentation: SegmentationConfig {
                dilate_kernel: parse_or(&read, "SEGMENT_DILATE_KERNEL", segment_defaults.dilate_kernel),
                dilate_iterations: parse_or(
                    &read,
                    "SEGMENT_DILATE_ITERATIONS",
                    segment_defaults.dilate_iterations,
                ),
                height_thresh: parse_or(&read, "SEGMENT_HEIGHT_THRESH", segment_defaults.height_thresh),
                width_thresh: parse_or(&read, "SEGMENT_WIDTH_THRESH", segment_defaults.width_thresh),
                use_average_thresh: parse_or(
                    &read,
                    "SEGMENT_USE_AVERAGE_THRESH",
                    segment_defaults.use_average_thresh,
                ),
            },
            output: OutputConfig {
                directory: read("OUTPUT_DIR")
                    .filter(|dir| !dir.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(output_defaults.directory),
                format: read("OUTPUT_FORMAT")
                    .map(|format| format.trim().to_lowercase())
                    .unwrap_or(output_defaults.format),
                write_region_crops: parse_or(&read, "WRITE_REGION_CROPS", output_defaults.write_region_crops),
                write_intermediate: parse_or(&read, "WRITE_INTERMEDIATE", output_defaults.write_intermediate),
            },
            observability: defaults.observability,
        }
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> PipelineResult<()> {
        self.preprocess
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        self.segmentation.validate()?;
        self.output.validate()?;
        self.observability.validate().map_err(PipelineError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: threshold=({}, {}), denoise=[dilate {} ({} iter), erode {} ({} iter), median {}], segment_kernel={} ({} iter), average_thresh={}, output={} ({})",
            self.preprocess.threshold.low,
            self.preprocess.threshold.high,
            self.preprocess.denoise.dilate_kernel,
            self.preprocess.denoise.dilate_iterations,
            self.preprocess.denoise.erode_kernel,
            self.preprocess.denoise.erode_iterations,
            self.preprocess.denoise.median_ksize,
            self.segmentation.dilate_kernel,
            self.segmentation.dilate_iterations,
            self.segmentation.use_average_thresh,
            self.output.directory.display(),
            self.output.format
        )
    }
}

/// Parses `key` or falls back to `default`, warning when a value is present
/// but malformed.
fn parse_or<T, F>(read: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match read(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    variable = %key,
                    value = %raw,
                    default = %default,
                    "Unparseable configuration value, using default"
                );
                default
            }
        },
    }
}
