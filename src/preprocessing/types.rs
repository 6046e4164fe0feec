//! # Shared Types for Image Preprocessing
//!
//! Parameter descriptors and result structs used across the transform
//! sub-modules. Every parameter type validates itself before any pixel is
//! touched, so a rejected call never leaves half-processed state behind.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};

/// Rectangular structuring element used by the morphological operations.
///
/// The anchor is the kernel centre (`width / 2`, `height / 2`), matching the
/// usual convention for rectangular elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    pub width: u32,
    pub height: u32,
}

impl Kernel {
    /// Creates a validated kernel.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidParameter` if either dimension is zero.
    pub fn new(width: u32, height: u32) -> PipelineResult<Self> {
        let kernel = Self { width, height };
        kernel.validate("kernel")?;
        Ok(kernel)
    }

    /// Square kernel of side `size`.
    pub fn square(size: u32) -> PipelineResult<Self> {
        Self::new(size, size)
    }

    /// Checks both dimensions are positive. `name` labels the offending parameter.
    pub fn validate(&self, name: &str) -> PipelineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::invalid(
                name,
                format!(
                    "kernel dimensions must be positive, got {}x{}",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }

    /// Same as [`Kernel::validate`] but additionally requires odd dimensions.
    pub fn validate_odd(&self, name: &str) -> PipelineResult<()> {
        self.validate(name)?;
        if self.width % 2 == 0 || self.height % 2 == 0 {
            return Err(PipelineError::invalid(
                name,
                format!(
                    "kernel dimensions must be odd, got {}x{}",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }

    /// Anchor offsets `(ax, ay)` of the kernel centre.
    pub fn anchor(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }

    /// 1x1 kernels leave an image unchanged under erosion and dilation.
    pub fn is_identity(&self) -> bool {
        self.width == 1 && self.height == 1
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Kernel {
    type Err = PipelineError;

    /// Parses `"WxH"` or a single number for a square kernel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |part: &str| {
            part.trim().parse::<u32>().map_err(|_| {
                PipelineError::invalid("kernel", format!("cannot parse kernel size '{}'", s))
            })
        };
        match s.split_once(|c: char| c == 'x' || c == 'X') {
            Some((w, h)) => Kernel::new(parse(w)?, parse(h)?),
            None => Kernel::square(parse(s)?),
        }
    }
}

/// Bounds handed to the binarization step.
///
/// The threshold level itself is always chosen by Otsu's method; `low` is
/// carried for completeness and `high` is the value written for foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub low: u8,
    pub high: u8,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self { low: 100, high: 252 }
    }
}

impl ThresholdParams {
    pub fn new(low: u8, high: u8) -> PipelineResult<Self> {
        let params = Self { low, high };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.low >= self.high {
            return Err(PipelineError::invalid(
                "threshold",
                format!(
                    "low bound must be below high bound, got ({}, {})",
                    self.low, self.high
                ),
            ));
        }
        Ok(())
    }
}

/// Parameters for the three-stage denoise (dilate, erode, median).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenoiseParams {
    pub dilate_kernel: Kernel,
    pub erode_kernel: Kernel,
    pub dilate_iterations: u32,
    pub erode_iterations: u32,
    /// Median aperture; must be odd. 1 disables the median stage.
    pub median_ksize: u32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            dilate_kernel: Kernel { width: 1, height: 1 },
            erode_kernel: Kernel { width: 1, height: 1 },
            dilate_iterations: 1,
            erode_iterations: 1,
            median_ksize: 3,
        }
    }
}

impl DenoiseParams {
    pub fn validate(&self) -> PipelineResult<()> {
        self.dilate_kernel.validate("dilate_kernel")?;
        self.erode_kernel.validate("erode_kernel")?;
        validate_iterations("dilate_iterations", self.dilate_iterations)?;
        validate_iterations("erode_iterations", self.erode_iterations)?;
        if self.median_ksize == 0 || self.median_ksize % 2 == 0 {
            return Err(PipelineError::invalid(
                "median_ksize",
                format!("median aperture must be odd and positive, got {}", self.median_ksize),
            ));
        }
        Ok(())
    }
}

/// Parameters of the grayscale → threshold → denoise convenience chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreprocessParams {
    pub threshold: ThresholdParams,
    pub denoise: DenoiseParams,
}

impl PreprocessParams {
    pub fn validate(&self) -> PipelineResult<()> {
        self.threshold.validate()?;
        self.denoise.validate()
    }
}

pub(crate) fn validate_iterations(name: &str, iterations: u32) -> PipelineResult<()> {
    if iterations == 0 {
        return Err(PipelineError::invalid(
            name,
            "iteration count must be positive",
        ));
    }
    Ok(())
}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The binary image (foreground = `high`, background = 0)
    pub image: DynamicImage,
    /// Level chosen by Otsu's method
    pub threshold: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
