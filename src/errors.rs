//! # Pipeline Error Types
//!
//! This module defines the error type shared by the image store, the transform
//! library and the segmenter, plus structured logging helpers for reporting
//! failures consistently.

use std::fmt;

/// Errors raised by the preprocessing and segmentation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The source path is missing, unreadable, or not a decodable raster
    ImageLoad { path: String, message: String },
    /// The destination is unwritable or the requested format is unsupported
    ImageSave { path: String, message: String },
    /// A kernel, iteration count or threshold bound was rejected before any pixel work
    InvalidParameter { name: String, message: String },
    /// Configuration values failed validation
    Config(String),
    /// The region report could not be serialised or written
    Report { path: String, message: String },
}

impl PipelineError {
    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> Self {
        PipelineError::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Short machine-friendly label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ImageLoad { .. } => "image_load",
            PipelineError::ImageSave { .. } => "image_save",
            PipelineError::InvalidParameter { .. } => "invalid_parameter",
            PipelineError::Config(_) => "config",
            PipelineError::Report { .. } => "report",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ImageLoad { path, message } => {
                write!(f, "[IMAGE_LOAD] Failed to load image '{}': {}", path, message)
            }
            PipelineError::ImageSave { path, message } => {
                write!(f, "[IMAGE_SAVE] Failed to save image '{}': {}", path, message)
            }
            PipelineError::InvalidParameter { name, message } => {
                write!(f, "[INVALID_PARAMETER] {}: {}", name, message)
            }
            PipelineError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            PipelineError::Report { path, message } => {
                write!(f, "[REPORT] Failed to write report '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Result type alias for convenience
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for pipeline failures
pub mod error_logging {
    use tracing::error;

    /// Log image decode/encode errors with path and operation context
    pub fn log_image_io_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Image I/O operation failed"
        );
    }

    /// Log rejected transform or segmentation parameters
    pub fn log_parameter_error(error: &impl std::fmt::Display, operation: &str) {
        error!(
            error = %error,
            operation = %operation,
            "Pipeline parameter validation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = PipelineError::ImageLoad {
            path: "page-1.png".to_string(),
            message: "No such file".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("[IMAGE_LOAD]"));
        assert!(rendered.contains("page-1.png"));
        assert!(rendered.contains("No such file"));

        let err = PipelineError::invalid("kernel", "width must be > 0");
        assert_eq!(err.to_string(), "[INVALID_PARAMETER] kernel: width must be > 0");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(PipelineError::Config("x".into()).kind(), "config");
        assert_eq!(PipelineError::invalid("a", "b").kind(), "invalid_parameter");
        assert_eq!(
            PipelineError::ImageSave {
                path: String::new(),
                message: String::new()
            }
            .kind(),
            "image_save"
        );
        let err = PipelineError::Report {
            path: "out/regions.json".to_string(),
            message: "Permission denied".to_string(),
        };
        assert_eq!(err.kind(), "report");
        assert!(err.to_string().starts_with("[REPORT]"));
    }
}
