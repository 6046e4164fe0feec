//! Path validation for raster inputs and outputs
//!
//! Page images arrive as file paths produced by an external renderer, and
//! results are written back to caller-chosen locations. This module performs
//! the cheap checks that should fail before any decode or encode work:
//!
//! - Empty paths, null bytes and over-long paths are rejected
//! - Output formats are resolved from an explicit choice or the extension,
//!   and must be encodable
//! - Region crop filenames are derived from a sanitized stem

use std::path::Path;

use image::ImageFormat;

/// Errors that can occur during path validation
#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    /// Empty path provided
    EmptyPath,
    /// Path contains null bytes
    NullByte,
    /// Path is too long
    PathTooLong,
    /// Filename is too long
    FilenameTooLong,
    /// The path has no extension and no explicit format was given
    MissingExtension,
    /// The extension or requested format cannot be encoded
    UnsupportedFormat(String),
}

/// Result type for path validation operations
pub type PathValidationResult<T> = Result<T, PathValidationError>;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum allowed path length (4096 bytes on most systems)
pub const MAX_PATH_LENGTH: usize = 4096;

/// Characters replaced when building output filenames
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '/', '\\', '\0'];

/// Validate a path before it is handed to the decoder or encoder
///
/// # Examples
///
/// ```rust
/// use page_segmenter::path_validation::validate_image_path;
///
/// assert!(validate_image_path("pages/page-001.png").is_ok());
/// assert!(validate_image_path("").is_err());
/// assert!(validate_image_path("bad\0name.png").is_err());
/// ```
pub fn validate_image_path(path: impl AsRef<Path>) -> PathValidationResult<()> {
    let path_str = path.as_ref().to_string_lossy();

    if path_str.is_empty() {
        return Err(PathValidationError::EmptyPath);
    }

    if path_str.len() > MAX_PATH_LENGTH {
        return Err(PathValidationError::PathTooLong);
    }

    if path_str.contains('\0') {
        return Err(PathValidationError::NullByte);
    }

    if let Some(filename) = path.as_ref().file_name() {
        if filename.len() > MAX_FILENAME_LENGTH {
            return Err(PathValidationError::FilenameTooLong);
        }
    }

    Ok(())
}

/// Resolve the encoding format for an output path
///
/// An explicit `format` wins over the extension. Either way the format must
/// have an encoder compiled in.
///
/// # Examples
///
/// ```rust
/// use image::ImageFormat;
/// use page_segmenter::path_validation::resolve_output_format;
///
/// assert_eq!(resolve_output_format("out/annotated.png", None).unwrap(), ImageFormat::Png);
/// assert_eq!(
///     resolve_output_format("out/annotated", Some(ImageFormat::Jpeg)).unwrap(),
///     ImageFormat::Jpeg
/// );
/// assert!(resolve_output_format("out/annotated.txt", None).is_err());
/// ```
pub fn resolve_output_format(
    path: impl AsRef<Path>,
    format: Option<ImageFormat>,
) -> PathValidationResult<ImageFormat> {
    let path = path.as_ref();
    validate_image_path(path)?;

    let format = match format {
        Some(format) => format,
        None => {
            let extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
                .ok_or(PathValidationError::MissingExtension)?;
            ImageFormat::from_extension(&extension)
                .ok_or(PathValidationError::UnsupportedFormat(extension))?
        }
    };

    if !format.writing_enabled() {
        return Err(PathValidationError::UnsupportedFormat(format!("{:?}", format)));
    }

    Ok(format)
}

/// Parse a format name such as `png`, `jpg` or `tiff`
pub fn parse_format_name(name: &str) -> PathValidationResult<ImageFormat> {
    let name = name.trim().trim_start_matches('.').to_lowercase();
    let format = ImageFormat::from_extension(&name)
        .ok_or_else(|| PathValidationError::UnsupportedFormat(name.clone()))?;
    if !format.writing_enabled() {
        return Err(PathValidationError::UnsupportedFormat(name));
    }
    Ok(format)
}

/// Sanitize a filename by replacing dangerous characters
///
/// # Examples
///
/// ```rust
/// use page_segmenter::path_validation::sanitize_filename;
///
/// assert_eq!(sanitize_filename("page-1"), "page-1");
/// assert_eq!(sanitize_filename("scan<2>"), "scan_2_");
/// assert_eq!(sanitize_filename("..."), "page");
/// ```
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized: String = filename
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    sanitized = sanitized.trim().trim_matches('.').trim().to_string();
    if sanitized.is_empty() {
        sanitized = "page".to_string();
    }

    if sanitized.len() > MAX_FILENAME_LENGTH / 2 {
        let mut cut = MAX_FILENAME_LENGTH / 2;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
    }

    sanitized
}

/// Filename for the `index`-th region crop of the page with stem `stem`
///
/// ```rust
/// use image::ImageFormat;
/// use page_segmenter::path_validation::region_crop_filename;
///
/// assert_eq!(region_crop_filename("page 3", 7, ImageFormat::Png), "page 3_region_007.png");
/// ```
pub fn region_crop_filename(stem: &str, index: usize, format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("img");
    format!("{}_region_{:03}.{}", sanitize_filename(stem), index, extension)
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathValidationError::EmptyPath => write!(f, "Path is empty"),
            PathValidationError::NullByte => write!(f, "Path contains null bytes"),
            PathValidationError::PathTooLong => write!(f, "Path is too long"),
            PathValidationError::FilenameTooLong => write!(f, "Filename is too long"),
            PathValidationError::MissingExtension => {
                write!(f, "Path has no extension and no format was given")
            }
            PathValidationError::UnsupportedFormat(format) => {
                write!(f, "Unsupported image format: {}", format)
            }
        }
    }
}

impl std::error::Error for PathValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_path_limits() {
        assert_eq!(validate_image_path(""), Err(PathValidationError::EmptyPath));
        assert_eq!(
            validate_image_path("a".repeat(MAX_PATH_LENGTH + 1)),
            Err(PathValidationError::PathTooLong)
        );
        assert_eq!(
            validate_image_path(format!("dir/{}.png", "b".repeat(MAX_FILENAME_LENGTH))),
            Err(PathValidationError::FilenameTooLong)
        );
        assert!(validate_image_path("/tmp/page.png").is_ok());
    }

    #[test]
    fn test_resolve_output_format_from_extension() {
        assert_eq!(resolve_output_format("a.jpg", None), Ok(ImageFormat::Jpeg));
        assert_eq!(resolve_output_format("a.JPEG", None), Ok(ImageFormat::Jpeg));
        assert_eq!(resolve_output_format("a.tiff", None), Ok(ImageFormat::Tiff));
        assert_eq!(
            resolve_output_format("a", None),
            Err(PathValidationError::MissingExtension)
        );
        assert!(matches!(
            resolve_output_format("a.doc", None),
            Err(PathValidationError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        assert_eq!(
            resolve_output_format("a.doc", Some(ImageFormat::Png)),
            Ok(ImageFormat::Png)
        );
    }

    #[test]
    fn test_parse_format_name() {
        assert_eq!(parse_format_name("PNG"), Ok(ImageFormat::Png));
        assert_eq!(parse_format_name(".bmp"), Ok(ImageFormat::Bmp));
        assert!(parse_format_name("pdf").is_err());
    }

    #[test]
    fn test_sanitize_filename_truncates_long_names() {
        let long = "é".repeat(200);
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.len() <= MAX_FILENAME_LENGTH / 2);
        assert!(sanitized.chars().all(|c| c == 'é'));
    }
}
