//! # Image Store
//!
//! Owns the state of one page: an immutable base image decoded at load time
//! and a mutable working image that chained operations read from and,
//! when asked, write back into.
//!
//! Every transform and the segmenter accept an optional explicit image. The
//! rule is the same everywhere: [`ImageStore::resolve_image`] falls back to
//! the working image when no image is given, and [`ImageStore::commit`]
//! replaces the working image only when `inplace` is true. Transforms never
//! mutate the store otherwise.
//!
//! One store serves one page. To process pages in parallel, give each its
//! own store; nothing here is shared between instances.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::errors::{error_logging, PipelineError, PipelineResult};
use crate::observability;
use crate::path_validation::{resolve_output_format, validate_image_path};
use crate::preprocessing::{self, DenoiseParams, Kernel, PreprocessParams, ThresholdParams};
use crate::segmentation::{self, SegmentOptions, Segmentation};

/// Base/working image pair for a single page.
#[derive(Debug, Clone)]
pub struct ImageStore {
    source_path: Option<PathBuf>,
    base: DynamicImage,
    working: DynamicImage,
}

impl ImageStore {
    /// Decodes the image at `path` and initialises the working image as an
    /// independent copy of it.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ImageLoad` if the path is invalid, missing,
    /// unreadable, or not a decodable raster.
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let base = decode(path)?;
        Ok(Self {
            source_path: Some(path.to_path_buf()),
            working: base.clone(),
            base,
        })
    }

    /// Wraps an already decoded image. The store has no source path, so
    /// [`ImageStore::reload`] and path-less [`ImageStore::save`] fail.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            source_path: None,
            working: image.clone(),
            base: image,
        }
    }

    /// Re-decodes from `path`, or from the path this store was loaded from,
    /// replacing both base and working images.
    pub fn reload(&mut self, path: Option<&Path>) -> PipelineResult<()> {
        let path = match (path, &self.source_path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(source)) => source.clone(),
            (None, None) => {
                return Err(PipelineError::ImageLoad {
                    path: String::new(),
                    message: "no path given and the store was not loaded from a file".to_string(),
                })
            }
        };
        let base = decode(&path)?;
        self.working = base.clone();
        self.base = base;
        self.source_path = Some(path);
        Ok(())
    }

    /// The image decoded at load time. Never mutated by any operation.
    pub fn base_image(&self) -> &DynamicImage {
        &self.base
    }

    /// The current working image.
    pub fn working_image(&self) -> &DynamicImage {
        &self.working
    }

    /// Path the base image was decoded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Restores the working image to a fresh copy of the base image.
    pub fn reset(&mut self) {
        self.working = self.base.clone();
        debug!(target: "page_preprocessing", "Working image reset to base image");
    }

    /// Encodes `image` (default: the working image) to `path` (default: the
    /// source path). The format comes from `format` or from the extension.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ImageSave` when no destination can be
    /// determined, the format is unsupported, or the write fails.
    pub fn save(
        &self,
        path: Option<&Path>,
        image: Option<&DynamicImage>,
        format: Option<ImageFormat>,
    ) -> PipelineResult<PathBuf> {
        let path = match (path, &self.source_path) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(source)) => source.clone(),
            (None, None) => {
                return Err(PipelineError::ImageSave {
                    path: String::new(),
                    message: "no path given and the store was not loaded from a file".to_string(),
                })
            }
        };
        save_image(self.resolve_image(image), &path, format)?;
        Ok(path)
    }

    /// Returns `candidate` when given, otherwise the working image.
    pub fn resolve_image<'a>(&'a self, candidate: Option<&'a DynamicImage>) -> &'a DynamicImage {
        candidate.unwrap_or(&self.working)
    }

    /// Replaces the working image with `result` when `inplace` is true, and
    /// hands `result` back either way.
    pub fn commit(&mut self, result: DynamicImage, inplace: bool) -> DynamicImage {
        if inplace {
            self.working = result.clone();
        }
        result
    }

    /// Bitwise complement. See [`preprocessing::invert`].
    pub fn invert(&mut self, image: Option<&DynamicImage>, inplace: bool) -> DynamicImage {
        let out = run_infallible("invert", || preprocessing::invert(self.resolve_image(image)));
        self.commit(out, inplace)
    }

    /// Single-channel luma. The *output* is committed when `inplace` is set.
    pub fn grayscale(&mut self, image: Option<&DynamicImage>, inplace: bool) -> DynamicImage {
        let out = run_infallible("grayscale", || preprocessing::grayscale(self.resolve_image(image)));
        self.commit(out, inplace)
    }

    /// Gaussian smoothing with an odd `kernel`.
    pub fn blur(
        &mut self,
        kernel: Kernel,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("blur", || preprocessing::blur(self.resolve_image(image), kernel))?;
        Ok(self.commit(out, inplace))
    }

    /// Otsu inverted-binary threshold.
    pub fn threshold(
        &mut self,
        params: ThresholdParams,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("threshold", || {
            preprocessing::apply_otsu_threshold(self.resolve_image(image), params)
                .map(|result| result.image)
        })?;
        Ok(self.commit(out, inplace))
    }

    /// Dilate → erode → median.
    pub fn denoise(
        &mut self,
        params: &DenoiseParams,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("denoise", || preprocessing::denoise(self.resolve_image(image), params))?;
        Ok(self.commit(out, inplace))
    }

    /// Thins dark strokes.
    pub fn thin_font(
        &mut self,
        kernel: Kernel,
        iterations: u32,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("thin_font", || {
            preprocessing::thin_font(self.resolve_image(image), kernel, iterations)
        })?;
        Ok(self.commit(out, inplace))
    }

    /// Thickens dark strokes.
    pub fn thicken_font(
        &mut self,
        kernel: Kernel,
        iterations: u32,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("thicken_font", || {
            preprocessing::thicken_font(self.resolve_image(image), kernel, iterations)
        })?;
        Ok(self.commit(out, inplace))
    }

    /// Direct dilation, typically used to merge glyphs into blobs before
    /// segmentation.
    pub fn dilate(
        &mut self,
        kernel: Kernel,
        iterations: u32,
        image: Option<&DynamicImage>,
        inplace: bool,
    ) -> PipelineResult<DynamicImage> {
        let out = run_transform("dilate", || {
            preprocessing::dilate(self.resolve_image(image), kernel, iterations)
        })?;
        Ok(self.commit(out, inplace))
    }

    /// Grayscale → threshold → denoise on the working image.
    ///
    /// This is the one operation that commits unconditionally: every step
    /// behaves as if `inplace` were true, so afterwards the working image is
    /// the cleaned binary page. All parameters are validated first; on error
    /// the working image is untouched.
    pub fn preprocess(&mut self, params: &PreprocessParams) -> PipelineResult<&DynamicImage> {
        if let Err(e) = params.validate() {
            error_logging::log_parameter_error(&e, "preprocess");
            return Err(e);
        }
        let _span = observability::pipeline_span("preprocess").entered();
        let start_time = Instant::now();

        self.grayscale(None, true);
        self.threshold(params.threshold, None, true)?;
        self.denoise(&params.denoise, None, true)?;

        info!(
            target: "page_preprocessing",
            duration_ms = start_time.elapsed().as_millis() as u64,
            width = self.working.width(),
            height = self.working.height(),
            "Preprocessing chain completed"
        );
        Ok(&self.working)
    }

    /// Segments `mask` into regions cropped from `source` (default: the
    /// working image). With `inplace`, the annotated copy becomes the working
    /// image.
    pub fn segment(
        &mut self,
        mask: &DynamicImage,
        source: Option<&DynamicImage>,
        options: &SegmentOptions,
        inplace: bool,
    ) -> PipelineResult<Segmentation> {
        let result = segmentation::get_segment(mask, self.resolve_image(source), options)?;
        if inplace {
            self.working = result.annotated.clone();
        }
        Ok(result)
    }
}

fn run_infallible<F>(operation: &str, f: F) -> DynamicImage
where
    F: FnOnce() -> DynamicImage,
{
    let _span = observability::transform_span(operation).entered();
    let start_time = Instant::now();
    let out = f();
    observability::record_transform_metrics(operation, start_time.elapsed());
    out
}

/// Times a fallible transform, records metrics and logs parameter failures.
fn run_transform<F>(operation: &str, f: F) -> PipelineResult<DynamicImage>
where
    F: FnOnce() -> PipelineResult<DynamicImage>,
{
    let _span = observability::transform_span(operation).entered();
    let start_time = Instant::now();
    let result = f();
    match &result {
        Ok(_) => observability::record_transform_metrics(operation, start_time.elapsed()),
        Err(e) => {
            error_logging::log_parameter_error(e, operation);
            observability::record_error_metrics(e.kind(), operation);
        }
    }
    result
}

fn decode(path: &Path) -> PipelineResult<DynamicImage> {
    let start_time = Instant::now();
    let path_str = path.to_string_lossy().to_string();

    let result = validate_image_path(path)
        .map_err(|e| e.to_string())
        .and_then(|_| image::open(path).map_err(|e| e.to_string()));

    match result {
        Ok(image) => {
            observability::record_image_io_metrics("load", true, start_time.elapsed());
            info!(
                target: "page_preprocessing",
                path = %path_str,
                width = image.width(),
                height = image.height(),
                color = ?image.color(),
                "Loaded page image"
            );
            Ok(image)
        }
        Err(message) => {
            let err = PipelineError::ImageLoad {
                path: path_str.clone(),
                message,
            };
            observability::record_image_io_metrics("load", false, start_time.elapsed());
            error_logging::log_image_io_error(&err, "load", Some(&path_str), Some(start_time.elapsed()));
            Err(err)
        }
    }
}

/// Encodes `image` to `path`. The format is `format` or the one implied by
/// the extension.
///
/// # Errors
///
/// Returns `PipelineError::ImageSave` if the format is unsupported or the
/// destination cannot be written.
pub fn save_image(
    image: &DynamicImage,
    path: impl AsRef<Path>,
    format: Option<ImageFormat>,
) -> PipelineResult<()> {
    let path = path.as_ref();
    let start_time = Instant::now();
    let path_str = path.to_string_lossy().to_string();

    let result = resolve_output_format(path, format)
        .map_err(|e| e.to_string())
        .and_then(|format| {
            encodable(image, format)
                .save_with_format(path, format)
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(()) => {
            observability::record_image_io_metrics("save", true, start_time.elapsed());
            debug!(target: "page_preprocessing", path = %path_str, "Saved image");
            Ok(())
        }
        Err(message) => {
            let err = PipelineError::ImageSave {
                path: path_str.clone(),
                message,
            };
            observability::record_image_io_metrics("save", false, start_time.elapsed());
            error_logging::log_image_io_error(&err, "save", Some(&path_str), Some(start_time.elapsed()));
            Err(err)
        }
    }
}

/// JPEG has no alpha channel; drop it rather than fail the write.
fn encodable(image: &DynamicImage, format: ImageFormat) -> std::borrow::Cow<'_, DynamicImage> {
    if format == ImageFormat::Jpeg && image.color().has_alpha() {
        std::borrow::Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8()))
    } else {
        std::borrow::Cow::Borrowed(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(20, 10, |x, _| {
            if x < 10 {
                Rgb([20, 20, 20])
            } else {
                Rgb([240, 240, 240])
            }
        }))
    }

    #[test]
    fn test_resolve_image_falls_back_to_working() {
        let store = ImageStore::from_image(page());
        let other = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        assert_eq!(store.resolve_image(None), store.working_image());
        assert_eq!(store.resolve_image(Some(&other)), &other);
    }

    #[test]
    fn test_commit_only_when_inplace() {
        let mut store = ImageStore::from_image(page());
        let replacement = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([7])));

        let returned = store.commit(replacement.clone(), false);
        assert_eq!(returned, replacement);
        assert_eq!(store.working_image(), &page());

        store.commit(replacement.clone(), true);
        assert_eq!(store.working_image(), &replacement);
    }

    #[test]
    fn test_pure_transform_leaves_working_image() {
        let mut store = ImageStore::from_image(page());
        let inverted = store.invert(None, false);
        assert_ne!(&inverted, store.working_image());
        assert_eq!(store.working_image(), &page());
    }

    #[test]
    fn test_grayscale_commits_output_not_input() {
        let mut store = ImageStore::from_image(page());
        let gray = store.grayscale(None, true);
        assert_eq!(gray.color(), image::ColorType::L8);
        assert_eq!(store.working_image(), &gray);
        assert_eq!(store.base_image(), &page());
    }

    #[test]
    fn test_reset_restores_independent_copy() {
        let mut store = ImageStore::from_image(page());
        store.invert(None, true);
        assert_ne!(store.working_image(), store.base_image());

        store.reset();
        assert_eq!(store.working_image(), store.base_image());

        store.invert(None, true);
        assert_eq!(store.base_image(), &page());
    }

    #[test]
    fn test_invalid_parameters_do_not_mutate() {
        let mut store = ImageStore::from_image(page());
        let bad = PreprocessParams {
            threshold: ThresholdParams { low: 252, high: 252 },
            ..Default::default()
        };
        assert!(matches!(
            store.preprocess(&bad),
            Err(PipelineError::InvalidParameter { .. })
        ));
        assert_eq!(store.working_image(), &page());

        let zero = Kernel { width: 0, height: 3 };
        assert!(store.dilate(zero, 1, None, true).is_err());
        assert_eq!(store.working_image(), &page());
    }

    #[test]
    fn test_preprocess_commits_every_step() {
        let mut store = ImageStore::from_image(page());
        let working = store.preprocess(&PreprocessParams::default()).unwrap().clone();
        assert_eq!(working.color(), image::ColorType::L8);
        let buf = working.to_luma8();
        assert_eq!(buf.get_pixel(2, 5)[0], 252);
        assert_eq!(buf.get_pixel(17, 5)[0], 0);
        assert_eq!(store.base_image(), &page());
    }

    #[test]
    fn test_reload_and_save_need_a_path() {
        let mut store = ImageStore::from_image(page());
        assert!(matches!(store.reload(None), Err(PipelineError::ImageLoad { .. })));
        assert!(matches!(
            store.save(None, None, None),
            Err(PipelineError::ImageSave { .. })
        ));
    }
}
