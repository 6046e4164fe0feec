//! # Region Segmentation
//!
//! Turns a binary foreground mask (usually the dilated, preprocessed page)
//! into an ordered list of candidate content regions.
//!
//! Only external contours are considered: components nested inside the hole
//! of another component belong to their enclosing region. Regions are ordered
//! by `x + y` of their bounding box so the top-left-most block comes first.

use std::time::Instant;

use image::{DynamicImage, GenericImageView, GrayImage, Rgba};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::observability;

/// Overlay colour used for region rectangles on the annotated image.
pub const ANNOTATION_COLOR: Rgba<u8> = Rgba([12, 255, 36, 255]);

/// Overlay line thickness in pixels.
pub const ANNOTATION_THICKNESS: u32 = 2;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Key the segmenter sorts by.
    pub fn sort_key(&self) -> u64 {
        self.x as u64 + self.y as u64
    }

    fn of_contour(contour: &Contour<u32>) -> Option<Self> {
        let first = contour.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }
}

/// A cropped region of interest.
#[derive(Debug, Clone)]
pub struct Region {
    pub bbox: BoundingBox,
    /// Pixels of the source image inside `bbox`
    pub pixels: DynamicImage,
}

/// Size filtering for [`get_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// A region survives only if its height is strictly greater than this
    pub height_thresh: f64,
    /// A region survives only if its width is strictly greater than this
    pub width_thresh: f64,
    /// Replace both thresholds with the mean height/width of all detected contours
    pub use_average_thresh: bool,
}

impl SegmentOptions {
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("height_thresh", self.height_thresh),
            ("width_thresh", self.width_thresh),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::invalid(
                    name,
                    format!("threshold must be a finite non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Output of [`get_segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Copy of the source with a rectangle drawn around every retained region
    pub annotated: DynamicImage,
    /// Retained regions, ascending by `x + y`
    pub regions: Vec<Region>,
    /// Number of external contours found before filtering
    pub contours_detected: usize,
    /// Height threshold actually applied
    pub height_threshold: f64,
    /// Width threshold actually applied
    pub width_threshold: f64,
}

/// Detects external contours in `mask`, filters them by size and crops the
/// matching areas out of `source`.
///
/// Any non-zero mask pixel is foreground. `mask` and `source` must have the
/// same dimensions. A mask with no foreground yields an empty region list and
/// an unmodified copy of `source`; it is not an error.
///
/// # Errors
///
/// Returns `PipelineError::InvalidParameter` for negative or non-finite
/// thresholds, or when the mask and source sizes differ.
pub fn get_segment(
    mask: &DynamicImage,
    source: &DynamicImage,
    options: &SegmentOptions,
) -> PipelineResult<Segmentation> {
    options.validate()?;
    if mask.dimensions() != source.dimensions() {
        return Err(PipelineError::invalid(
            "mask",
            format!(
                "mask is {}x{} but source is {}x{}",
                mask.width(),
                mask.height(),
                source.width(),
                source.height()
            ),
        ));
    }

    let _span = observability::pipeline_span("segment").entered();
    let start_time = Instant::now();

    let mut boxes = external_bounding_boxes(&to_mask(mask));
    boxes.sort_by_key(BoundingBox::sort_key);

    let (height_threshold, width_threshold) = if options.use_average_thresh {
        average_dimensions(&boxes)
    } else {
        (options.height_thresh, options.width_thresh)
    };

    let mut annotated = source.clone();
    let regions: Vec<Region> = boxes
        .iter()
        .filter(|b| b.height as f64 > height_threshold && b.width as f64 > width_threshold)
        .map(|b| {
            draw_region_outline(&mut annotated, b);
            Region {
                bbox: *b,
                pixels: source.crop_imm(b.x, b.y, b.width, b.height),
            }
        })
        .collect();

    let duration = start_time.elapsed();
    observability::record_segmentation_metrics(boxes.len(), regions.len(), duration);

    info!(
        target: "page_segmentation",
        contours = boxes.len(),
        regions = regions.len(),
        height_threshold,
        width_threshold,
        duration_ms = duration.as_millis() as u64,
        "Segmentation completed"
    );

    Ok(Segmentation {
        annotated,
        regions,
        contours_detected: boxes.len(),
        height_threshold,
        width_threshold,
    })
}

fn to_mask(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(buf) => buf.clone(),
        other => other.to_luma8(),
    }
}

/// Bounding boxes of outer borders that have no enclosing border.
///
/// Tracing runs inside a one-pixel blank frame: `find_contours` reports a
/// component touching column 0 as a parentless hole, not an outer border.
fn external_bounding_boxes(mask: &GrayImage) -> Vec<BoundingBox> {
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut framed, mask, 1, 1);

    let contours = find_contours::<u32>(&framed);
    let boxes: Vec<BoundingBox> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(BoundingBox::of_contour)
        .map(|b| BoundingBox {
            x: b.x - 1,
            y: b.y - 1,
            ..b
        })
        .collect();

    debug!(
        target: "page_segmentation",
        "Found {} contours, {} external",
        contours.len(),
        boxes.len()
    );

    boxes
}

/// Mean `(height, width)` over `boxes`; `(0, 0)` when there are none.
fn average_dimensions(boxes: &[BoundingBox]) -> (f64, f64) {
    if boxes.is_empty() {
        return (0.0, 0.0);
    }
    let n = boxes.len() as f64;
    let height = boxes.iter().map(|b| b.height as f64).sum::<f64>() / n;
    let width = boxes.iter().map(|b| b.width as f64).sum::<f64>() / n;
    (height, width)
}

fn draw_region_outline(canvas: &mut DynamicImage, bbox: &BoundingBox) {
    for t in 0..ANNOTATION_THICKNESS {
        let rect = Rect::at(bbox.x as i32 - t as i32, bbox.y as i32 - t as i32)
            .of_size(bbox.width + 1 + 2 * t, bbox.height + 1 + 2 * t);
        draw_hollow_rect_mut(canvas, rect, ANNOTATION_COLOR);
    }
}
