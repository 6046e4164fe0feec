//! # Segmentation Report
//!
//! JSON summary of one segmented page, written next to the annotated image so
//! downstream consumers (OCR, layout analysis) can pick up regions without
//! re-running the pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};
use crate::segmentation::Segmentation;

/// One retained region, in segmentation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Where the crop was written, if crops were saved
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub crop_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub source: Option<PathBuf>,
    pub generated_at: DateTime<Utc>,
    pub image_width: u32,
    pub image_height: u32,
    pub contours_detected: usize,
    pub height_threshold: f64,
    pub width_threshold: f64,
    pub regions: Vec<RegionRecord>,
}

impl SegmentationReport {
    /// Builds a report for `segmentation`. `crop_paths` is matched to regions
    /// by position; missing entries leave `crop_path` empty.
    pub fn from_segmentation(
        source: Option<&Path>,
        segmentation: &Segmentation,
        crop_paths: &[PathBuf],
    ) -> Self {
        let regions = segmentation
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| RegionRecord {
                index,
                x: region.bbox.x,
                y: region.bbox.y,
                width: region.bbox.width,
                height: region.bbox.height,
                crop_path: crop_paths.get(index).cloned(),
            })
            .collect();

        Self {
            source: source.map(Path::to_path_buf),
            generated_at: Utc::now(),
            image_width: segmentation.annotated.width(),
            image_height: segmentation.annotated.height(),
            contours_detected: segmentation.contours_detected,
            height_threshold: segmentation.height_threshold,
            width_threshold: segmentation.width_threshold,
            regions,
        }
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Report {
            path: self
                .source
                .as_deref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            message: e.to_string(),
        })
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| PipelineError::Report {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(
            target: "page_segmentation",
            path = %path.display(),
            regions = self.regions.len(),
            "Segmentation report written"
        );
        Ok(())
    }
}
