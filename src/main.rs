use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use image::ImageFormat;
use page_segmenter::config::PipelineConfig;
use page_segmenter::observability;
use page_segmenter::path_validation::{region_crop_filename, sanitize_filename};
use page_segmenter::{save_image, ImageStore, SegmentationReport};
use tracing::info;

const USAGE: &str = "Usage: page-segmenter <image-path> [output-dir]";

/// Command-line arguments
struct Args {
    image_path: PathBuf,
    output_dir: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args_os().skip(1);
    let image_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Missing image path. {}", USAGE))?;
    let output_dir = args.next().map(PathBuf::from);
    if args.next().is_some() {
        return Err(anyhow::anyhow!("Too many arguments. {}", USAGE));
    }
    Ok(Args {
        image_path,
        output_dir,
    })
}

/// Load and validate configuration at startup
fn load_configuration(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env();
    if let Some(dir) = &args.output_dir {
        config.output.directory = dir.clone();
    }

    config.validate().map_err(|e| {
        anyhow::anyhow!("Configuration validation failed: {}. Please check your environment values.", e)
    })?;

    Ok(config)
}

fn output_path(dir: &Path, stem: &str, suffix: &str, format: ImageFormat) -> PathBuf {
    let extension = format.extensions_str().first().copied().unwrap_or("png");
    dir.join(format!("{}_{}.{}", stem, suffix, extension))
}

fn run(args: &Args, config: &PipelineConfig) -> Result<()> {
    let start_time = Instant::now();
    let format = config.output.image_format()?;
    let out_dir = &config.output.directory;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let stem = args
        .image_path
        .file_stem()
        .map(|s| sanitize_filename(&s.to_string_lossy()))
        .unwrap_or_else(|| "page".to_string());

    let mut store = ImageStore::load(&args.image_path)?;

    let cleaned = store.preprocess(&config.preprocess)?.clone();
    let mask = store.dilate(
        config.segmentation.dilate_kernel,
        config.segmentation.dilate_iterations,
        Some(&cleaned),
        false,
    )?;

    if config.output.write_intermediate {
        save_image(&cleaned, output_path(out_dir, &stem, "preprocessed", format), Some(format))?;
        save_image(&mask, output_path(out_dir, &stem, "mask", format), Some(format))?;
    }

    // Crops and annotation come from the untouched page, not the binary mask.
    let page = store.base_image().clone();
    let segmentation = store.segment(&mask, Some(&page), &config.segmentation.options(), false)?;

    let annotated_path = output_path(out_dir, &stem, "annotated", format);
    save_image(&segmentation.annotated, &annotated_path, Some(format))?;

    let mut crop_paths = Vec::new();
    if config.output.write_region_crops {
        for (index, region) in segmentation.regions.iter().enumerate() {
            let path = out_dir.join(region_crop_filename(&stem, index, format));
            save_image(&region.pixels, &path, Some(format))?;
            crop_paths.push(path);
        }
    }

    let report = SegmentationReport::from_segmentation(store.source_path(), &segmentation, &crop_paths);
    report.write_json(&out_dir.join("regions.json"))?;

    info!(
        source = %args.image_path.display(),
        regions = segmentation.regions.len(),
        annotated = %annotated_path.display(),
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Page segmented"
    );
    Ok(())
}

/// A pipeline failure takes precedence over a failed snapshot write.
fn merge_snapshot_result(run: Result<()>, snapshot: Result<()>) -> Result<()> {
    match (run, snapshot) {
        (Ok(()), snapshot) => snapshot,
        (Err(e), Err(snapshot_error)) => {
            tracing::warn!(error = %snapshot_error, "Metrics snapshot not written");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let args = parse_args()?;
    let config = load_configuration(&args)?;

    observability::init_tracing(&config.observability)?;
    info!("{}", config.summary());

    let metrics_handle = if config.observability.enable_metrics_export {
        Some(observability::init_metrics()?)
    } else {
        None
    };

    let result = run(&args, &config);

    match &metrics_handle {
        Some(handle) => {
            let snapshot =
                observability::write_metrics_snapshot(handle, &config.output.directory.join("metrics.prom"));
            merge_snapshot_result(result, snapshot)
        }
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_wins_over_snapshot_error() {
        let merged = merge_snapshot_result(Err(anyhow::anyhow!("decode failed")), Err(anyhow::anyhow!("disk full")));
        assert_eq!(merged.unwrap_err().to_string(), "decode failed");
    }

    #[test]
    fn test_snapshot_error_reported_after_clean_run() {
        let merged = merge_snapshot_result(Ok(()), Err(anyhow::anyhow!("disk full")));
        assert_eq!(merged.unwrap_err().to_string(), "disk full");
        assert!(merge_snapshot_result(Ok(()), Ok(())).is_ok());
    }
}
