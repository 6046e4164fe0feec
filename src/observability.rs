//! Observability module for logging, tracing spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable level and format
//! - Span helpers for pipeline stages and individual transforms
//! - Metrics recording with an optional Prometheus text snapshot

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

/// Initialize structured logging with tracing and configuration
///
/// Safe to call more than once; only the first subscriber is installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("page_segmenter={}", config.log_level).parse()?)
        .add_directive(format!("page_preprocessing={}", config.log_level).parse()?)
        .add_directive(format!("page_segmentation={}", config.log_level).parse()?);

    let installed = if config.use_pretty_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder. The handle renders the current snapshot.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Render the recorder's current state to `path` in Prometheus text format
pub fn write_metrics_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    std::fs::write(path, handle.render())
        .with_context(|| format!("Failed to write metrics snapshot to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Metrics snapshot written");
    Ok(())
}

/// Create a span for a multi-step pipeline stage (preprocess, segment)
pub fn pipeline_span(stage: &str) -> tracing::Span {
    tracing::info_span!("pipeline_stage", stage = stage, component = "pipeline")
}

/// Create a span for a single image transform
pub fn transform_span(operation: &str) -> tracing::Span {
    tracing::info_span!("transform", operation = operation, component = "preprocessing")
}

/// Record a completed transform
pub fn record_transform_metrics(operation: &str, duration: Duration) {
    let operation = operation.to_string();
    metrics::counter!("transform_operations_total", "operation" => operation.clone()).increment(1);
    metrics::histogram!("transform_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record segmentation results
pub fn record_segmentation_metrics(contours: usize, regions: usize, duration: Duration) {
    metrics::counter!("segmentation_regions_total").increment(regions as u64);
    metrics::histogram!("segmentation_contours_detected").record(contours as f64);
    metrics::histogram!("segmentation_duration_seconds").record(duration.as_secs_f64());
}

/// Record image decode/encode metrics
pub fn record_image_io_metrics(operation: &str, success: bool, duration: Duration) {
    let operation = operation.to_string();
    let result = if success { "success" } else { "failure" };
    metrics::counter!("image_io_operations_total", "operation" => operation.clone(), "result" => result)
        .increment(1);
    metrics::histogram!("image_io_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record a failure by error kind and the component that raised it
pub fn record_error_metrics(kind: &str, component: &str) {
    let kind = kind.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "kind" => kind, "component" => component).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_ok() {
        let config = ObservabilityConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_init_tracing_rejects_bad_level() {
        let config = ObservabilityConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_recorders_without_installed_recorder() {
        // With no global recorder the macros are no-ops.
        record_transform_metrics("blur", Duration::from_millis(3));
        record_segmentation_metrics(4, 2, Duration::from_millis(5));
        record_image_io_metrics("load", false, Duration::ZERO);
        record_error_metrics("invalid_parameter", "dilate");
    }
}
