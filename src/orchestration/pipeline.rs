// Synchronous difference pipeline: normalize -> mask -> dilate -> extract
// -> group -> render -> composite -> package

use image::RgbImage;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::config::Config;
use crate::core::errors::PipelineResult;
use crate::core::settings::Settings;
use crate::core::types::{DiffResult, DimensionPolicy, DistanceMetric};
use crate::phases::{
    build_difference_mask, compose_side_by_side, dilate, extract_components, group_components,
    normalize, normalize_images, package, render_answer, NormalizedPair,
};

/// Deployment-level knobs that are not part of per-request settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub dimension_policy: DimensionPolicy,
    pub distance_metric: DistanceMetric,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            dimension_policy: config.dimension_policy(),
            distance_metric: config.distance_metric(),
        }
    }
}

/// Wall time spent in each stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub normalize: Duration,
    pub detect: Duration,
    pub group: Duration,
    pub render: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.normalize + self.detect + self.group + self.render
    }
}

/// Run the whole pipeline on two encoded images with default options
pub fn process(original: &[u8], modified: &[u8], settings: &Settings) -> PipelineResult<DiffResult> {
    process_with(original, modified, settings, &PipelineOptions::default())
}

/// Run the whole pipeline on two encoded images
pub fn process_with(
    original: &[u8],
    modified: &[u8],
    settings: &Settings,
    options: &PipelineOptions,
) -> PipelineResult<DiffResult> {
    run_timed(original, modified, settings, options).map(|(result, _)| result)
}

/// Run the pipeline on already-decoded buffers
pub fn process_images(
    original: RgbImage,
    modified: RgbImage,
    settings: &Settings,
    options: &PipelineOptions,
) -> PipelineResult<DiffResult> {
    let pair = normalize_images(original, modified, options.dimension_policy)?;
    let mut timings = StageTimings::default();
    Ok(run_stages(&pair, settings, options, &mut timings))
}

/// Like `process_with`, also reporting per-stage durations
pub fn run_timed(
    original: &[u8],
    modified: &[u8],
    settings: &Settings,
    options: &PipelineOptions,
) -> PipelineResult<(DiffResult, StageTimings)> {
    let mut timings = StageTimings::default();

    let start = Instant::now();
    let pair = normalize(original, modified, options.dimension_policy)?;
    timings.normalize = start.elapsed();

    let result = run_stages(&pair, settings, options, &mut timings);
    Ok((result, timings))
}

fn run_stages(
    pair: &NormalizedPair,
    settings: &Settings,
    options: &PipelineOptions,
    timings: &mut StageTimings,
) -> DiffResult {
    let settings = &settings.clamped();

    let start = Instant::now();
    let mask = build_difference_mask(
        &pair.original,
        &pair.modified,
        settings.threshold,
        options.distance_metric,
    );
    let changed = mask.count();
    let mask = dilate(&mask, settings.dilation_iter);
    let extraction = extract_components(&mask, settings.min_area);
    timings.detect = start.elapsed();
    debug!(
        "Mask: {} changed pixels, {} after dilation, {} labels, {} kept",
        changed,
        mask.count(),
        extraction.label_map.num_labels(),
        extraction.diff_count()
    );

    let start = Instant::now();
    let regions = group_components(&extraction.components, settings.touch_distance);
    timings.group = start.elapsed();

    let start = Instant::now();
    let answer = render_answer(&pair.original, &extraction.label_map, &regions, settings);
    let combined = compose_side_by_side(&pair.original, &pair.modified, settings);
    timings.render = start.elapsed();

    package(combined, answer, extraction.diff_count(), regions)
}
