// Diff Orchestrator: runs the pipeline for HTTP requests

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::settings::Settings;
use crate::core::types::{ProcessResponse, RegionSummary};
use crate::orchestration::pipeline::{run_timed, PipelineOptions};
use crate::utils::image_ops::{encode_jpeg, to_data_url, JPEG_MIME};
use crate::utils::Metrics;

/// Bounds concurrent pipeline runs and moves them off the async runtime
pub struct DiffOrchestrator {
    config: Arc<Config>,
    options: PipelineOptions,
    job_semaphore: Arc<Semaphore>,
    metrics: Metrics,
}

impl DiffOrchestrator {
    pub fn new(config: Arc<Config>, metrics: Metrics) -> Self {
        let options = PipelineOptions::from(config.as_ref());
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs()));

        info!(
            "✓ Ready (jobs: {}, dimension policy: {:?}, metric: {:?}, jpeg quality: {})",
            config.max_concurrent_jobs(),
            options.dimension_policy,
            options.distance_metric,
            config.jpeg_quality()
        );

        Self {
            config,
            options,
            job_semaphore,
            metrics,
        }
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.config.max_concurrent_jobs()
    }

    /// Job slots currently free
    pub fn available_slots(&self) -> usize {
        self.job_semaphore.available_permits()
    }

    /// Run one difference job and build the `/process` response.
    ///
    /// The size check happens before anything is decoded. The pipeline and
    /// both JPEG encodes run on a blocking thread while holding a job slot.
    #[instrument(skip(self, original, modified, settings), fields(
        original_bytes = original.len(),
        modified_bytes = modified.len()
    ))]
    pub async fn process(
        &self,
        original: Vec<u8>,
        modified: Vec<u8>,
        settings: Settings,
    ) -> PipelineResult<ProcessResponse> {
        let size = original.len() + modified.len();
        let limit = self.config.max_upload_bytes();
        if size > limit {
            self.metrics.record_payload_rejected();
            warn!("Rejecting upload of {} bytes (limit {})", size, limit);
            return Err(PipelineError::PayloadTooLarge { size, limit });
        }

        let _permit = self
            .job_semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::TaskJoinFailed(e.to_string()))?;

        let start = Instant::now();
        let options = self.options;
        let quality = self.config.jpeg_quality();
        debug!("Settings: {:?}", settings);

        let outcome = tokio::task::spawn_blocking(move || {
            let (result, timings) = run_timed(&original, &modified, &settings, &options)?;
            let combined = encode_jpeg(&result.combined, quality)?;
            let answer = encode_jpeg(&result.answer, quality)?;
            Ok::<_, PipelineError>((result, timings, combined, answer))
        })
        .await
        .map_err(|e| PipelineError::TaskJoinFailed(e.to_string()))
        .and_then(|inner| inner);

        let elapsed = start.elapsed();
        let (result, timings, combined, answer) = match outcome {
            Ok(done) => done,
            Err(e) => {
                self.metrics.record_job(false, elapsed, size as u64);
                if e.is_client_error() {
                    warn!("Job rejected: {}", e);
                } else {
                    tracing::error!("Job failed: {:?}", e);
                }
                return Err(e);
            }
        };

        self.metrics.record_job(true, elapsed, size as u64);
        self.metrics.record_stage_timings(&timings);
        self.metrics
            .record_detection(result.diff_count, result.circles_created);

        let (width, height) = result.answer.dimensions();
        info!(
            "Found {} differences in {} circles ({}x{}) in {:.2}ms",
            result.diff_count,
            result.circles_created,
            width,
            height,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok(ProcessResponse {
            combined_image: to_data_url(JPEG_MIME, &combined),
            answer_image: to_data_url(JPEG_MIME, &answer),
            diff_count: result.diff_count,
            circles_created: result.circles_created,
            width,
            height,
            regions: result.regions.iter().map(RegionSummary::from).collect(),
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::image_ops::{decode_data_url, encode_png};
    use image::{Rgb, RgbImage};

    fn orchestrator(config: Config) -> (DiffOrchestrator, Metrics) {
        let metrics = Metrics::new();
        (DiffOrchestrator::new(Arc::new(config), metrics.clone()), metrics)
    }

    fn pair() -> (Vec<u8>, Vec<u8>) {
        let original = RgbImage::from_pixel(64, 48, Rgb([0, 0, 0]));
        let mut modified = original.clone();
        for y in 10..22 {
            for x in 30..42 {
                modified.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        (encode_png(&original).unwrap(), encode_png(&modified).unwrap())
    }

    #[tokio::test]
    async fn test_process_builds_response() {
        let (orchestrator, metrics) = orchestrator(Config::default());
        let (original, modified) = pair();

        let response = orchestrator
            .process(original, modified, Settings::default())
            .await
            .unwrap();

        assert_eq!(response.diff_count, 1);
        assert_eq!(response.circles_created, 1);
        assert_eq!((response.width, response.height), (64, 48));
        assert_eq!(response.regions.len(), 1);
        assert_eq!(response.regions[0].id, 1);
        assert!(response.answer_image.starts_with("data:image/jpeg;base64,"));

        let combined = decode_data_url(&response.combined_image).unwrap();
        let combined = image::load_from_memory(&combined).unwrap();
        assert_eq!(combined.width(), 64 * 2 + Settings::default().image_spacing);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_success, 1);
        assert_eq!(snapshot.regions_created, 1);
        assert_eq!(orchestrator.available_slots(), orchestrator.max_concurrent_jobs());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_before_decode() {
        let mut config = Config::default();
        config.limits.max_upload_bytes = 16;
        let (orchestrator, metrics) = orchestrator(config);

        let err = orchestrator
            .process(vec![0; 10], vec![0; 10], Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PayloadTooLarge { size: 20, limit: 16 }));
        assert_eq!(metrics.snapshot().payloads_rejected, 1);
        assert_eq!(metrics.snapshot().jobs_total, 0);
    }

    #[tokio::test]
    async fn test_decode_failure_is_recorded() {
        let (orchestrator, metrics) = orchestrator(Config::default());
        let (original, _) = pair();

        let err = orchestrator
            .process(original, b"garbage".to_vec(), Settings::default())
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(metrics.snapshot().jobs_failed, 1);
    }
}
