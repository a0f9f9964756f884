use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::orchestration::pipeline::StageTimings;

/// Duration samples kept per series; older samples are dropped
const MAX_SAMPLES: usize = 4096;

/// Global metrics collector for the service.
///
/// Tracks job outcomes, detection counts, stage durations and per-endpoint
/// traffic. Cheap to clone and safe to share across handlers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Job metrics
    jobs_total: AtomicUsize,
    jobs_success: AtomicUsize,
    jobs_failed: AtomicUsize,
    payloads_rejected: AtomicUsize,
    bytes_received: AtomicU64,
    job_latency_ms: RwLock<Vec<u64>>,

    // Detection metrics
    image_pairs_processed: AtomicUsize,
    differences_found: AtomicUsize,
    regions_created: AtomicUsize,

    // Stage metrics
    normalize_duration_ms: RwLock<Vec<u64>>,
    detect_duration_ms: RwLock<Vec<u64>>,
    group_duration_ms: RwLock<Vec<u64>>,
    render_duration_ms: RwLock<Vec<u64>>,

    archives_built: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

fn push_sample(series: &RwLock<Vec<u64>>, duration: Duration) {
    let mut samples = series.write();
    if samples.len() >= MAX_SAMPLES {
        samples.drain(..MAX_SAMPLES / 2);
    }
    samples.push(duration.as_millis() as u64);
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                jobs_total: AtomicUsize::new(0),
                jobs_success: AtomicUsize::new(0),
                jobs_failed: AtomicUsize::new(0),
                payloads_rejected: AtomicUsize::new(0),
                bytes_received: AtomicU64::new(0),
                job_latency_ms: RwLock::new(Vec::new()),
                image_pairs_processed: AtomicUsize::new(0),
                differences_found: AtomicUsize::new(0),
                regions_created: AtomicUsize::new(0),
                normalize_duration_ms: RwLock::new(Vec::new()),
                detect_duration_ms: RwLock::new(Vec::new()),
                group_duration_ms: RwLock::new(Vec::new()),
                render_duration_ms: RwLock::new(Vec::new()),
                archives_built: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Job metrics
    pub fn record_job(&self, success: bool, duration: Duration, bytes: u64) {
        self.inner.jobs_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.jobs_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        push_sample(&self.inner.job_latency_ms, duration);
    }

    pub fn record_payload_rejected(&self) {
        self.inner.payloads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Detection metrics
    pub fn record_detection(&self, diff_count: usize, circles_created: usize) {
        self.inner.image_pairs_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.differences_found.fetch_add(diff_count, Ordering::Relaxed);
        self.inner.regions_created.fetch_add(circles_created, Ordering::Relaxed);
    }

    // Stage metrics
    pub fn record_stage_timings(&self, timings: &StageTimings) {
        push_sample(&self.inner.normalize_duration_ms, timings.normalize);
        push_sample(&self.inner.detect_duration_ms, timings.detect);
        push_sample(&self.inner.group_duration_ms, timings.group);
        push_sample(&self.inner.render_duration_ms, timings.render);
    }

    pub fn record_archive_built(&self) {
        self.inner.archives_built.fetch_add(1, Ordering::Relaxed);
    }

    // Endpoint metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner.endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.job_latency_ms.read();
        let job_latency_avg = avg(&latency);
        let job_latency_p50 = percentile(&latency, 0.5);
        let job_latency_p95 = percentile(&latency, 0.95);
        let job_latency_p99 = percentile(&latency, 0.99);
        drop(latency);

        let normalize_avg = avg(&self.inner.normalize_duration_ms.read());
        let detect_avg = avg(&self.inner.detect_duration_ms.read());
        let group_avg = avg(&self.inner.group_duration_ms.read());
        let render_avg = avg(&self.inner.render_duration_ms.read());

        let endpoint_requests = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            jobs_total: self.inner.jobs_total.load(Ordering::Relaxed),
            jobs_success: self.inner.jobs_success.load(Ordering::Relaxed),
            jobs_failed: self.inner.jobs_failed.load(Ordering::Relaxed),
            payloads_rejected: self.inner.payloads_rejected.load(Ordering::Relaxed),
            bytes_received: self.inner.bytes_received.load(Ordering::Relaxed),
            job_latency_avg_ms: job_latency_avg,
            job_latency_p50_ms: job_latency_p50,
            job_latency_p95_ms: job_latency_p95,
            job_latency_p99_ms: job_latency_p99,
            image_pairs_processed: self.inner.image_pairs_processed.load(Ordering::Relaxed),
            differences_found: self.inner.differences_found.load(Ordering::Relaxed),
            regions_created: self.inner.regions_created.load(Ordering::Relaxed),
            normalize_avg_ms: normalize_avg,
            detect_avg_ms: detect_avg,
            group_avg_ms: group_avg,
            render_avg_ms: render_avg,
            archives_built: self.inner.archives_built.load(Ordering::Relaxed),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP spotdiff_jobs_total Total number of difference jobs
# TYPE spotdiff_jobs_total counter
spotdiff_jobs_total {}

# HELP spotdiff_jobs_success Number of jobs that produced a result
# TYPE spotdiff_jobs_success counter
spotdiff_jobs_success {}

# HELP spotdiff_jobs_failed Number of jobs that failed
# TYPE spotdiff_jobs_failed counter
spotdiff_jobs_failed {}

# HELP spotdiff_payloads_rejected_total Uploads refused for exceeding the size limit
# TYPE spotdiff_payloads_rejected_total counter
spotdiff_payloads_rejected_total {}

# HELP spotdiff_bytes_received_total Image bytes accepted for processing
# TYPE spotdiff_bytes_received_total counter
spotdiff_bytes_received_total {}

# HELP spotdiff_job_latency_avg_ms Average job latency in milliseconds
# TYPE spotdiff_job_latency_avg_ms gauge
spotdiff_job_latency_avg_ms {}

# HELP spotdiff_differences_found_total Components kept after the area filter
# TYPE spotdiff_differences_found_total counter
spotdiff_differences_found_total {}

# HELP spotdiff_regions_created_total Circles drawn after merging
# TYPE spotdiff_regions_created_total counter
spotdiff_regions_created_total {}

# HELP spotdiff_stage_avg_duration_ms Average stage duration in milliseconds
# TYPE spotdiff_stage_avg_duration_ms gauge
spotdiff_stage_avg_duration_ms{{stage="normalize"}} {}
spotdiff_stage_avg_duration_ms{{stage="detect"}} {}
spotdiff_stage_avg_duration_ms{{stage="group"}} {}
spotdiff_stage_avg_duration_ms{{stage="render"}} {}

# HELP spotdiff_archives_built_total Result archives produced
# TYPE spotdiff_archives_built_total counter
spotdiff_archives_built_total {}

# HELP spotdiff_uptime_seconds Application uptime in seconds
# TYPE spotdiff_uptime_seconds counter
spotdiff_uptime_seconds {}
"#,
            snapshot.jobs_total,
            snapshot.jobs_success,
            snapshot.jobs_failed,
            snapshot.payloads_rejected,
            snapshot.bytes_received,
            snapshot.job_latency_avg_ms,
            snapshot.differences_found,
            snapshot.regions_created,
            snapshot.normalize_avg_ms,
            snapshot.detect_avg_ms,
            snapshot.group_avg_ms,
            snapshot.render_avg_ms,
            snapshot.archives_built,
            snapshot.uptime_seconds,
        );

        if !snapshot.endpoint_requests.is_empty() {
            out.push_str("\n# HELP spotdiff_endpoint_requests_total Requests per endpoint\n");
            out.push_str("# TYPE spotdiff_endpoint_requests_total counter\n");
            for (endpoint, count) in &snapshot.endpoint_requests {
                out.push_str(&format!(
                    "spotdiff_endpoint_requests_total{{endpoint=\"{}\"}} {}\n",
                    endpoint, count
                ));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_total: usize,
    pub jobs_success: usize,
    pub jobs_failed: usize,
    pub payloads_rejected: usize,
    pub bytes_received: u64,
    pub job_latency_avg_ms: u64,
    pub job_latency_p50_ms: u64,
    pub job_latency_p95_ms: u64,
    pub job_latency_p99_ms: u64,
    pub image_pairs_processed: usize,
    pub differences_found: usize,
    pub regions_created: usize,
    pub normalize_avg_ms: u64,
    pub detect_avg_ms: u64,
    pub group_avg_ms: u64,
    pub render_avg_ms: u64,
    pub archives_built: usize,
    pub endpoint_requests: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_job(true, Duration::from_millis(100), 2048);
        metrics.record_job(false, Duration::from_millis(50), 0);
        metrics.record_payload_rejected();
        metrics.record_detection(5, 3);
        metrics.record_detection(2, 2);
        metrics.record_endpoint_request("/process");
        metrics.record_endpoint_request("/process");
        metrics.record_endpoint_request("/health");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_total, 2);
        assert_eq!(snapshot.jobs_success, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.payloads_rejected, 1);
        assert_eq!(snapshot.bytes_received, 2048);
        assert_eq!(snapshot.job_latency_avg_ms, 75);
        assert_eq!(snapshot.image_pairs_processed, 2);
        assert_eq!(snapshot.differences_found, 7);
        assert_eq!(snapshot.regions_created, 5);
        assert_eq!(snapshot.endpoint_requests.get("/process"), Some(&2));
        assert_eq!(snapshot.endpoint_requests.get("/health"), Some(&1));
    }

    #[test]
    fn test_stage_averages() {
        let metrics = Metrics::new();
        let timings = StageTimings {
            normalize: Duration::from_millis(10),
            detect: Duration::from_millis(20),
            group: Duration::from_millis(2),
            render: Duration::from_millis(8),
        };
        metrics.record_stage_timings(&timings);
        metrics.record_stage_timings(&StageTimings {
            detect: Duration::from_millis(40),
            ..timings
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.normalize_avg_ms, 10);
        assert_eq!(snapshot.detect_avg_ms, 30);
        assert_eq!(snapshot.render_avg_ms, 8);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..(MAX_SAMPLES + 10) {
            metrics.record_job(true, Duration::from_millis(1), 0);
        }
        assert!(metrics.inner.job_latency_ms.read().len() <= MAX_SAMPLES);
        assert_eq!(metrics.snapshot().jobs_total, MAX_SAMPLES + 10);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_job(true, Duration::from_millis(100), 512);
        metrics.record_detection(4, 2);
        metrics.record_endpoint_request("/process");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("spotdiff_jobs_total 1"));
        assert!(prometheus.contains("spotdiff_differences_found_total 4"));
        assert!(prometheus.contains("spotdiff_regions_created_total 2"));
        assert!(prometheus.contains("spotdiff_stage_avg_duration_ms{stage=\"detect\"} 0"));
        assert!(prometheus.contains("spotdiff_endpoint_requests_total{endpoint=\"/process\"} 1"));
    }
}
