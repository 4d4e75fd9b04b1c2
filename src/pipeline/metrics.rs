// src/pipeline/metrics.rs
//
// Counters for one recognition session. Clones share the same
// counters, so a reporter task can read while the frame loop writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub frames_seen: Arc<AtomicU64>,
    pub frames_dropped_busy: Arc<AtomicU64>,
    pub frames_applied: Arc<AtomicU64>,
    pub stale_results: Arc<AtomicU64>,
    pub decode_failures: Arc<AtomicU64>,
    pub idle_frames: Arc<AtomicU64>,
    pub steps_advanced: Arc<AtomicU64>,
    pub completions: Arc<AtomicU64>,
    pub resets: Arc<AtomicU64>,
    pub last_inference_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            frames_seen: Arc::new(AtomicU64::new(0)),
            frames_dropped_busy: Arc::new(AtomicU64::new(0)),
            frames_applied: Arc::new(AtomicU64::new(0)),
            stale_results: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            idle_frames: Arc::new(AtomicU64::new(0)),
            steps_advanced: Arc::new(AtomicU64::new(0)),
            completions: Arc::new(AtomicU64::new(0)),
            resets: Arc::new(AtomicU64::new(0)),
            last_inference_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_dropped_busy: self.frames_dropped_busy.load(Ordering::Relaxed),
            frames_applied: self.frames_applied.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            idle_frames: self.idle_frames.load(Ordering::Relaxed),
            steps_advanced: self.steps_advanced.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            last_inference_us: self.last_inference_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_seen: u64,
    pub frames_dropped_busy: u64,
    pub frames_applied: u64,
    pub stale_results: u64,
    pub decode_failures: u64,
    pub idle_frames: u64,
    pub steps_advanced: u64,
    pub completions: u64,
    pub resets: u64,
    pub last_inference_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = SessionMetrics::new();
        let reader = metrics.clone();
        metrics.inc(&metrics.frames_seen);
        metrics.inc(&metrics.frames_seen);
        metrics.set_timing(&metrics.last_inference_us, 1500);

        let summary = reader.summary();
        assert_eq!(summary.frames_seen, 2);
        assert_eq!(summary.last_inference_us, 1500);
        assert_eq!(summary.completions, 0);
    }
}
