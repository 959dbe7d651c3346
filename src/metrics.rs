//! Request metrics and statistics tracking for the heart risk service.

use crate::types::prediction::{ModelKind, RiskLevel};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by all request handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Submissions rejected before inference
    pub rejected: AtomicU64,
    /// Inference failures
    pub inference_errors: AtomicU64,
    /// Ledger writes that completed
    pub ledger_writes: AtomicU64,
    /// Ledger writes aborted by a failed check or transport error
    pub ledger_failures: AtomicU64,
    /// Predictions by model slug
    by_model: RwLock<HashMap<String, u64>>,
    /// Predictions by risk tier
    by_risk_level: RwLock<HashMap<String, u64>>,
    /// Inference latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Probability distribution buckets (10 percentage points each)
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for uptime and rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            inference_errors: AtomicU64::new(0),
            ledger_writes: AtomicU64::new(0),
            ledger_failures: AtomicU64::new(0),
            by_model: RwLock::new(HashMap::new()),
            by_risk_level: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed prediction
    pub fn record_prediction(
        &self,
        model: ModelKind,
        latency: Duration,
        probability: f64,
        risk_level: RiskLevel,
    ) {
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_model) = self.by_model.write() {
            *by_model.entry(model.slug().to_string()).or_insert(0) += 1;
        }
        if let Ok(mut by_level) = self.by_risk_level.write() {
            *by_level.entry(risk_level.as_str().to_string()).or_insert(0) += 1;
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            // Keep only the most recent samples
            if latencies.len() > 10000 {
                latencies.drain(0..5000);
            }
        }

        let bucket = (probability / 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_error(&self) {
        self.inference_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ledger_write(&self, success: bool) {
        if success {
            self.ledger_writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ledger_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get inference latency statistics
    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(latencies) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy of all counters, served on `/metrics`
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            predictions: self.predictions.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            ledger_writes: self.ledger_writes.load(Ordering::Relaxed),
            ledger_failures: self.ledger_failures.load(Ordering::Relaxed),
            by_model: self.by_model.read().map(|m| m.clone()).unwrap_or_default(),
            by_risk_level: self.by_risk_level.read().map(|m| m.clone()).unwrap_or_default(),
            probability_distribution: self.probability_buckets.read().map(|b| *b).unwrap_or_default(),
            latency: self.latency_stats(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let latency = &snapshot.latency;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             HEART RISK SERVICE - METRICS SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions: {:>8}  │  Rejected: {:>6}  │  Errors: {:>6} ║",
            snapshot.predictions, snapshot.rejected, snapshot.inference_errors
        );
        info!(
            "║ Ledger writes: {:>6}  │  Ledger failures: {:>6}              ║",
            snapshot.ledger_writes, snapshot.ledger_failures
        );
        info!(
            "║ Inference (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}    ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for (model, count) in &snapshot.by_model {
            info!("║   model {:6}: {:>8}", model, count);
        }
        for (level, count) in &snapshot.by_risk_level {
            info!("║   risk {:7}: {:>8}", level, count);
        }
        let total: u64 = snapshot.probability_distribution.iter().sum();
        for (i, &count) in snapshot.probability_distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions: u64,
    pub rejected: u64,
    pub inference_errors: u64,
    pub ledger_writes: u64,
    pub ledger_failures: u64,
    pub by_model: HashMap<String, u64>,
    pub by_risk_level: HashMap<String, u64>,
    pub probability_distribution: [u64; 10],
    pub latency: LatencyStats,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(ModelKind::RandomForest, Duration::from_micros(100), 35.0, RiskLevel::Low);
        metrics.record_prediction(ModelKind::Knn, Duration::from_micros(300), 100.0, RiskLevel::High);
        metrics.record_rejection();
        metrics.record_ledger_write(true);
        metrics.record_ledger_write(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.ledger_writes, 1);
        assert_eq!(snapshot.ledger_failures, 1);
        assert_eq!(snapshot.by_model.get("rf"), Some(&1));
        assert_eq!(snapshot.by_risk_level.get("HIGH"), Some(&1));
        assert_eq!(snapshot.probability_distribution[3], 1);
        // 100% lands in the top bucket
        assert_eq!(snapshot.probability_distribution[9], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_prediction(ModelKind::Knn, Duration::from_micros(us), 50.0, RiskLevel::Medium);
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }

    #[test]
    fn test_empty_latency_stats() {
        let stats = ServiceMetrics::new().latency_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.p99_us, 0);
    }
}
