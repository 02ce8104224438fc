//! Simulation metrics.

use std::collections::VecDeque;
use std::time::Duration;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that succeeded.
    pub succeeded: u64,
    /// Operations refused for an expected business reason
    /// (already processed, insufficient funds).
    pub refused: u64,
    /// Operations that failed unexpectedly.
    pub failed: u64,
    /// Latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            succeeded: 0,
            refused: 0,
            failed: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    fn sample(&mut self, latency: Duration) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
    }

    /// Record a successful operation.
    pub fn record_success(&mut self, latency: Duration) {
        self.total_operations += 1;
        self.succeeded += 1;
        self.sample(latency);
    }

    /// Record an expected refusal.
    pub fn record_refusal(&mut self, latency: Duration) {
        self.total_operations += 1;
        self.refused += 1;
        self.sample(latency);
    }

    /// Record an unexpected failure.
    pub fn record_failure(&mut self) {
        self.total_operations += 1;
        self.failed += 1;
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success(Duration::from_micros(100));
        metrics.record_success(Duration::from_micros(200));
        metrics.record_refusal(Duration::from_micros(150));
        metrics.record_failure();

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.succeeded, 2);
        assert_eq!(metrics.refused, 1);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p50_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let mut metrics = SimulationMetrics::new();
        for i in 0..10_050 {
            metrics.record_success(Duration::from_micros(i));
        }

        assert_eq!(metrics.latency_samples.len(), 10_000);
        assert_eq!(metrics.latency_samples.front(), Some(&50));
    }
}
