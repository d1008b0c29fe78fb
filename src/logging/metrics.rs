//! Timing and outcome metrics
//!
//! Lightweight in-memory collection of alignment timings with statistical
//! summaries, shared between exchange handlers through an `Arc`.

use crate::pipeline::AlignmentResult;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const MAX_MEASUREMENTS: usize = 10_000;

/// Operation name used for full alignment runs
pub const ALIGNMENT_OPERATION: &str = "alignment";

/// Individual performance measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasurement {
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: Option<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Statistical summary of performance measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation: String,
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Outcome summary over all recorded alignments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentMetrics {
    pub total_alignments: usize,
    pub converged: usize,
    pub by_state: HashMap<String, usize>,
    pub mean_iterations: f64,
    pub timing: Option<PerformanceStats>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// Thread-safe metrics collector
pub struct MetricsCollector {
    pub measurements: Arc<Mutex<Vec<PerformanceMeasurement>>>,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(Vec::new())),
            enabled,
        }
    }

    pub fn record(&self, operation: &str, duration: Duration, correlation_id: Option<Uuid>) {
        self.record_with_metadata(operation, duration, correlation_id, HashMap::new());
    }

    pub fn record_with_metadata(
        &self,
        operation: &str,
        duration: Duration,
        correlation_id: Option<Uuid>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }

        let measurement = PerformanceMeasurement {
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: chrono::Utc::now(),
            correlation_id,
            metadata,
        };

        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.push(measurement);

            // Keep only the newest half once the cap is hit
            if measurements.len() > MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
        }
    }

    /// Record the outcome of one alignment run
    pub fn record_alignment(&self, result: &AlignmentResult, correlation_id: Option<Uuid>) {
        let mut metadata = HashMap::new();
        metadata.insert("state".to_string(), serde_json::json!(result.state.as_str()));
        metadata.insert("iterations".to_string(), serde_json::json!(result.iterations));
        metadata.insert("pairs".to_string(), serde_json::json!(result.final_pair_count));

        self.record_with_metadata(
            ALIGNMENT_OPERATION,
            Duration::from_secs_f64(result.execution_time_ms.max(0.0) / 1000.0),
            correlation_id,
            metadata,
        );
    }

    pub fn get_measurements(&self, operation: &str) -> Vec<PerformanceMeasurement> {
        if let Ok(measurements) = self.measurements.lock() {
            measurements
                .iter()
                .filter(|m| m.operation == operation)
                .cloned()
                .collect()
        } else {
            Vec::new()
        }
    }

    pub fn get_measurements_by_correlation(&self, correlation_id: Uuid) -> Vec<PerformanceMeasurement> {
        if let Ok(measurements) = self.measurements.lock() {
            measurements
                .iter()
                .filter(|m| m.correlation_id == Some(correlation_id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Calculate performance statistics for an operation
    pub fn calculate_stats(&self, operation: &str) -> Option<PerformanceStats> {
        let measurements = self.get_measurements(operation);
        if measurements.is_empty() {
            return None;
        }

        let mut durations: Vec<f64> = measurements.iter().map(|m| m.duration_ms).collect();
        durations.sort_by(|a, b| a.total_cmp(b));

        let count = durations.len();
        let mean = durations.iter().sum::<f64>() / count as f64;

        let variance: f64 = durations
            .iter()
            .map(|d| {
                let diff = d - mean;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) / 2.0
        } else {
            durations[count / 2]
        };

        let p95_index = ((count as f64) * 0.95) as usize;

        Some(PerformanceStats {
            operation: operation.to_string(),
            count,
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
            min_ms: durations[0],
            max_ms: durations[count - 1],
            p95_ms: durations[p95_index.min(count - 1)],
        })
    }

    /// Outcome counts and timing over every recorded alignment
    pub fn alignment_metrics(&self) -> Option<AlignmentMetrics> {
        let runs = self.get_measurements(ALIGNMENT_OPERATION);
        if runs.is_empty() {
            return None;
        }

        let mut by_state: HashMap<String, usize> = HashMap::new();
        let mut iterations = 0u64;
        for run in &runs {
            let state = run
                .metadata
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            *by_state.entry(state.to_string()).or_default() += 1;
            iterations += run.metadata.get("iterations").and_then(|v| v.as_u64()).unwrap_or(0);
        }

        Some(AlignmentMetrics {
            total_alignments: runs.len(),
            converged: by_state.get("converged_small_motion").copied().unwrap_or(0),
            by_state,
            mean_iterations: iterations as f64 / runs.len() as f64,
            timing: self.calculate_stats(ALIGNMENT_OPERATION),
            last_updated: chrono::Utc::now(),
        })
    }

    pub fn clear(&self) {
        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.clear();
        }
    }

    pub fn measurement_count(&self) -> usize {
        if let Ok(measurements) = self.measurements.lock() {
            measurements.len()
        } else {
            0
        }
    }

    pub fn export_to_json(&self) -> Result<String, serde_json::Error> {
        if let Ok(measurements) = self.measurements.lock() {
            serde_json::to_string_pretty(&*measurements)
        } else {
            Ok("[]".to_string())
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Timer that reports into a collector when stopped
pub struct Timer {
    start: Instant,
    operation: String,
    correlation_id: Option<Uuid>,
    collector: Option<Arc<MetricsCollector>>,
}

impl Timer {
    pub fn start(operation: &str, correlation_id: Option<Uuid>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            correlation_id,
            collector: None,
        }
    }

    pub fn start_with_collector(
        operation: &str,
        correlation_id: Option<Uuid>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            collector: Some(collector),
            ..Self::start(operation, correlation_id)
        }
    }

    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();

        if let Some(collector) = &self.collector {
            collector.record(&self.operation, duration, self.correlation_id);
        }

        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            correlation_id = ?self.correlation_id,
            "Timer completed"
        );

        duration
    }
}
