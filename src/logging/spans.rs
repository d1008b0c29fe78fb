//! Structured span for one alignment run
//!
//! Keeps the logging pattern of the coarse stage, the ICP loop and the final
//! outcome consistent, and ties them to the exchange correlation id.

use crate::pipeline::{AlignmentResult, IcpState, Transform2D};
use instant::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering one alignment from coarse rotation to terminal state
pub struct AlignmentSpan {
    span: Span,
    start_time: Instant,
}

impl AlignmentSpan {
    /// Create a new span for aligning `source_points` onto `target_points`
    pub fn new(source_points: usize, target_points: usize, correlation_id: Option<Uuid>) -> Self {
        let span = if let Some(corr_id) = correlation_id {
            span!(
                Level::INFO,
                "alignment",
                source_points = source_points,
                target_points = target_points,
                coarse_rotation_deg = field::Empty,
                state = field::Empty,
                iterations = field::Empty,
                correlation_id = %corr_id
            )
        } else {
            span!(
                Level::INFO,
                "alignment",
                source_points = source_points,
                target_points = target_points,
                coarse_rotation_deg = field::Empty,
                state = field::Empty,
                iterations = field::Empty
            )
        };

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Record the pre-rotation found by the line-based estimator
    pub fn record_coarse_rotation(&self, degrees: f64, flange_slope: f64, tread_slope: f64) {
        self.span.record("coarse_rotation_deg", degrees);
        tracing::debug!(
            parent: &self.span,
            degrees = degrees,
            flange_slope = flange_slope,
            tread_slope = tread_slope,
            "Coarse rotation applied"
        );
    }

    /// Record a skipped coarse stage
    pub fn record_coarse_skipped(&self, reason: &str) {
        tracing::warn!(parent: &self.span, reason = reason, "Coarse rotation skipped");
    }

    /// Record one ICP step
    pub fn record_iteration(&self, iteration: usize, pairs: usize, step: &Transform2D) {
        tracing::trace!(
            parent: &self.span,
            iteration = iteration,
            pairs = pairs,
            theta = step.theta,
            tx = step.tx,
            ty = step.ty,
            "ICP step applied"
        );
    }

    /// Record the terminal outcome
    pub fn record_result(&self, result: &AlignmentResult) {
        let duration = self.start_time.elapsed();
        self.span.record("state", result.state.as_str());
        self.span.record("iterations", result.iterations);

        let rotation = format!("{:.4}°", result.transform.rotation_degrees());
        let translation = format!("({:.4}, {:.4})", result.transform.tx, result.transform.ty);

        match result.state {
            IcpState::ConvergedSmallMotion => tracing::info!(
                parent: &self.span,
                state = %result.state,
                iterations = result.iterations,
                pairs = result.final_pair_count,
                rotation = rotation,
                translation = translation,
                execution_time_ms = duration.as_millis(),
                "Alignment converged"
            ),
            _ => tracing::warn!(
                parent: &self.span,
                state = %result.state,
                iterations = result.iterations,
                pairs = result.final_pair_count,
                rotation = rotation,
                translation = translation,
                execution_time_ms = duration.as_millis(),
                "Alignment ended without small-motion convergence"
            ),
        }
    }

    /// Get the underlying span for manual instrumentation
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}
