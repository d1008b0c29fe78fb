//! Flange/Tread alignment service
//!
//! Resolves which of two incoming scans is the flange, aligns it onto the
//! tread and hands both back tagged with their original labels.

pub mod labels;

pub use labels::*;

use crate::algorithms::{CoarseRotationEstimator, IcpEngine};
use crate::config::{CoarseRotationConfig, Config, IcpConfig, RansacConfig};
use crate::logging::{get_correlation_id, AlignmentSpan};
use crate::pipeline::{AlignmentResult, NeverStop, PointSet, StopCondition, Transform2D};
use serde::{Deserialize, Serialize};

/// A point set together with the label it arrived with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledScan {
    pub label: String,
    pub points: PointSet,
}

impl LabeledScan {
    pub fn new(label: impl Into<String>, points: PointSet) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Aligned flange plus unchanged tread, each with its original label
#[derive(Debug, Clone)]
pub struct LabeledAlignment {
    pub flange_label: String,
    pub tread_label: String,
    pub result: AlignmentResult,
}

impl LabeledAlignment {
    pub fn flange(&self) -> LabeledScan {
        LabeledScan::new(self.flange_label.clone(), self.result.aligned_source.clone())
    }

    pub fn tread(&self) -> LabeledScan {
        LabeledScan::new(self.tread_label.clone(), self.result.target.clone())
    }

    /// Flange first, then tread
    pub fn into_scans(self) -> (LabeledScan, LabeledScan) {
        (
            LabeledScan::new(self.flange_label, self.result.aligned_source),
            LabeledScan::new(self.tread_label, self.result.target),
        )
    }
}

/// Stateless between calls; safe to share across exchange handlers
#[derive(Debug, Clone, Default)]
pub struct AlignmentService {
    engine: IcpEngine,
    coarse: Option<CoarseRotationEstimator>,
}

impl AlignmentService {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            config.icp.clone(),
            config.coarse_rotation.clone(),
            config.ransac.clone(),
        )
    }

    pub fn from_parts(icp: IcpConfig, coarse: CoarseRotationConfig, ransac: RansacConfig) -> Self {
        let coarse = coarse
            .enabled
            .then(|| CoarseRotationEstimator::new(coarse.clone(), ransac));
        Self {
            engine: IcpEngine::new(icp),
            coarse,
        }
    }

    pub fn engine(&self) -> &IcpEngine {
        &self.engine
    }

    pub fn coarse_enabled(&self) -> bool {
        self.coarse.is_some()
    }

    /// Align `source` (flange) onto `target` (tread)
    pub fn do_alignment(&self, source: &PointSet, target: &PointSet) -> AlignmentResult {
        self.do_alignment_with_stop(source, target, &NeverStop)
    }

    /// Same as [`do_alignment`](Self::do_alignment), polling `stop` between ICP iterations.
    ///
    /// With the coarse stage enabled, the flange is pre-rotated by the
    /// line-based estimate first; if that estimate fails the stage is skipped
    /// and ICP starts from the raw flange. The returned transform maps the
    /// input source onto the aligned set, pre-rotation included.
    pub fn do_alignment_with_stop(
        &self,
        source: &PointSet,
        target: &PointSet,
        stop: &dyn StopCondition,
    ) -> AlignmentResult {
        let span = AlignmentSpan::new(source.len(), target.len(), get_correlation_id());
        let _enter = span.span().enter();

        let mut start = source.clone();
        let mut pre = Transform2D::identity();
        let mut coarse_degrees = None;

        if let Some(estimator) = &self.coarse {
            match estimator.estimate(source, target) {
                Ok(coarse) => {
                    span.record_coarse_rotation(coarse.angle_degrees, coarse.flange_slope, coarse.tread_slope);
                    pre = coarse.transform();
                    coarse_degrees = Some(coarse.angle_degrees);
                    start = coarse.rotated;
                }
                Err(e) => span.record_coarse_skipped(&e.to_string()),
            }
        }

        let matcher = self.engine.matcher_for(target);
        let mut result = self.engine.execute(&start, &matcher, stop, &span);

        result.transform = pre.then(&result.transform);
        if let Some(degrees) = coarse_degrees {
            result = result.with_coarse_rotation(degrees);
        }
        result.execution_time_ms = span.elapsed_ms();

        span.record_result(&result);
        result
    }

    /// Align two labelled scans, whichever order they arrived in.
    ///
    /// Exactly one label must be `Flange` and the other `Tread`.
    pub fn align(
        &self,
        points_a: &PointSet,
        label_a: &str,
        points_b: &PointSet,
        label_b: &str,
    ) -> Result<LabeledAlignment, LabelMismatchError> {
        let order = resolve_labels(label_a, label_b)?;
        let ((flange, flange_label), (tread, tread_label)) = match order {
            ArrivalOrder::FlangeFirst => ((points_a, label_a), (points_b, label_b)),
            ArrivalOrder::TreadFirst => ((points_b, label_b), (points_a, label_a)),
        };

        tracing::debug!(
            order = ?order,
            flange_points = flange.len(),
            tread_points = tread.len(),
            "Resolved scan labels"
        );

        Ok(LabeledAlignment {
            flange_label: flange_label.to_string(),
            tread_label: tread_label.to_string(),
            result: self.do_alignment(flange, tread),
        })
    }

    /// [`align`](Self::align) over two owned scans
    pub fn align_scans(&self, first: &LabeledScan, second: &LabeledScan) -> Result<LabeledAlignment, LabelMismatchError> {
        self.align(&first.points, &first.label, &second.points, &second.label)
    }
}
