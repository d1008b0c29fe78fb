use crate::algorithms::line_fit::{LineFitError, RobustLineFitter};
use crate::config::{CoarseRotationConfig, RansacConfig};
use crate::pipeline::{PointSet, Transform2D};

/// Pre-rotation derived from the straight edges of both profiles
#[derive(Debug, Clone)]
pub struct CoarseRotation {
    /// Rotation applied to the flange set, degrees
    pub angle_degrees: f64,
    pub flange_slope: f64,
    pub tread_slope: f64,
    /// Full flange set rotated about the origin
    pub rotated: PointSet,
}

impl CoarseRotation {
    pub fn transform(&self) -> Transform2D {
        Transform2D::rotation(self.angle_degrees.to_radians())
    }
}

/// Angle between two lines of slopes `m1` and `m2`, negated, in degrees.
///
/// Only the magnitude of the inter-line angle is measured; the result is
/// always in `[-90, 0]`.
pub fn rotation_angle_degrees(m1: f64, m2: f64) -> f64 {
    let tan = ((m2 - m1) / (1.0 + m1 * m2)).abs();
    -tan.atan().to_degrees()
}

/// Estimates the rotation between a flange and a tread scan from robust line
/// fits over a fixed x-window of each profile.
#[derive(Debug, Clone)]
pub struct CoarseRotationEstimator {
    config: CoarseRotationConfig,
    fitter: RobustLineFitter,
}

impl CoarseRotationEstimator {
    pub fn new(config: CoarseRotationConfig, ransac: RansacConfig) -> Self {
        Self {
            config,
            fitter: RobustLineFitter::new(ransac),
        }
    }

    pub fn config(&self) -> &CoarseRotationConfig {
        &self.config
    }

    /// Fit both edges and rotate the whole flange set by the resulting angle.
    ///
    /// Fails when either window holds fewer than two points or the line fit
    /// finds no consensus. The inputs are not modified.
    pub fn estimate(&self, flange: &PointSet, tread: &PointSet) -> Result<CoarseRotation, LineFitError> {
        let (f_lo, f_hi) = self.config.flange_window;
        let (t_lo, t_hi) = self.config.tread_window;

        let flange_edge = flange.window_by_x_fraction(f_lo, f_hi);
        let tread_edge = tread.window_by_x_fraction(t_lo, t_hi);

        tracing::debug!(
            flange_window_points = flange_edge.len(),
            tread_window_points = tread_edge.len(),
            "Fitting profile edges"
        );

        let flange_slope = self.fitter.slope(&flange_edge)?;
        let tread_slope = self.fitter.slope(&tread_edge)?;

        let angle_degrees = rotation_angle_degrees(flange_slope, tread_slope);
        let rotated = Transform2D::rotation(angle_degrees.to_radians()).apply_to_set(flange);

        Ok(CoarseRotation {
            angle_degrees,
            flange_slope,
            tread_slope,
            rotated,
        })
    }
}
