use crate::pipeline::{PointPair, Transform2D};

/// Closed-form least-squares rigid motion between paired points.
///
/// Minimises `Σ ‖R(θ)·s + t − d‖²` over the pairs using the centred
/// cross-covariance sums. No iteration, no scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidTransformEstimator;

impl RigidTransformEstimator {
    pub fn new() -> Self {
        Self
    }

    /// `None` for an empty pair list or non-finite arithmetic
    pub fn estimate(&self, pairs: &[PointPair]) -> Option<Transform2D> {
        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        let (mut x_mean, mut y_mean, mut xp_mean, mut yp_mean) = (0.0, 0.0, 0.0, 0.0);
        for pair in pairs {
            x_mean += pair.source.x;
            y_mean += pair.source.y;
            xp_mean += pair.target.x;
            yp_mean += pair.target.y;
        }
        x_mean /= n;
        y_mean /= n;
        xp_mean /= n;
        yp_mean /= n;

        let (mut s_x_xp, mut s_y_yp, mut s_x_yp, mut s_y_xp) = (0.0, 0.0, 0.0, 0.0);
        for pair in pairs {
            let dx = pair.source.x - x_mean;
            let dy = pair.source.y - y_mean;
            let dxp = pair.target.x - xp_mean;
            let dyp = pair.target.y - yp_mean;

            s_x_xp += dx * dxp;
            s_y_yp += dy * dyp;
            s_x_yp += dx * dyp;
            s_y_xp += dy * dxp;
        }

        // atan2(0, 0) == 0: fully coincident pairs yield a pure translation
        let theta = (s_x_yp - s_y_xp).atan2(s_x_xp + s_y_yp);
        let (s, c) = theta.sin_cos();
        let tx = xp_mean - (x_mean * c - y_mean * s);
        let ty = yp_mean - (x_mean * s + y_mean * c);

        let transform = Transform2D::new(theta, tx, ty);
        transform.is_finite().then_some(transform)
    }
}

/// Root mean square pair distance, `None` when there are no pairs
pub fn rms_distance(pairs: &[PointPair]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let sum: f64 = pairs
        .iter()
        .map(|pair| pair.source.distance_squared(&pair.target))
        .sum();
    Some((sum / pairs.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Point;

    fn pair(s: (f64, f64), t: (f64, f64)) -> PointPair {
        PointPair::new(Point::from(s), Point::from(t))
    }

    #[test]
    fn test_pure_translation() {
        let pairs = vec![pair((0.0, 0.0), (1.0, 0.0)), pair((1.0, 0.0), (2.0, 0.0))];
        let t = RigidTransformEstimator::new().estimate(&pairs).unwrap();
        assert!(t.theta.abs() < 1e-12);
        assert!((t.tx - 1.0).abs() < 1e-12);
        assert!(t.ty.abs() < 1e-12);
    }

    #[test]
    fn test_empty_pairs_have_no_solution() {
        assert!(RigidTransformEstimator::new().estimate(&[]).is_none());
    }

    #[test]
    fn test_recovers_known_motion() {
        let truth = Transform2D::from_degrees(12.0, -0.7, 2.3);
        let sources = [(0.0, 0.0), (3.0, 1.0), (-2.0, 4.0), (5.0, -1.5)];
        let pairs: Vec<PointPair> = sources
            .iter()
            .map(|&s| {
                let p = Point::from(s);
                PointPair::new(p, truth.apply(&p))
            })
            .collect();

        let t = RigidTransformEstimator::new().estimate(&pairs).unwrap();
        assert!((t.theta - truth.theta).abs() < 1e-12);
        assert!((t.tx - truth.tx).abs() < 1e-12);
        assert!((t.ty - truth.ty).abs() < 1e-12);
    }

    #[test]
    fn test_single_pair_is_translation() {
        let t = RigidTransformEstimator::new()
            .estimate(&[pair((1.0, 2.0), (4.0, 6.0))])
            .unwrap();
        assert_eq!(t.theta, 0.0);
        assert_eq!(t.tx, 3.0);
        assert_eq!(t.ty, 4.0);
    }

    #[test]
    fn test_non_finite_input() {
        let pairs = vec![pair((f64::INFINITY, 0.0), (0.0, 0.0)), pair((1.0, 0.0), (2.0, 0.0))];
        assert!(RigidTransformEstimator::new().estimate(&pairs).is_none());
    }

    #[test]
    fn test_rms_distance() {
        let pairs = vec![pair((0.0, 0.0), (3.0, 4.0)), pair((0.0, 0.0), (0.0, 0.0))];
        assert!((rms_distance(&pairs).unwrap() - 12.5f64.sqrt()).abs() < 1e-12);
        assert!(rms_distance(&[]).is_none());
    }
}
