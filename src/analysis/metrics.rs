use crate::algorithms::KdTreeIndex;
use crate::pipeline::{NeighborIndex, PointSet, Transform2D};
use serde::{Deserialize, Serialize};

/// RMS of nearest-neighbour distances from `aligned` into `target`
pub fn calculate_residual_rms(aligned: &PointSet, target: &PointSet) -> Option<f64> {
    if aligned.is_empty() {
        return None;
    }
    let index = KdTreeIndex::build(target);
    let mut sum = 0.0;
    for p in aligned {
        let (_, d) = index.nearest(p)?;
        sum += d * d;
    }
    Some((sum / aligned.len() as f64).sqrt())
}

/// Largest distance between points at the same index; `None` if the sets differ in size
pub fn calculate_max_pointwise_error(a: &PointSet, b: &PointSet) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b.iter()).map(|(p, q)| p.distance(q)).fold(0.0, f64::max))
}

/// Residual motion left after `estimated` undoes `truth`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformError {
    pub rotation_degrees: f64,
    pub translation: f64,
}

/// `truth` moved the source away; `estimated` should bring it back
pub fn calculate_transform_error(estimated: &Transform2D, truth: &Transform2D) -> TransformError {
    let residual = truth.then(estimated);
    TransformError {
        rotation_degrees: residual.rotation_degrees().abs(),
        translation: residual.tx.hypot(residual.ty),
    }
}
