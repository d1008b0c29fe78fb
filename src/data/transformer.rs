use crate::pipeline::{Point, PointSet, Transform2D};

/// Rigid edits of point sets, used to build test scans with a known motion
pub struct ProfileTransformer;

impl ProfileTransformer {
    /// Rotate about the origin by `angle_degrees`
    pub fn rotate(points: &PointSet, angle_degrees: f64) -> PointSet {
        Transform2D::from_degrees(angle_degrees, 0.0, 0.0).apply_to_set(points)
    }

    /// Rotate about `center` by `angle_degrees`
    pub fn rotate_about(points: &PointSet, angle_degrees: f64, center: Point) -> PointSet {
        let (s, c) = angle_degrees.to_radians().sin_cos();
        points
            .iter()
            .map(|p| {
                let x = p.x - center.x;
                let y = p.y - center.y;
                Point::new(c * x - s * y + center.x, s * x + c * y + center.y)
            })
            .collect()
    }

    pub fn translate(points: &PointSet, dx: f64, dy: f64) -> PointSet {
        points.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
    }

    /// Rotate about the origin, then translate
    pub fn rotate_and_translate(points: &PointSet, angle_degrees: f64, dx: f64, dy: f64) -> PointSet {
        Transform2D::from_degrees(angle_degrees, dx, dy).apply_to_set(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_about_center_keeps_center() {
        let center = Point::new(3.0, 4.0);
        let points = PointSet::new(vec![center, Point::new(4.0, 4.0)]);
        let rotated = ProfileTransformer::rotate_about(&points, 90.0, center);
        assert!(rotated[0].distance(&center) < 1e-12);
        assert!(rotated[1].distance(&Point::new(3.0, 5.0)) < 1e-12);
    }

    #[test]
    fn test_rotate_and_translate_matches_parts() {
        let points = PointSet::from_pairs(&[(1.0, 2.0), (-0.5, 0.0)]);
        let combined = ProfileTransformer::rotate_and_translate(&points, 10.0, 1.0, -1.0);
        let stepwise = ProfileTransformer::translate(&ProfileTransformer::rotate(&points, 10.0), 1.0, -1.0);
        for (a, b) in combined.iter().zip(stepwise.iter()) {
            assert!(a.distance(b) < 1e-12);
        }
    }
}
