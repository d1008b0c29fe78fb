use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// A single laser range sample in the shared profile plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Ordered collection of profile points.
///
/// Order carries no geometric meaning but is kept stable so that index-based
/// pairing (aligned point `i` against input point `i`) stays valid within one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            points: pairs.iter().map(|&p| Point::from(p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn into_vec(self) -> Vec<Point> {
        self.points
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }

    /// Smallest and largest x coordinate, `None` for an empty set
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        let mut iter = self.points.iter();
        let first = iter.next()?;
        Some(iter.fold((first.x, first.x), |(lo, hi), p| (lo.min(p.x), hi.max(p.x))))
    }

    /// Keep the points whose x lies inside `[min + lower·range, min + upper·range]`
    pub fn window_by_x_fraction(&self, lower: f64, upper: f64) -> PointSet {
        let Some((x_min, x_max)) = self.x_extent() else {
            return PointSet::default();
        };
        let range = x_max - x_min;
        let lo = x_min + lower * range;
        let hi = x_min + upper * range;

        self.points
            .iter()
            .filter(|p| p.x >= lo && p.x <= hi)
            .copied()
            .collect()
    }

    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    pub fn to_pairs(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.x, p.y)).collect()
    }
}

impl FromIterator<Point> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for PointSet {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Correspondence hypothesis for one matching round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub source: Point,
    pub target: Point,
}

impl PointPair {
    pub fn new(source: Point, target: Point) -> Self {
        Self { source, target }
    }

    pub fn distance(&self) -> f64 {
        self.source.distance(&self.target)
    }
}

/// Rigid planar motion: rotate by `theta` (radians) about the origin, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub theta: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform2D {
    pub const fn new(theta: f64, tx: f64, ty: f64) -> Self {
        Self { theta, tx, ty }
    }

    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn rotation(theta: f64) -> Self {
        Self::new(theta, 0.0, 0.0)
    }

    pub fn from_degrees(degrees: f64, tx: f64, ty: f64) -> Self {
        Self::new(degrees.to_radians(), tx, ty)
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.theta.to_degrees()
    }

    pub fn is_finite(&self) -> bool {
        self.theta.is_finite() && self.tx.is_finite() && self.ty.is_finite()
    }

    pub fn apply(&self, p: &Point) -> Point {
        let (s, c) = self.theta.sin_cos();
        Point::new(c * p.x - s * p.y + self.tx, s * p.x + c * p.y + self.ty)
    }

    /// Transformed copy of `points`; the input is left untouched.
    pub fn apply_to_set(&self, points: &PointSet) -> PointSet {
        let (s, c) = self.theta.sin_cos();
        points
            .iter()
            .map(|p| Point::new(c * p.x - s * p.y + self.tx, s * p.x + c * p.y + self.ty))
            .collect()
    }

    /// Apply `self` first, then `next`.
    pub fn then(&self, next: &Transform2D) -> Transform2D {
        let (s, c) = next.theta.sin_cos();
        Transform2D {
            theta: self.theta + next.theta,
            tx: c * self.tx - s * self.ty + next.tx,
            ty: s * self.tx + c * self.ty + next.ty,
        }
    }

    pub fn inverse(&self) -> Transform2D {
        let (s, c) = self.theta.sin_cos();
        Transform2D {
            theta: -self.theta,
            tx: -(c * self.tx + s * self.ty),
            ty: -(-s * self.tx + c * self.ty),
        }
    }

    /// Largest absolute translation component
    pub fn max_translation(&self) -> f64 {
        self.tx.abs().max(self.ty.abs())
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// ICP state machine. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IcpState {
    Running,
    ConvergedSmallMotion,
    ConvergedFewPairs,
    NoSolutionTerminal,
    MaxIterationsReached,
    Cancelled,
}

impl IcpState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IcpState::Running)
    }

    /// True only for the small-motion convergence
    pub fn is_converged(&self) -> bool {
        matches!(self, IcpState::ConvergedSmallMotion)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IcpState::Running => "running",
            IcpState::ConvergedSmallMotion => "converged_small_motion",
            IcpState::ConvergedFewPairs => "converged_few_pairs",
            IcpState::NoSolutionTerminal => "no_solution",
            IcpState::MaxIterationsReached => "max_iterations_reached",
            IcpState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one alignment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Source points expressed in the target frame
    pub aligned_source: PointSet,

    /// Target points, unchanged
    pub target: PointSet,

    /// Terminal state of the ICP loop
    pub state: IcpState,

    /// Number of matching rounds whose transform was applied
    pub iterations: usize,

    /// Composition of every applied ICP step
    pub transform: Transform2D,

    /// Pre-rotation applied before ICP, if the coarse stage ran
    pub coarse_rotation_degrees: Option<f64>,

    /// Pairs found in the last matching round
    pub final_pair_count: usize,

    /// RMS pair distance of the last matching round
    pub final_rms: Option<f64>,

    /// Wall-clock time of the run in milliseconds
    pub execution_time_ms: f64,
}

impl AlignmentResult {
    pub fn new(aligned_source: PointSet, target: PointSet, state: IcpState) -> Self {
        Self {
            aligned_source,
            target,
            state,
            iterations: 0,
            transform: Transform2D::identity(),
            coarse_rotation_degrees: None,
            final_pair_count: 0,
            final_rms: None,
            execution_time_ms: 0.0,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_coarse_rotation(mut self, degrees: f64) -> Self {
        self.coarse_rotation_degrees = Some(degrees);
        self
    }

    pub fn with_pair_stats(mut self, count: usize, rms: Option<f64>) -> Self {
        self.final_pair_count = count;
        self.final_rms = rms;
        self
    }

    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.execution_time_ms = ms;
        self
    }
}
