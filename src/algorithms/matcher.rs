use crate::config::NeighborSearch;
use crate::pipeline::{NeighborIndex, Point, PointPair, PointSet};
use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;

/// Balanced kd-tree over a fixed target set.
///
/// The tree stores `u32` indices back into the indexed set. With several
/// points at exactly the same distance, which one is returned is up to the
/// tree layout.
pub struct KdTreeIndex {
    tree: Option<ImmutableKdTree<f64, u32, 2, 32>>,
    num_points: usize,
}

impl KdTreeIndex {
    pub fn build(points: &PointSet) -> Self {
        if points.is_empty() {
            return Self {
                tree: None,
                num_points: 0,
            };
        }

        let coords: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();

        Self {
            tree: Some(ImmutableKdTree::new_from_slice(&coords)),
            num_points: points.len(),
        }
    }
}

impl NeighborIndex for KdTreeIndex {
    fn nearest(&self, query: &Point) -> Option<(usize, f64)> {
        if !query.is_finite() {
            return None;
        }
        let tree = self.tree.as_ref()?;
        let nn = tree.nearest_one::<SquaredEuclidean>(&[query.x, query.y]);
        Some((nn.item as usize, nn.distance.sqrt()))
    }

    fn len(&self) -> usize {
        self.num_points
    }

    fn strategy(&self) -> &str {
        "kd_tree"
    }
}

/// Linear scan; ties resolve to the lowest index
pub struct BruteForceIndex {
    points: Vec<Point>,
}

impl BruteForceIndex {
    pub fn build(points: &PointSet) -> Self {
        Self {
            points: points.as_slice().to_vec(),
        }
    }
}

impl NeighborIndex for BruteForceIndex {
    fn nearest(&self, query: &Point) -> Option<(usize, f64)> {
        if !query.is_finite() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let d2 = query.distance_squared(p);
            match best {
                Some((_, best_d2)) if d2 >= best_d2 => {}
                _ => best = Some((i, d2)),
            }
        }
        best.map(|(i, d2)| (i, d2.sqrt()))
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn strategy(&self) -> &str {
        "brute_force"
    }
}

pub fn build_index(points: &PointSet, search: NeighborSearch) -> Box<dyn NeighborIndex> {
    match search {
        NeighborSearch::KdTree => Box::new(KdTreeIndex::build(points)),
        NeighborSearch::BruteForce => Box::new(BruteForceIndex::build(points)),
    }
}

/// Pairs each source point with its nearest target point.
///
/// The target index is built once and reused for every matching round of an
/// alignment run.
pub struct PointPairMatcher {
    target: PointSet,
    index: Box<dyn NeighborIndex>,
}

impl PointPairMatcher {
    pub fn new(target: &PointSet, search: NeighborSearch) -> Self {
        Self {
            target: target.clone(),
            index: build_index(target, search),
        }
    }

    pub fn target(&self) -> &PointSet {
        &self.target
    }

    pub fn strategy(&self) -> &str {
        self.index.strategy()
    }

    /// One pair per source point whose nearest target lies strictly closer
    /// than `distance_threshold`, in source order.
    pub fn match_points(&self, source: &PointSet, distance_threshold: f64) -> Vec<PointPair> {
        let mut pairs = Vec::with_capacity(source.len());
        for p in source {
            if let Some((j, distance)) = self.index.nearest(p) {
                if distance < distance_threshold {
                    pairs.push(PointPair::new(*p, self.target[j]));
                }
            }
        }
        pairs
    }
}

/// Single-shot matching against a freshly built kd-tree
pub fn find_point_pairs(source: &PointSet, target: &PointSet, distance_threshold: f64) -> Vec<PointPair> {
    PointPairMatcher::new(target, NeighborSearch::KdTree).match_points(source, distance_threshold)
}
