use crate::algorithms::matcher::PointPairMatcher;
use crate::algorithms::rigid::{rms_distance, RigidTransformEstimator};
use crate::config::IcpConfig;
use crate::logging::{get_correlation_id, AlignmentSpan};
use crate::pipeline::{AlignmentResult, Deadline, IcpState, NeverStop, PointSet, StopCondition, Transform2D};
use instant::Instant;
use std::time::Duration;

/// Point-to-point ICP over two planar profiles.
///
/// Each round pairs every source point with its nearest target point inside
/// the distance threshold, solves the closed-form rigid motion over the
/// pairs, and applies it to the working copy of the source. The loop ends in
/// exactly one terminal [`IcpState`].
#[derive(Debug, Clone, Default)]
pub struct IcpEngine {
    config: IcpConfig,
    estimator: RigidTransformEstimator,
}

impl IcpEngine {
    pub fn new(config: IcpConfig) -> Self {
        Self {
            config,
            estimator: RigidTransformEstimator::new(),
        }
    }

    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Build a matcher over `target` with the configured search strategy
    pub fn matcher_for(&self, target: &PointSet) -> PointPairMatcher {
        PointPairMatcher::new(target, self.config.neighbor_search)
    }

    /// Align `source` onto `target`
    pub fn run(&self, source: &PointSet, target: &PointSet) -> AlignmentResult {
        self.run_with_stop(source, target, &NeverStop)
    }

    /// Align `source` onto `target`, polling `stop` between iterations
    pub fn run_with_stop(&self, source: &PointSet, target: &PointSet, stop: &dyn StopCondition) -> AlignmentResult {
        let span = AlignmentSpan::new(source.len(), target.len(), get_correlation_id());
        let _enter = span.span().enter();

        let matcher = self.matcher_for(target);
        let result = self.execute(source, &matcher, stop, &span);
        span.record_result(&result);
        result
    }

    /// Run the loop against a prebuilt matcher and report into `span`.
    ///
    /// The returned transform is the composition of every applied step and
    /// maps `source` onto the aligned set.
    pub fn execute(
        &self,
        source: &PointSet,
        matcher: &PointPairMatcher,
        stop: &dyn StopCondition,
        span: &AlignmentSpan,
    ) -> AlignmentResult {
        let started = Instant::now();
        let deadline = self
            .config
            .max_duration_ms
            .map(|ms| Deadline::after(Duration::from_millis(ms)));

        tracing::debug!(
            parent: span.span(),
            strategy = matcher.strategy(),
            distance_threshold = self.config.distance_threshold,
            max_iterations = self.config.max_iterations,
            "Starting ICP"
        );

        let mut current = source.clone();
        let mut total = Transform2D::identity();
        let mut iterations = 0;
        let mut pair_count = 0;
        let mut rms = None;

        let state = loop {
            if stop.should_stop() || deadline.is_some_and(|d| d.should_stop()) {
                break IcpState::Cancelled;
            }

            let pairs = matcher.match_points(&current, self.config.distance_threshold);
            pair_count = pairs.len();
            rms = rms_distance(&pairs);

            if pairs.len() < self.config.point_pairs_threshold {
                break IcpState::ConvergedFewPairs;
            }

            let Some(step) = self.estimator.estimate(&pairs) else {
                break IcpState::NoSolutionTerminal;
            };

            current = step.apply_to_set(&current);
            total = total.then(&step);
            iterations += 1;
            span.record_iteration(iterations, pairs.len(), &step);

            if step.theta.abs() < self.config.convergence_rotation_threshold
                && step.max_translation() < self.config.convergence_translation_threshold
            {
                break IcpState::ConvergedSmallMotion;
            }

            if iterations >= self.config.max_iterations {
                break IcpState::MaxIterationsReached;
            }
        };

        AlignmentResult::new(current, matcher.target().clone(), state)
            .with_iterations(iterations)
            .with_transform(total)
            .with_pair_stats(pair_count, rms)
            .with_execution_time(started.elapsed().as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NeighborSearch;
    use crate::pipeline::{CancelFlag, Point};

    fn curve() -> PointSet {
        (0..=200)
            .map(|i| {
                let x = i as f64 * 0.5;
                Point::new(x, 5.0 * (x / 8.0).sin() + 0.05 * x)
            })
            .collect()
    }

    #[test]
    fn test_identity_converges_in_one_round() {
        let target = curve();
        let result = IcpEngine::default().run(&target, &target);
        assert_eq!(result.state, IcpState::ConvergedSmallMotion);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.aligned_source, target);
        assert_eq!(result.final_pair_count, target.len());
    }

    #[test]
    fn test_far_source_ends_with_few_pairs() {
        let target = curve();
        let source = Transform2D::new(0.0, 500.0, 500.0).apply_to_set(&target);
        let result = IcpEngine::default().run(&source, &target);
        assert_eq!(result.state, IcpState::ConvergedFewPairs);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.aligned_source, source);
    }

    #[test]
    fn test_iteration_cap() {
        let target = curve();
        let source = Transform2D::from_degrees(0.5, 0.3, -0.2).apply_to_set(&target);
        let engine = IcpEngine::new(IcpConfig::default().with_max_iterations(1));
        let result = engine.run(&source, &target);
        assert_eq!(result.state, IcpState::MaxIterationsReached);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_raised_flag_cancels_before_first_round() {
        let target = curve();
        let source = Transform2D::new(0.0, 0.2, 0.0).apply_to_set(&target);
        let flag = CancelFlag::new();
        flag.cancel();

        let result = IcpEngine::default().run_with_stop(&source, &target, &flag);
        assert_eq!(result.state, IcpState::Cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.aligned_source, source);
    }

    #[test]
    fn test_zero_budget_cancels() {
        let target = curve();
        let engine = IcpEngine::new(IcpConfig::default().with_max_duration_ms(0));
        assert_eq!(engine.run(&target, &target).state, IcpState::Cancelled);
    }

    #[test]
    fn test_brute_force_matches_kdtree_outcome() {
        let target = curve();
        let source = Transform2D::from_degrees(1.0, 0.2, 0.2).apply_to_set(&target);

        let kd = IcpEngine::default().run(&source, &target);
        let brute = IcpEngine::new(IcpConfig::default().with_neighbor_search(NeighborSearch::BruteForce))
            .run(&source, &target);

        assert_eq!(kd.state, brute.state);
        assert_eq!(kd.iterations, brute.iterations);
    }
}
