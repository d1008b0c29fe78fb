use crate::analysis::metrics::{calculate_residual_rms, calculate_transform_error};
use crate::data::{ProfileGenerator, SyntheticProfileConfig};
use crate::pipeline::{IcpState, PointSet, Transform2D};
use crate::service::AlignmentService;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One synthetic flange/tread pair with a known motion
#[derive(Debug, Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub flange: PointSet,
    pub tread: PointSet,
    /// Motion applied to the flange
    pub truth: Transform2D,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub state: IcpState,
    pub iterations: usize,
    pub residual_rms: Option<f64>,
    pub rotation_error_deg: f64,
    pub translation_error: f64,
    pub execution_time_ms: f64,
    pub success: bool,
}

/// Runs independent cases in parallel, one alignment per case
pub struct BenchmarkRunner {
    pub service: AlignmentService,
    pub cases: Vec<BenchmarkCase>,
    /// Translation error at or below which a converged case counts as a success
    pub tolerance: f64,
}

impl BenchmarkRunner {
    pub fn new(service: AlignmentService) -> Self {
        Self {
            service,
            cases: Vec::new(),
            tolerance: 0.05,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn add_case(&mut self, case: BenchmarkCase) {
        self.cases.push(case);
    }

    /// Add `count` cases with motions drawn uniformly from
    /// `±max_rotation_deg` and `±max_translation`
    pub fn add_synthetic_cases(
        &mut self,
        count: usize,
        profile: &SyntheticProfileConfig,
        max_rotation_deg: f64,
        max_translation: f64,
    ) -> crate::Result<()> {
        let mut rng = StdRng::seed_from_u64(profile.seed);
        for i in 0..count {
            let truth = Transform2D::from_degrees(
                rng.gen_range(-max_rotation_deg..=max_rotation_deg),
                rng.gen_range(-max_translation..=max_translation),
                rng.gen_range(-max_translation..=max_translation),
            );
            let config = profile.clone().with_seed(profile.seed.wrapping_add(i as u64 + 1));
            let (flange, tread) = ProfileGenerator::new(config)?.scan_pair(&truth)?;
            self.add_case(BenchmarkCase {
                name: format!("case_{:03}", i),
                flange: flange.points,
                tread: tread.points,
                truth,
            });
        }
        Ok(())
    }

    pub fn run_benchmark(&self) -> Vec<BenchmarkResult> {
        self.cases
            .par_iter()
            .map(|case| {
                let result = self.service.do_alignment(&case.flange, &case.tread);
                let error = calculate_transform_error(&result.transform, &case.truth);
                let success = result.state == IcpState::ConvergedSmallMotion && error.translation <= self.tolerance;

                if !success {
                    tracing::debug!(case = %case.name, state = %result.state, "Benchmark case missed");
                }

                BenchmarkResult {
                    name: case.name.clone(),
                    state: result.state,
                    iterations: result.iterations,
                    residual_rms: calculate_residual_rms(&result.aligned_source, &result.target),
                    rotation_error_deg: error.rotation_degrees,
                    translation_error: error.translation,
                    execution_time_ms: result.execution_time_ms,
                    success,
                }
            })
            .collect()
    }
}

/// Share of successful cases
pub fn success_rate(results: &[BenchmarkResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().filter(|r| r.success).count() as f64 / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_every_case_in_order() {
        let mut runner = BenchmarkRunner::new(AlignmentService::default());
        runner
            .add_synthetic_cases(4, &SyntheticProfileConfig::default(), 0.2, 0.2)
            .unwrap();

        let results = runner.run_benchmark();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].name, "case_000");
        for r in &results {
            assert!(r.state.is_terminal());
        }
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(&[]), 0.0);
    }
}
