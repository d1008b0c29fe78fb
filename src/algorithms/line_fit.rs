use crate::config::RansacConfig;
use crate::pipeline::{Point, PointSet};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use thiserror::Error;

/// Size of a minimal sample for a line
const MIN_SAMPLES: usize = 2;

/// MAD of a normal sample times this is its standard deviation
const MAD_TO_SIGMA: f64 = 1.4826;

const INLIER_SIGMAS: f64 = 3.0;

/// Relative tolerance for exactly collinear points
const RESIDUAL_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineFitError {
    #[error("line fit needs at least 2 points, got {found}")]
    InsufficientData { found: usize },

    #[error("no consensus set reached {required} inliers (best had {best_inliers})")]
    NoConsensus { best_inliers: usize, required: usize },
}

/// Line `y = slope·x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LineModel {
    /// Line through two points, `None` when they share an x coordinate
    pub fn through(a: &Point, b: &Point) -> Option<Self> {
        let dx = b.x - a.x;
        if dx == 0.0 {
            return None;
        }
        let slope = (b.y - a.y) / dx;
        let intercept = a.y - slope * a.x;
        if slope.is_finite() && intercept.is_finite() {
            Some(Self { slope, intercept })
        } else {
            None
        }
    }

    /// Vertical residual of `p`
    pub fn residual(&self, p: &Point) -> f64 {
        (p.y - (self.slope * p.x + self.intercept)).abs()
    }

}

/// Result of a robust fit
#[derive(Debug, Clone)]
pub struct LineFit {
    /// Least-squares refit on the consensus set
    pub model: LineModel,
    /// Indices of the consensus set in the input
    pub inliers: Vec<usize>,
    /// Number of samples drawn
    pub trials: usize,
    /// Residual tolerance used for inlier counting
    pub threshold: f64,
}

/// Ordinary least squares fit of `y` on `x`.
///
/// Returns `None` with fewer than two points, when every x is equal, or when
/// the sums overflow.
pub fn fit_least_squares(points: &[Point]) -> Option<LineModel> {
    if points.len() < MIN_SAMPLES {
        return None;
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p.x - x_mean;
        sxx += dx * dx;
        sxy += dx * (p.y - y_mean);
    }

    if sxx == 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    (slope.is_finite() && intercept.is_finite()).then_some(LineModel { slope, intercept })
}

/// Median absolute deviation of `values` about their median
pub fn median_absolute_deviation(values: &[f64]) -> f64 {
    let mut values = values.to_vec();
    let center = median(&mut values);
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&mut deviations)
}

/// Theil-Sen line: median of pairwise slopes, median intercept.
///
/// Returns `None` when no two points differ in x.
pub fn fit_theil_sen(points: &[Point]) -> Option<LineModel> {
    let mut slopes = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            if let Some(model) = LineModel::through(a, b) {
                slopes.push(model.slope);
            }
        }
    }
    if slopes.is_empty() {
        return None;
    }

    let slope = median(&mut slopes);
    let mut intercepts: Vec<f64> = points.iter().map(|p| p.y - slope * p.x).collect();
    let intercept = median(&mut intercepts);
    (slope.is_finite() && intercept.is_finite()).then_some(LineModel { slope, intercept })
}

/// Default inlier tolerance: about three robust standard deviations of the
/// residuals around a Theil-Sen fit, floored at rounding noise.
///
/// Falls back to the spread of y when every x is equal.
pub fn default_residual_threshold(points: &[Point]) -> f64 {
    let y_scale = points.iter().fold(1.0_f64, |acc, p| acc.max(p.y.abs()));
    let floor = RESIDUAL_FLOOR * y_scale;

    let spread = match fit_theil_sen(points) {
        Some(model) => {
            let residuals: Vec<f64> = points.iter().map(|p| p.y - (model.slope * p.x + model.intercept)).collect();
            MAD_TO_SIGMA * INLIER_SIGMAS * median_absolute_deviation(&residuals)
        }
        None => {
            let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
            median_absolute_deviation(&ys)
        }
    };

    if spread.is_finite() {
        spread.max(floor)
    } else {
        floor
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Number of trials after which a sample free of outliers has been drawn with
/// probability `probability`, given the current best inlier ratio.
fn dynamic_max_trials(inliers: usize, samples: usize, probability: f64) -> usize {
    let inlier_ratio = inliers as f64 / samples as f64;
    let nom = 1.0 - probability;
    let denom = 1.0 - inlier_ratio.powi(MIN_SAMPLES as i32);

    if nom <= 0.0 || denom >= 1.0 {
        return usize::MAX;
    }
    if denom <= 0.0 {
        return 1;
    }

    let trials = (nom.ln() / denom.ln()).ceil();
    if trials.is_finite() && trials >= 1.0 {
        trials as usize
    } else {
        1
    }
}

/// Outlier-tolerant line fit by random sample consensus.
///
/// Each trial fits a line through two random points and counts the points
/// whose vertical residual is within the tolerance. The largest consensus set
/// (ties broken by lower residual sum of squares) is refit by least squares.
#[derive(Debug, Clone, Default)]
pub struct RobustLineFitter {
    config: RansacConfig,
}

impl RobustLineFitter {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Fit with the configured seed, or a fresh one per call
    pub fn fit(&self, points: &PointSet) -> Result<LineFit, LineFitError> {
        let seed = self
            .config
            .seed
            .unwrap_or_else(|| rand::thread_rng().next_u64());
        self.fit_seeded(points, seed)
    }

    /// Fit using a call-scoped generator seeded with `seed`
    pub fn fit_seeded(&self, points: &PointSet, seed: u64) -> Result<LineFit, LineFitError> {
        let points = points.as_slice();
        let n = points.len();
        if n < MIN_SAMPLES {
            return Err(LineFitError::InsufficientData { found: n });
        }

        let threshold = self
            .config
            .residual_threshold
            .unwrap_or_else(|| default_residual_threshold(points));

        let mut rng = StdRng::seed_from_u64(seed);
        let mut best: Option<(Vec<usize>, f64)> = None;
        let mut trial_limit = self.config.max_trials;
        let mut trials = 0;
        let mut inliers = Vec::with_capacity(n);

        while trials < trial_limit {
            trials += 1;

            let sample = rand::seq::index::sample(&mut rng, n, MIN_SAMPLES);
            let Some(model) = LineModel::through(&points[sample.index(0)], &points[sample.index(1)]) else {
                continue;
            };

            inliers.clear();
            let mut sse = 0.0;
            for (i, p) in points.iter().enumerate() {
                let r = model.residual(p);
                if r <= threshold {
                    inliers.push(i);
                    sse += r * r;
                }
            }

            let improved = match &best {
                None => true,
                Some((best_inliers, best_sse)) => {
                    inliers.len() > best_inliers.len()
                        || (inliers.len() == best_inliers.len() && sse < *best_sse)
                }
            };

            if improved {
                let limit = dynamic_max_trials(inliers.len(), n, self.config.stop_probability);
                trial_limit = self.config.max_trials.min(limit);
                best = Some((inliers.clone(), sse));
            }
        }

        let required = self.config.min_inliers.max(MIN_SAMPLES);
        let Some((best_inliers, _)) = best else {
            return Err(LineFitError::NoConsensus {
                best_inliers: 0,
                required,
            });
        };

        if best_inliers.len() < required {
            return Err(LineFitError::NoConsensus {
                best_inliers: best_inliers.len(),
                required,
            });
        }

        let consensus: Vec<Point> = best_inliers.iter().map(|&i| points[i]).collect();
        let model = fit_least_squares(&consensus).ok_or(LineFitError::NoConsensus {
            best_inliers: best_inliers.len(),
            required,
        })?;

        Ok(LineFit {
            model,
            inliers: best_inliers,
            trials,
            threshold,
        })
    }

    /// Slope of the robust fit
    pub fn slope(&self, points: &PointSet) -> Result<f64, LineFitError> {
        Ok(self.fit(points)?.model.slope)
    }
}
