use crate::pipeline::{Point, PointSet, Transform2D};
use crate::service::LabeledScan;
use anyhow::anyhow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Shape and corruption parameters for synthetic wheel profiles (millimetres)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticProfileConfig {
    /// Lateral extent of the profile
    pub width: f64,
    /// Distance between consecutive samples along x
    pub spacing: f64,
    /// Height of the flange above the tread
    pub flange_height: f64,
    /// Gaussian noise standard deviation applied to y
    pub noise_std: f64,
    /// Share of samples replaced by outliers, in [0, 1)
    pub outlier_ratio: f64,
    /// Outlier y offsets are drawn from `±outlier_scale`
    pub outlier_scale: f64,
    pub seed: u64,
}

impl Default for SyntheticProfileConfig {
    fn default() -> Self {
        Self {
            width: 140.0,
            spacing: 0.5,
            flange_height: 28.0,
            noise_std: 0.0,
            outlier_ratio: 0.0,
            outlier_scale: 5.0,
            seed: 42,
        }
    }
}

impl SyntheticProfileConfig {
    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    pub fn with_outliers(mut self, ratio: f64, scale: f64) -> Self {
        self.outlier_ratio = ratio;
        self.outlier_scale = scale;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generates wheel cross-sections: a flange hump on the left, a 1:20 coned
/// tread and a chamfer at the outer edge.
pub struct ProfileGenerator {
    config: SyntheticProfileConfig,
    rng: StdRng,
}

impl ProfileGenerator {
    pub fn new(config: SyntheticProfileConfig) -> crate::Result<Self> {
        if !(config.spacing > 0.0) || !(config.width > 0.0) {
            return Err(anyhow!("Profile width and spacing must be positive"));
        }
        if !(0.0..1.0).contains(&config.outlier_ratio) {
            return Err(anyhow!("Outlier ratio must be in [0, 1), got {}", config.outlier_ratio));
        }
        if !(config.noise_std >= 0.0) {
            return Err(anyhow!("Noise standard deviation must be non-negative"));
        }

        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &SyntheticProfileConfig {
        &self.config
    }

    /// Noise-free profile height at lateral position `x`
    pub fn height_at(&self, x: f64) -> f64 {
        let flange = self.config.flange_height * (-((x - 12.0) / 7.0).powi(2)).exp();
        let cone = -0.05 * x;
        let chamfer_start = self.config.width - 15.0;
        let chamfer = if x > chamfer_start { -0.6 * (x - chamfer_start) } else { 0.0 };
        flange + cone + chamfer
    }

    /// Noise-free samples along the full width
    pub fn clean_profile(&self) -> PointSet {
        let samples = (self.config.width / self.config.spacing).floor() as usize + 1;
        (0..samples)
            .map(|i| {
                let x = i as f64 * self.config.spacing;
                Point::new(x, self.height_at(x))
            })
            .collect()
    }

    /// Apply the configured noise and outliers to `points`
    pub fn corrupt(&mut self, points: &PointSet) -> crate::Result<PointSet> {
        let noise = Normal::new(0.0, self.config.noise_std)?;
        let mut out = Vec::with_capacity(points.len());

        for p in points {
            let mut y = p.y;
            if self.config.noise_std > 0.0 {
                y += noise.sample(&mut self.rng);
            }
            if self.config.outlier_ratio > 0.0 && self.rng.gen::<f64>() < self.config.outlier_ratio {
                y += self.rng.gen_range(-self.config.outlier_scale..=self.config.outlier_scale);
            }
            out.push(Point::new(p.x, y));
        }

        Ok(PointSet::new(out))
    }

    /// A noisy profile
    pub fn profile(&mut self) -> crate::Result<PointSet> {
        let clean = self.clean_profile();
        self.corrupt(&clean)
    }

    /// Flange and tread scans of the same wheel: the tread is a corrupted
    /// profile, the flange a separately corrupted profile moved by `truth`.
    pub fn scan_pair(&mut self, truth: &Transform2D) -> crate::Result<(LabeledScan, LabeledScan)> {
        let clean = self.clean_profile();
        let tread = self.corrupt(&clean)?;
        let flange = truth.apply_to_set(&self.corrupt(&clean)?);
        Ok((LabeledScan::new("Flange", flange), LabeledScan::new("Tread", tread)))
    }
}
