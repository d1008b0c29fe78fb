use crate::logging::LoggingConfig;
use crate::transport::WireEncoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub icp: IcpConfig,
    pub coarse_rotation: CoarseRotationConfig,
    pub ransac: RansacConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// Construction-time parameters of the ICP engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    pub max_iterations: usize,
    /// Pairs at or beyond this distance are rejected
    pub distance_threshold: f64,
    pub convergence_translation_threshold: f64,
    /// Radians
    pub convergence_rotation_threshold: f64,
    /// Fewer pairs than this ends the loop
    pub point_pairs_threshold: usize,
    pub neighbor_search: NeighborSearch,
    /// Optional wall-clock budget for one run
    pub max_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    KdTree,
    BruteForce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoarseRotationConfig {
    pub enabled: bool,
    /// Fractions of the flange x-extent isolating its straight edge
    pub flange_window: (f64, f64),
    /// Fractions of the tread x-extent isolating its straight edge
    pub tread_window: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_trials: usize,
    /// Vertical residual tolerance; `None` uses the median absolute deviation of y
    pub residual_threshold: Option<f64>,
    pub min_inliers: usize,
    pub stop_probability: f64,
    /// Fixed seed for reproducible sampling; `None` draws a fresh seed per call
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub bind_address: String,
    pub encoding: WireEncoding,
    pub max_frame_bytes: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            distance_threshold: 1.5,
            convergence_translation_threshold: 1e-3,
            convergence_rotation_threshold: 1e-5,
            point_pairs_threshold: 10,
            neighbor_search: NeighborSearch::KdTree,
            max_duration_ms: None,
        }
    }
}

impl IcpConfig {
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_point_pairs_threshold(mut self, count: usize) -> Self {
        self.point_pairs_threshold = count;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_neighbor_search(mut self, search: NeighborSearch) -> Self {
        self.neighbor_search = search;
        self
    }

    pub fn with_max_duration_ms(mut self, ms: u64) -> Self {
        self.max_duration_ms = Some(ms);
        self
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.max_iterations == 0 {
            errors.push("ICP max_iterations must be positive".to_string());
        }
        if !(self.distance_threshold >= 0.0) {
            errors.push("ICP distance_threshold must be non-negative".to_string());
        }
        if !(self.convergence_translation_threshold > 0.0) {
            errors.push("ICP convergence_translation_threshold must be positive".to_string());
        }
        if !(self.convergence_rotation_threshold > 0.0) {
            errors.push("ICP convergence_rotation_threshold must be positive".to_string());
        }
    }
}

impl Default for CoarseRotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            flange_window: (0.6, 1.0),
            tread_window: (0.6, 0.9),
        }
    }
}

impl CoarseRotationConfig {
    fn validate_into(&self, errors: &mut Vec<String>) {
        for (name, (lo, hi)) in [("flange_window", self.flange_window), ("tread_window", self.tread_window)] {
            if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
                errors.push(format!(
                    "Coarse rotation {} must satisfy 0 <= lower < upper <= 1, got ({}, {})",
                    name, lo, hi
                ));
            }
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_trials: 100,
            residual_threshold: None,
            min_inliers: 2,
            stop_probability: 0.99,
            seed: None,
        }
    }
}

impl RansacConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_residual_threshold(mut self, threshold: f64) -> Self {
        self.residual_threshold = Some(threshold);
        self
    }

    pub fn with_max_trials(mut self, trials: usize) -> Self {
        self.max_trials = trials;
        self
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.max_trials == 0 {
            errors.push("RANSAC max_trials must be positive".to_string());
        }
        if let Some(threshold) = self.residual_threshold {
            if !(threshold >= 0.0) {
                errors.push("RANSAC residual_threshold must be non-negative".to_string());
            }
        }
        if self.min_inliers < 2 {
            errors.push("RANSAC min_inliers must be at least 2".to_string());
        }
        if !(self.stop_probability > 0.0 && self.stop_probability <= 1.0) {
            errors.push("RANSAC stop_probability must be in (0, 1]".to_string());
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5555".to_string(),
            encoding: WireEncoding::Binary,
            max_frame_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        self.icp.validate_into(&mut errors);
        self.coarse_rotation.validate_into(&mut errors);
        self.ransac.validate_into(&mut errors);

        if self.transport.max_frame_bytes == 0 {
            errors.push("Transport max_frame_bytes must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => match Config::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    eprintln!("Configuration validation errors:");
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                    eprintln!("Using default configuration instead.");
                    Config::default()
                } else {
                    config
                }
            }
            Err(e) => {
                eprintln!("Failed to load config from '{}': {}", path.display(), e);
                eprintln!("Using default configuration.");
                Config::default()
            }
        },
        None => Config::default(),
    }
}
