use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Tunables for the three analyses. Every field has a default, so partial
/// TOML files and sparse environments both work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

impl AnalyticsConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `HANDSET_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("HANDSET_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            similarity: SimilarityConfig::from_env_profiled(p),
            segmentation: SegmentationConfig::from_env_profiled(p),
            anomaly: AnomalyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.similarity.validate()?;
        self.segmentation.validate()?;
        self.anomaly.validate()
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  similarity:   top_k={}, blend={}/{}, space={:?}",
            self.similarity.top_k,
            self.similarity.cosine_weight,
            self.similarity.distance_weight,
            self.similarity.distance_space
        );
        tracing::info!(
            "  segmentation: restarts={}, max_iter={}, tol={}, seed={}",
            self.segmentation.restarts,
            self.segmentation.max_iterations,
            self.segmentation.tolerance,
            self.segmentation
                .seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(entropy)".to_string())
        );
        tracing::info!(
            "  anomaly:      residual_sigma={}, outlier_z={}",
            self.anomaly.residual_sigma,
            self.anomaly.outlier_z
        );
    }
}

// ── Similarity ────────────────────────────────────────────────

/// Space in which the weighted Euclidean distance is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSpace {
    /// Raw attribute units (mAh, GB, USD, ...).
    Raw,
    /// z-scored values, same parameters as the cosine term.
    Normalized,
}

impl std::str::FromStr for DistanceSpace {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(DistanceSpace::Raw),
            "normalized" | "normalised" => Ok(DistanceSpace::Normalized),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown distance space '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_cosine_weight")]
    pub cosine_weight: f64,
    #[serde(default = "default_distance_weight")]
    pub distance_weight: f64,
    /// Per-dimension weights in `[ram, battery, screen, weight, year, price]` order.
    #[serde(default = "default_feature_weights")]
    pub feature_weights: [f64; 6],
    #[serde(default = "default_distance_space")]
    pub distance_space: DistanceSpace,
}

fn default_top_k() -> usize { 5 }
fn default_cosine_weight() -> f64 { 0.7 }
fn default_distance_weight() -> f64 { 0.3 }
fn default_feature_weights() -> [f64; 6] { [1.0, 1.0, 1.0, 0.5, 0.5, 2.0] }
fn default_distance_space() -> DistanceSpace { DistanceSpace::Raw }

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            cosine_weight: default_cosine_weight(),
            distance_weight: default_distance_weight(),
            feature_weights: default_feature_weights(),
            distance_space: default_distance_space(),
        }
    }
}

impl SimilarityConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            top_k: profiled_env_parse(p, "SIMILARITY_TOP_K", default_top_k()),
            cosine_weight: profiled_env_parse(p, "SIMILARITY_COSINE_WEIGHT", default_cosine_weight()),
            distance_weight: profiled_env_parse(
                p,
                "SIMILARITY_DISTANCE_WEIGHT",
                default_distance_weight(),
            ),
            feature_weights: default_feature_weights(),
            distance_space: profiled_env_parse(
                p,
                "SIMILARITY_DISTANCE_SPACE",
                default_distance_space(),
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(AnalyticsError::InvalidArgument(
                "similarity.top_k must be >= 1".to_string(),
            ));
        }
        check_non_negative("similarity.cosine_weight", self.cosine_weight)?;
        check_non_negative("similarity.distance_weight", self.distance_weight)?;
        for (i, w) in self.feature_weights.iter().enumerate() {
            check_non_negative(&format!("similarity.feature_weights[{i}]"), *w)?;
        }
        Ok(())
    }
}

// ── Segmentation ──────────────────────────────────────────────

/// Fewest k-means restarts a segmentation may run with.
pub const MIN_RESTARTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Independent k-means runs; the lowest-inertia one is kept.
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Fixed RNG seed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_restarts() -> usize { 10 }
fn default_max_iterations() -> usize { 1000 }
fn default_tolerance() -> f64 { 1e-6 }

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            restarts: default_restarts(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            seed: None,
        }
    }
}

impl SegmentationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            restarts: profiled_env_parse(p, "KMEANS_RESTARTS", default_restarts()),
            max_iterations: profiled_env_parse(p, "KMEANS_MAX_ITERATIONS", default_max_iterations()),
            tolerance: profiled_env_parse(p, "KMEANS_TOLERANCE", default_tolerance()),
            seed: profiled_env_opt(p, "KMEANS_SEED").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Same settings with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.restarts < MIN_RESTARTS {
            return Err(AnalyticsError::InvalidArgument(format!(
                "segmentation.restarts must be >= {MIN_RESTARTS}, got {}",
                self.restarts
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnalyticsError::InvalidArgument(
                "segmentation.max_iterations must be >= 1".to_string(),
            ));
        }
        check_non_negative("segmentation.tolerance", self.tolerance)
    }
}

// ── Anomaly ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Residuals beyond this many standard deviations are flagged.
    #[serde(default = "default_residual_sigma")]
    pub residual_sigma: f64,
    /// |z| above which a spec dimension counts as an outlier.
    #[serde(default = "default_outlier_z")]
    pub outlier_z: f64,
}

fn default_residual_sigma() -> f64 { 2.0 }
fn default_outlier_z() -> f64 { 2.0 }

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            residual_sigma: default_residual_sigma(),
            outlier_z: default_outlier_z(),
        }
    }
}

impl AnomalyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            residual_sigma: profiled_env_parse(p, "ANOMALY_RESIDUAL_SIGMA", default_residual_sigma()),
            outlier_z: profiled_env_parse(p, "ANOMALY_OUTLIER_Z", default_outlier_z()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("anomaly.residual_sigma", self.residual_sigma)?;
        check_positive("anomaly.outlier_z", self.outlier_z)
    }
}

fn check_non_negative(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidArgument(format!("{name} must be finite and >= 0, got {v}")))
    }
}

fn check_positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidArgument(format!("{name} must be finite and > 0, got {v}")))
    }
}
