//! Configuration types for the comoving group pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Offline selection cuts applied when the catalog is loaded.
///
/// All cuts are disabled by default; the acquisition step is expected to have
/// applied them already.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Keep only stars closer than this many parsecs (e.g. 650)
    #[serde(default)]
    pub max_distance_pc: Option<f64>,

    /// Drop stars fainter than this G magnitude (e.g. 13)
    #[serde(default)]
    pub max_g_mag: Option<f64>,

    /// Keep only the first N accepted rows
    #[serde(default)]
    pub max_stars: Option<usize>,
}

/// Which clusters of the condensed tree are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSelection {
    /// Every leaf of the condensed cluster tree (fine-grained, purer groups)
    Leaf,
    /// Stability-maximizing flat cut
    ExcessOfMass,
}

impl Default for ClusterSelection {
    fn default() -> Self {
        ClusterSelection::Leaf
    }
}

/// Configuration for HDBSCAN clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Smallest group reported as a cluster
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Neighbor count used for the core distance, not counting the point itself
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Cluster selection method
    #[serde(default)]
    pub selection: ClusterSelection,
}

fn default_min_cluster_size() -> usize {
    50
}

fn default_min_samples() -> usize {
    15
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            min_samples: default_min_samples(),
            selection: ClusterSelection::default(),
        }
    }
}

/// Thresholds for tidal-tail membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// Floor applied to each cluster velocity dispersion
    #[serde(default = "default_sigma_floor")]
    pub sigma_floor: f64,

    /// Upper bound (exclusive) on the normalized squared velocity distance
    #[serde(default = "default_kinematic_threshold_sq")]
    pub kinematic_threshold_sq: f64,

    /// Search radius around the cluster centroid in parsecs
    #[serde(default = "default_spatial_radius_pc")]
    pub spatial_radius_pc: f64,
}

fn default_sigma_floor() -> f64 {
    0.1
}

fn default_kinematic_threshold_sq() -> f64 {
    9.0
}

fn default_spatial_radius_pc() -> f64 {
    100.0
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            sigma_floor: default_sigma_floor(),
            kinematic_threshold_sq: default_kinematic_threshold_sq(),
            spatial_radius_pc: default_spatial_radius_pc(),
        }
    }
}

/// Threshold for runaway flagging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunawayConfig {
    /// Stars strictly faster than this (km/s) are runaways
    #[serde(default = "default_min_total_velocity")]
    pub min_total_velocity_kms: f64,
}

fn default_min_total_velocity() -> f64 {
    100.0
}

impl Default for RunawayConfig {
    fn default() -> Self {
        Self {
            min_total_velocity_kms: default_min_total_velocity(),
        }
    }
}

/// Output file names, relative to the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_stars_file")]
    pub stars_file: String,

    #[serde(default = "default_analysis_file")]
    pub analysis_file: String,
}

fn default_stars_file() -> String {
    "stars.json".to_string()
}

fn default_analysis_file() -> String {
    "analysis.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stars_file: default_stars_file(),
            analysis_file: default_analysis_file(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub tails: TailConfig,

    #[serde(default)]
    pub runaways: RunawayConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
