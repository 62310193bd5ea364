//! Analysis stages, in pipeline order.

pub mod assembly;
pub mod clustering;
pub mod features;
pub mod pipeline;
pub mod runaways;
pub mod summary;
pub mod tails;

// Re-export key types for convenience
pub use assembly::{AnalysisResult, AnalysisSummary, HrPoint, LabeledStar};
pub use clustering::{hdbscan, ClusteringError, HdbscanParams, NOISE};
pub use pipeline::{analyze_catalog_file, run_analysis};
pub use summary::Cluster;
