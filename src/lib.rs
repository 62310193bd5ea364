//! Comoving stellar group detection.
//!
//! This crate provides tools for:
//! - Loading astrometric star catalogs (position, parallax, proper motion, radial velocity)
//! - Converting sky positions and parallaxes to heliocentric Cartesian coordinates
//! - HDBSCAN clustering in a standardized position/velocity space (parallelized)
//! - Per-cluster statistics, tidal-tail membership and runaway flagging
//! - Writing labeled catalogs and summaries, exporting HR data and rendering plots
//!
//! # Example
//!
//! ```no_run
//! use comoving_groups::{core::loaders::load_catalog_csv, processors::pipeline::run_analysis};
//! use comoving_groups::PipelineConfig;
//!
//! let catalog = load_catalog_csv("gaia_stars.csv", None).unwrap();
//! let result = run_analysis(&catalog, &PipelineConfig::default()).unwrap();
//! println!("{} clusters", result.summary.clusters.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use crate::config::{ClusterSelection, ClusteringConfig, PipelineConfig, RunawayConfig, TailConfig};
pub use crate::core::loaders::{Catalog, Star};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
