//! End-to-end analysis: catalog in, labeled catalog and summary out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::PipelineConfig;
use crate::core::loaders::{self, Catalog};
use crate::core::transforms::catalog_positions;
use crate::core::writers;
use crate::processors::assembly::{assemble, hr_points, AnalysisResult};
use crate::processors::clustering::{hdbscan, label_counts, HdbscanParams, NOISE};
use crate::processors::features::standardized_features;
use crate::processors::runaways::{find_runaways, total_velocities};
use crate::processors::summary::summarize_clusters;
use crate::processors::tails::detect_tail_members;

/// Paths written by [`analyze_catalog_file`].
#[derive(Debug, Clone)]
pub struct AnalysisOutputs {
    pub stars_json: PathBuf,
    pub analysis_json: PathBuf,
    pub stars_csv: Option<PathBuf>,
    /// Catalog rows rejected by the loader
    pub dropped_rows: usize,
}

/// Run every analysis stage on an in-memory catalog.
///
/// No I/O happens here; the same catalog and configuration always produce
/// the same result.
pub fn run_analysis(catalog: &Catalog, config: &PipelineConfig) -> Result<AnalysisResult> {
    let stars = &catalog.stars;
    info!("Analyzing {} stars", stars.len());

    let positions = catalog_positions(stars);

    let (features, scaler) = standardized_features(stars, &positions);
    debug!("Feature mean {:?}, scale {:?}", scaler.mean, scaler.scale);

    let params = HdbscanParams::from(&config.clustering);
    let labels = hdbscan(&features, &params).context("clustering failed")?;

    let mut clusters = summarize_clusters(stars, &positions, &labels);
    let noise = label_counts(&labels).get(&NOISE).copied().unwrap_or(0);
    info!(
        "Found {} clusters ({} noise stars, min_cluster_size={}, min_samples={})",
        clusters.len(),
        noise,
        params.min_cluster_size,
        params.min_samples
    );

    detect_tail_members(&mut clusters, stars, &positions, &labels, &config.tails);
    let tail_total: usize = clusters.iter().map(|c| c.tail_members.len()).sum();
    info!("Tail candidates across all clusters: {}", tail_total);

    let v_tot = total_velocities(stars);
    let runaways = find_runaways(stars, &v_tot, &config.runaways);
    info!(
        "Runaways (v_tot > {} km/s): {}",
        config.runaways.min_total_velocity_kms,
        runaways.len()
    );

    Ok(assemble(stars, &positions, &labels, &v_tot, clusters, runaways))
}

/// Load a catalog CSV, analyze it and write the artifacts into `output_dir`.
///
/// # Arguments
///
/// * `input` - Catalog CSV path
/// * `output_dir` - Directory for `stars.json`/`analysis.json` (created if missing)
/// * `config` - Pipeline configuration
/// * `write_csv` - Also write the labeled catalog as CSV next to the JSON
pub fn analyze_catalog_file(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    write_csv: bool,
) -> Result<(AnalysisResult, AnalysisOutputs)> {
    let catalog = loaders::load_catalog_csv(input, Some(&config.catalog))
        .with_context(|| format!("failed to load catalog {}", input.display()))?;

    let result = run_analysis(&catalog, config)?;

    let stars_json = output_dir.join(&config.output.stars_file);
    let analysis_json = output_dir.join(&config.output.analysis_file);

    writers::write_stars_json(&stars_json, &result.stars)?;
    writers::write_analysis_json(&analysis_json, &result.summary)?;
    info!(
        "Wrote {} and {}",
        stars_json.display(),
        analysis_json.display()
    );

    let stars_csv = if write_csv {
        let path = stars_json.with_extension("csv");
        writers::write_stars_csv(&path, &result.stars)?;
        info!("Wrote {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok((
        result,
        AnalysisOutputs {
            stars_json,
            analysis_json,
            stars_csv,
            dropped_rows: catalog.dropped,
        },
    ))
}

/// Write the color-magnitude rows of one cluster.
///
/// Members come from a previous run's `analysis.json`; colors and magnitudes
/// from the catalog. Returns the number of rows written.
pub fn export_cluster_hr(
    catalog_path: &Path,
    analysis_path: &Path,
    cluster_id: i32,
    output: &Path,
    config: &PipelineConfig,
) -> Result<usize> {
    let summary = loaders::load_analysis(analysis_path)
        .with_context(|| format!("failed to load analysis {}", analysis_path.display()))?;
    let cluster = summary
        .cluster(cluster_id)
        .with_context(|| format!("cluster {} not found in {}", cluster_id, analysis_path.display()))?;

    let catalog = loaders::load_catalog_csv(catalog_path, Some(&config.catalog))
        .with_context(|| format!("failed to load catalog {}", catalog_path.display()))?;

    let points = hr_points(&catalog.stars, &cluster.members);
    if points.len() < cluster.members.len() {
        debug!(
            "Cluster {}: {} of {} members have no color or are missing from the catalog",
            cluster_id,
            cluster.members.len() - points.len(),
            cluster.members.len()
        );
    }

    writers::write_hr_csv(output, &points)?;
    info!("Wrote {} HR rows to {}", points.len(), output.display());

    Ok(points.len())
}
