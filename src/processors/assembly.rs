//! Output records: the labeled star catalog, the analysis summary and the
//! per-cluster color-magnitude rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::loaders::Star;
use crate::core::transforms::{absolute_magnitude, star_position, Position};
use crate::processors::summary::Cluster;

/// One row of the labeled star catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStar {
    pub source_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub bp_rp: Option<f64>,
    pub phot_g_mean_mag: f64,
    pub pmra: f64,
    pub pmdec: f64,
    pub radial_velocity: f64,
    pub cluster_id: i32,
    pub v_tot: f64,
}

impl LabeledStar {
    pub fn distance_pc(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn absolute_magnitude(&self) -> f64 {
        absolute_magnitude(self.phot_g_mean_mag, self.distance_pc())
    }
}

/// Cluster summaries plus the runaway list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub clusters: Vec<Cluster>,
    pub runaways: Vec<i64>,
}

impl AnalysisSummary {
    pub fn cluster(&self, id: i32) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Source ids claimed by any cluster tail.
    pub fn tail_ids(&self) -> HashSet<i64> {
        self.clusters
            .iter()
            .flat_map(|c| c.tail_members.iter().copied())
            .collect()
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub stars: Vec<LabeledStar>,
    pub summary: AnalysisSummary,
}

impl AnalysisResult {
    pub fn noise_count(&self) -> usize {
        self.stars.iter().filter(|s| s.cluster_id < 0).count()
    }
}

/// Zip the per-star stage outputs into the final artifacts.
///
/// All slices are parallel to `stars` and in catalog order.
pub fn assemble(
    stars: &[Star],
    positions: &[Position],
    labels: &[i32],
    v_tot: &[f64],
    clusters: Vec<Cluster>,
    runaways: Vec<i64>,
) -> AnalysisResult {
    let labeled = stars
        .iter()
        .zip(positions)
        .zip(labels.iter().zip(v_tot))
        .map(|((star, pos), (&cluster_id, &v_tot))| LabeledStar {
            source_id: star.source_id,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            bp_rp: star.bp_rp,
            phot_g_mean_mag: star.phot_g_mean_mag,
            pmra: star.pmra,
            pmdec: star.pmdec,
            radial_velocity: star.radial_velocity,
            cluster_id,
            v_tot,
        })
        .collect();

    AnalysisResult {
        stars: labeled,
        summary: AnalysisSummary { clusters, runaways },
    }
}

/// A point on the color-magnitude (HR) diagram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrPoint {
    pub source_id: i64,
    pub bp_rp: f64,
    pub abs_mag: f64,
}

/// HR points for the catalog stars listed in `members`.
///
/// Stars without a color are skipped.
pub fn hr_points(stars: &[Star], members: &[i64]) -> Vec<HrPoint> {
    let wanted: HashSet<i64> = members.iter().copied().collect();
    stars
        .iter()
        .filter(|s| wanted.contains(&s.source_id))
        .filter_map(|s| {
            let bp_rp = s.bp_rp?;
            Some(HrPoint {
                source_id: s.source_id,
                bp_rp,
                abs_mag: absolute_magnitude(s.phot_g_mean_mag, star_position(s).dist_pc),
            })
        })
        .collect()
}

/// HR points for the labeled stars of one cluster.
pub fn hr_points_labeled(stars: &[LabeledStar], cluster_id: i32) -> Vec<HrPoint> {
    stars
        .iter()
        .filter(|s| s.cluster_id == cluster_id)
        .filter_map(|s| {
            Some(HrPoint {
                source_id: s.source_id,
                bp_rp: s.bp_rp?,
                abs_mag: s.absolute_magnitude(),
            })
        })
        .collect()
}
