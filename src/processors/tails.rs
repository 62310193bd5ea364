//! Tidal-tail detection.
//!
//! A noise star belongs to the tail of a cluster when it moves like the
//! cluster (normalized velocity distance below the threshold) while sitting
//! within the search radius of the cluster centroid. A star may be claimed by
//! more than one cluster.

use rayon::prelude::*;

use crate::config::TailConfig;
use crate::core::loaders::Star;
use crate::core::transforms::Position;
use crate::processors::clustering::NOISE;
use crate::processors::summary::Cluster;

/// Squared velocity distance of `vel` from the cluster mean, each component
/// scaled by the cluster dispersion (floored at `sigma_floor`).
#[inline]
pub fn kinematic_distance_sq(cluster: &Cluster, vel: [f64; 3], sigma_floor: f64) -> f64 {
    (0..3)
        .map(|d| {
            let sigma = cluster.std_vel[d].max(sigma_floor);
            ((vel[d] - cluster.vel[d]) / sigma).powi(2)
        })
        .sum()
}

/// Squared distance in parsecs from the cluster centroid.
#[inline]
pub fn spatial_distance_sq(cluster: &Cluster, pos: [f64; 3]) -> f64 {
    (0..3).map(|d| (pos[d] - cluster.pos[d]).powi(2)).sum()
}

/// Source ids of the noise stars in the tail of `cluster`, in catalog order.
pub fn tail_members_of(
    cluster: &Cluster,
    stars: &[Star],
    positions: &[Position],
    labels: &[i32],
    config: &TailConfig,
) -> Vec<i64> {
    let radius_sq = config.spatial_radius_pc * config.spatial_radius_pc;

    labels
        .iter()
        .enumerate()
        .filter(|(_, &label)| label == NOISE)
        .filter(|(i, _)| {
            let s = &stars[*i];
            let dv = kinematic_distance_sq(
                cluster,
                [s.pmra, s.pmdec, s.radial_velocity],
                config.sigma_floor,
            );
            dv < config.kinematic_threshold_sq
                && spatial_distance_sq(cluster, positions[*i].xyz()) < radius_sq
        })
        .map(|(i, _)| stars[i].source_id)
        .collect()
}

/// Fill `tail_members` for every cluster.
///
/// Clusters are scanned in parallel. Member lists are left untouched.
pub fn detect_tail_members(
    clusters: &mut [Cluster],
    stars: &[Star],
    positions: &[Position],
    labels: &[i32],
    config: &TailConfig,
) {
    clusters.par_iter_mut().for_each(|cluster| {
        cluster.tail_members = tail_members_of(cluster, stars, positions, labels, config);
        if !cluster.tail_members.is_empty() {
            log::debug!(
                "Cluster {}: {} tail candidates",
                cluster.id,
                cluster.tail_members.len()
            );
        }
    });
}
