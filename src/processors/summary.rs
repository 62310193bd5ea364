//! Per-cluster statistics in physical units.

use serde::{Deserialize, Serialize};

use crate::core::loaders::Star;
use crate::core::transforms::Position;
use crate::processors::clustering::NOISE;

/// Summary of one detected group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i32,
    pub count: usize,
    /// Mean (x, y, z) in parsecs
    pub pos: [f64; 3],
    /// Mean (pmra, pmdec, radial_velocity)
    pub vel: [f64; 3],
    pub std_pos: [f64; 3],
    pub std_vel: [f64; 3],
    /// Member source ids in catalog order
    pub members: Vec<i64>,
    /// Noise stars matching this cluster's kinematics; filled in by tail detection
    #[serde(default)]
    pub tail_members: Vec<i64>,
}

/// Mean and sample standard deviation of each column.
///
/// A single row has standard deviation zero.
fn mean_and_std(rows: &[[f64; 3]]) -> ([f64; 3], [f64; 3]) {
    let n = rows.len();
    let mut mean = [0.0; 3];
    let mut std = [0.0; 3];
    if n == 0 {
        return (mean, std);
    }

    for row in rows {
        for d in 0..3 {
            mean[d] += row[d];
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    if n > 1 {
        for row in rows {
            for d in 0..3 {
                std[d] += (row[d] - mean[d]).powi(2);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / (n - 1) as f64).sqrt();
        }
    }

    (mean, std)
}

/// Build one [`Cluster`] per non-noise label, in ascending label order.
///
/// `stars`, `positions` and `labels` are parallel slices in catalog order.
/// `tail_members` is left empty.
pub fn summarize_clusters(stars: &[Star], positions: &[Position], labels: &[i32]) -> Vec<Cluster> {
    debug_assert_eq!(stars.len(), labels.len());
    debug_assert_eq!(positions.len(), labels.len());

    let mut ids: Vec<i32> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| {
            let indices: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == id)
                .map(|(i, _)| i)
                .collect();

            let pos_rows: Vec<[f64; 3]> = indices.iter().map(|&i| positions[i].xyz()).collect();
            let vel_rows: Vec<[f64; 3]> = indices
                .iter()
                .map(|&i| {
                    let s = &stars[i];
                    [s.pmra, s.pmdec, s.radial_velocity]
                })
                .collect();

            let (pos, std_pos) = mean_and_std(&pos_rows);
            let (vel, std_vel) = mean_and_std(&vel_rows);

            Cluster {
                id,
                count: indices.len(),
                pos,
                vel,
                std_pos,
                std_vel,
                members: indices.iter().map(|&i| stars[i].source_id).collect(),
                tail_members: Vec::new(),
            }
        })
        .collect()
}
