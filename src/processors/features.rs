//! Clustering feature space.
//!
//! Each star maps to `(x, y, z, pmra, pmdec, radial_velocity)`: position in
//! parsecs next to proper motion in mas/yr and radial velocity in km/s. Units
//! are mixed on purpose; standardization puts every dimension on the same
//! footing before distances are taken.

use rayon::prelude::*;

use crate::core::loaders::Star;
use crate::core::transforms::Position;

/// Number of clustering dimensions.
pub const FEATURE_DIMS: usize = 6;

/// A single row of the feature matrix.
pub type Feature = [f64; FEATURE_DIMS];

/// Per-dimension centering and scaling fitted on a feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub mean: Feature,
    /// Population standard deviation, or 1.0 for a constant dimension
    pub scale: Feature,
}

impl Standardizer {
    /// Fit mean and scale on the given rows.
    ///
    /// Returns an identity transform for an empty input.
    pub fn fit(rows: &[Feature]) -> Self {
        let mut mean = [0.0; FEATURE_DIMS];
        let mut scale = [1.0; FEATURE_DIMS];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        let n = rows.len() as f64;
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut var = [0.0; FEATURE_DIMS];
        for row in rows {
            for d in 0..FEATURE_DIMS {
                let dv = row[d] - mean[d];
                var[d] += dv * dv;
            }
        }
        for d in 0..FEATURE_DIMS {
            let std = (var[d] / n).sqrt();
            // constant dimension: leave unscaled so it standardizes to zero
            if std > 0.0 && std.is_finite() {
                scale[d] = std;
            }
        }

        Self { mean, scale }
    }

    /// Apply the fitted transform to one row.
    #[inline]
    pub fn apply(&self, row: &Feature) -> Feature {
        let mut out = [0.0; FEATURE_DIMS];
        for d in 0..FEATURE_DIMS {
            out[d] = (row[d] - self.mean[d]) / self.scale[d];
        }
        out
    }

    /// Apply the fitted transform to every row.
    pub fn transform(&self, rows: &[Feature]) -> Vec<Feature> {
        rows.par_iter().map(|row| self.apply(row)).collect()
    }
}

/// Raw (unstandardized) feature row for one star.
#[inline]
pub fn raw_feature(star: &Star, pos: &Position) -> Feature {
    [
        pos.x,
        pos.y,
        pos.z,
        star.pmra,
        star.pmdec,
        star.radial_velocity,
    ]
}

/// Build the raw feature matrix, one row per star in catalog order.
pub fn compose_features(stars: &[Star], positions: &[Position]) -> Vec<Feature> {
    debug_assert_eq!(
        stars.len(),
        positions.len(),
        "stars and positions must have same length"
    );

    stars
        .par_iter()
        .zip(positions.par_iter())
        .map(|(star, pos)| raw_feature(star, pos))
        .collect()
}

/// Build and standardize the feature matrix.
///
/// Returns the zero-mean, unit-variance rows together with the fitted
/// [`Standardizer`].
pub fn standardized_features(
    stars: &[Star],
    positions: &[Position],
) -> (Vec<Feature>, Standardizer) {
    let raw = compose_features(stars, positions);
    let scaler = Standardizer::fit(&raw);
    let scaled = scaler.transform(&raw);
    (scaled, scaler)
}
