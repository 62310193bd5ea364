//! Runaway star flagging by total speed.

use rayon::prelude::*;

use crate::config::RunawayConfig;
use crate::core::loaders::Star;
use crate::core::transforms::total_velocity;

/// Total speed (km/s) of every star, in catalog order.
pub fn total_velocities(stars: &[Star]) -> Vec<f64> {
    stars.par_iter().map(total_velocity).collect()
}

/// Source ids of stars strictly faster than the configured threshold, in
/// catalog order. Cluster labels play no part.
pub fn find_runaways(stars: &[Star], v_tot: &[f64], config: &RunawayConfig) -> Vec<i64> {
    stars
        .iter()
        .zip(v_tot)
        .filter(|(_, &v)| v > config.min_total_velocity_kms)
        .map(|(s, _)| s.source_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::K_TANGENTIAL;

    fn star(source_id: i64, pmra: f64, radial_velocity: f64) -> Star {
        Star {
            source_id,
            ra: 10.0,
            dec: 10.0,
            parallax: K_TANGENTIAL,
            pmra,
            pmdec: 0.0,
            radial_velocity,
            phot_g_mean_mag: 12.0,
            bp_rp: Some(1.2),
        }
    }

    #[test]
    fn test_runaway_threshold() {
        let stars = vec![
            star(1, 150.0, 0.0),
            star(2, 0.0, 100.0),
            star(3, 0.0, -100.5),
            star(4, 60.0, 70.0),
        ];
        let v_tot = total_velocities(&stars);

        assert!((v_tot[0] - 150.0).abs() < 1e-9);
        assert!((v_tot[1] - 100.0).abs() < 1e-12);
        assert!(v_tot[3] < 100.0);

        let runaways = find_runaways(&stars, &v_tot, &RunawayConfig::default());
        // exactly 100 km/s is not a runaway
        assert_eq!(runaways, vec![1, 3]);
    }

    #[test]
    fn test_custom_threshold() {
        let stars = vec![star(1, 30.0, 0.0), star(2, 10.0, 0.0)];
        let v_tot = total_velocities(&stars);
        let config = RunawayConfig {
            min_total_velocity_kms: 20.0,
        };
        assert_eq!(find_runaways(&stars, &v_tot, &config), vec![1]);
    }
}
