//! Coordinate and velocity transformations for astrometric measurements.
//!
//! Converts sky position plus parallax into heliocentric Cartesian positions
//! (equatorial frame, parsecs) and proper motions into tangential speeds. The
//! batch conversion is parallelized using Rayon.

use rayon::prelude::*;

use super::loaders::Star;

/// km/s per (mas/yr) at a parallax of 1 mas (one astronomical unit per year).
pub const K_TANGENTIAL: f64 = 4.74047;

/// Heliocentric Cartesian position of a star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Distance in parsecs
    pub dist_pc: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    #[inline]
    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Distance in parsecs from a parallax in milliarcseconds.
///
/// The parallax must be strictly positive; zero or negative values are
/// rejected by the loader and give meaningless distances here.
#[inline]
pub fn parallax_to_distance(parallax_mas: f64) -> f64 {
    1000.0 / parallax_mas
}

/// Convert equatorial sky position and distance to Cartesian coordinates.
///
/// Computes x = d cos(dec) cos(ra), y = d cos(dec) sin(ra), z = d sin(dec)
/// with angles given in degrees.
///
/// # Example
///
/// ```
/// use comoving_groups::core::transforms::equatorial_to_cartesian;
///
/// let [x, y, z] = equatorial_to_cartesian(90.0, 0.0, 10.0);
/// assert!(x.abs() < 1e-9 && (y - 10.0).abs() < 1e-9 && z.abs() < 1e-9);
/// ```
#[inline]
pub fn equatorial_to_cartesian(ra_deg: f64, dec_deg: f64, dist_pc: f64) -> [f64; 3] {
    let (sin_ra, cos_ra) = ra_deg.to_radians().sin_cos();
    let (sin_dec, cos_dec) = dec_deg.to_radians().sin_cos();
    [
        dist_pc * cos_dec * cos_ra,
        dist_pc * cos_dec * sin_ra,
        dist_pc * sin_dec,
    ]
}

/// Position of a single star.
#[inline]
pub fn star_position(star: &Star) -> Position {
    let dist_pc = parallax_to_distance(star.parallax);
    let [x, y, z] = equatorial_to_cartesian(star.ra, star.dec, dist_pc);
    Position { dist_pc, x, y, z }
}

/// Positions for every star, in catalog order.
pub fn catalog_positions(stars: &[Star]) -> Vec<Position> {
    stars.par_iter().map(star_position).collect()
}

/// Linear speed (km/s) of a proper motion component at the star's distance.
#[inline]
pub fn tangential_velocity(pm_mas_yr: f64, parallax_mas: f64) -> f64 {
    K_TANGENTIAL * pm_mas_yr / parallax_mas
}

/// Magnitude of (v_ra, v_dec, radial_velocity) in km/s.
///
/// The tangential components are taken along the local spherical directions;
/// no rotation into a Cartesian velocity is performed.
#[inline]
pub fn total_velocity(star: &Star) -> f64 {
    let v_ra = tangential_velocity(star.pmra, star.parallax);
    let v_dec = tangential_velocity(star.pmdec, star.parallax);
    let v_rad = star.radial_velocity;
    (v_ra * v_ra + v_dec * v_dec + v_rad * v_rad).sqrt()
}

/// Absolute magnitude from apparent magnitude and distance in parsecs.
#[inline]
pub fn absolute_magnitude(apparent_mag: f64, dist_pc: f64) -> f64 {
    apparent_mag + 5.0 - 5.0 * dist_pc.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(ra: f64, dec: f64, parallax: f64) -> Star {
        Star {
            source_id: 1,
            ra,
            dec,
            parallax,
            pmra: 0.0,
            pmdec: 0.0,
            radial_velocity: 0.0,
            phot_g_mean_mag: 10.0,
            bp_rp: Some(1.0),
        }
    }

    #[test]
    fn test_parallax_to_distance() {
        assert!((parallax_to_distance(10.0) - 100.0).abs() < 1e-12);
        assert!((parallax_to_distance(1.0) - 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_equatorial_to_cartesian_axes() {
        let [x, y, z] = equatorial_to_cartesian(0.0, 0.0, 5.0);
        assert!((x - 5.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        assert!(z.abs() < 1e-9);

        let [x, y, z] = equatorial_to_cartesian(180.0, 0.0, 5.0);
        assert!((x + 5.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        assert!(z.abs() < 1e-9);

        let [x, y, z] = equatorial_to_cartesian(123.0, 90.0, 5.0);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        assert!((z - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_star_position_recovers_spherical() {
        let s = star(47.3, -33.1, 4.0);
        let pos = star_position(&s);

        assert!((pos.dist_pc - 250.0).abs() < 1e-9);
        let r = (pos.x * pos.x + pos.y * pos.y + pos.z * pos.z).sqrt();
        assert!((r - pos.dist_pc).abs() < 1e-9);
        assert!(((pos.z / r).asin().to_degrees() - s.dec).abs() < 1e-9);
        assert!((pos.y.atan2(pos.x).to_degrees() - s.ra).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_parallax_stays_finite() {
        let pos = star_position(&star(10.0, 10.0, 1e-9));
        assert!(pos.dist_pc > 1e11);
        assert!(pos.x.is_finite() && pos.y.is_finite() && pos.z.is_finite());
    }

    #[test]
    fn test_catalog_positions_preserve_order() {
        let stars = vec![star(0.0, 0.0, 10.0), star(90.0, 0.0, 5.0)];
        let positions = catalog_positions(&stars);
        assert_eq!(positions.len(), 2);
        assert!((positions[0].x - 100.0).abs() < 1e-9);
        assert!((positions[1].y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_velocity() {
        let mut s = star(0.0, 0.0, K_TANGENTIAL);
        s.pmra = 150.0;
        assert!((total_velocity(&s) - 150.0).abs() < 1e-9);

        s.pmra = 30.0;
        s.pmdec = 40.0;
        s.radial_velocity = 0.0;
        assert!((total_velocity(&s) - 50.0).abs() < 1e-9);

        s.pmra = 0.0;
        s.pmdec = 0.0;
        s.radial_velocity = -12.0;
        assert!((total_velocity(&s) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_absolute_magnitude_at_ten_parsecs() {
        assert!((absolute_magnitude(4.83, 10.0) - 4.83).abs() < 1e-12);
        assert!((absolute_magnitude(10.0, 100.0) - 5.0).abs() < 1e-12);
    }
}
