//! Plot rendering for analysis results.
//!
//! - sky map: heliocentric x vs y, colored by cluster, tails and runaways marked
//! - HR diagram: BP-RP color vs absolute G magnitude for one cluster

use std::collections::HashSet;
use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::processors::assembly::{AnalysisSummary, HrPoint, LabeledStar};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Plotting error: {0}")]
    PlottingError(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1600;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1200;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
    (255, 215, 0),   // Gold
];

/// Noise color (light gray) for unclustered stars.
const NOISE_COLOR: (u8, u8, u8) = (200, 200, 200);

/// Tail member marker color.
const TAIL_COLOR: (u8, u8, u8) = (0, 0, 0);

/// Runaway marker color.
const RUNAWAY_COLOR: (u8, u8, u8) = (220, 0, 0);

fn cluster_color(label: i32) -> RGBColor {
    let (r, g, b) = if label < 0 {
        NOISE_COLOR
    } else {
        CLUSTER_COLORS[label as usize % CLUSTER_COLORS.len()]
    };
    RGBColor(r, g, b)
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Plot the labeled catalog projected on the x-y plane and save as PNG.
///
/// Noise is drawn first so cluster members stay visible. When a summary is
/// given, tail members get a cross and runaways a triangle. An empty catalog
/// still produces a PNG with bare axes.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `stars` - Labeled stars from an analysis run
/// * `summary` - Optional cluster/runaway summary for the markers
pub fn plot_sky_map(
    output_path: &Path,
    stars: &[LabeledStar],
    summary: Option<&AnalysisSummary>,
) -> Result<()> {
    let points: Vec<(f64, f64)> = stars.iter().map(|s| (s.x, s.y)).collect();
    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let (tails, runaways): (HashSet<i64>, HashSet<i64>) = match summary {
        Some(s) => (s.tail_ids(), s.runaways.iter().copied().collect()),
        None => (HashSet::new(), HashSet::new()),
    };

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(
            stars
                .iter()
                .filter(|s| s.cluster_id < 0)
                .map(|s| Circle::new((s.x, s.y), 1, cluster_color(-1).filled())),
        )
        .map_err(plot_err)?;

    chart
        .draw_series(
            stars
                .iter()
                .filter(|s| s.cluster_id >= 0)
                .map(|s| Circle::new((s.x, s.y), 3, cluster_color(s.cluster_id).filled())),
        )
        .map_err(plot_err)?;

    let tail_color = RGBColor(TAIL_COLOR.0, TAIL_COLOR.1, TAIL_COLOR.2);
    chart
        .draw_series(
            stars
                .iter()
                .filter(|s| tails.contains(&s.source_id))
                .map(|s| Cross::new((s.x, s.y), 5, tail_color.stroke_width(2))),
        )
        .map_err(plot_err)?;

    let runaway_color = RGBColor(RUNAWAY_COLOR.0, RUNAWAY_COLOR.1, RUNAWAY_COLOR.2);
    chart
        .draw_series(
            stars
                .iter()
                .filter(|s| runaways.contains(&s.source_id))
                .map(|s| TriangleMarker::new((s.x, s.y), 6, runaway_color.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    Ok(())
}

/// Plot a color-magnitude diagram and save as PNG.
///
/// The magnitude axis is inverted, bright stars at the top.
pub fn plot_hr_diagram(output_path: &Path, points: &[HrPoint], cluster_id: i32) -> Result<()> {
    // magnitudes are negated so bright stars sit at the top
    let xy: Vec<(f64, f64)> = points.iter().map(|p| (p.bp_rp, -p.abs_mag)).collect();
    let (c_min, c_max, m_min, m_max) = compute_bounds(&xy);
    let c_padding = (c_max - c_min) * 0.05;
    let m_padding = (m_max - m_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_HEIGHT, DEFAULT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (c_min - c_padding)..(c_max + c_padding),
            (m_min - m_padding)..(m_max + m_padding),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .y_label_formatter(&|v| format!("{:.1}", -v))
        .draw()
        .map_err(plot_err)?;

    let color = cluster_color(cluster_id);
    chart
        .draw_series(xy.iter().map(|&(c, m)| Circle::new((c, m), 3, color.filled())))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
///
/// No points gives the unit box `[-1, 1]` on both axes.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    if points.is_empty() {
        return (-1.0, 1.0, -1.0, 1.0);
    }

    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn labeled(source_id: i64, x: f64, y: f64, cluster_id: i32) -> LabeledStar {
        LabeledStar {
            source_id,
            x,
            y,
            z: 0.0,
            bp_rp: Some(1.0),
            phot_g_mean_mag: 10.0,
            pmra: 0.0,
            pmdec: 0.0,
            radial_velocity: 0.0,
            cluster_id,
            v_tot: 0.0,
        }
    }

    #[test]
    fn test_compute_bounds_pads_degenerate_axis() {
        let (x_min, x_max, y_min, y_max) = compute_bounds(&[(1.0, 5.0), (3.0, 5.0)]);
        assert_eq!((x_min, x_max), (1.0, 3.0));
        assert_eq!((y_min, y_max), (4.0, 6.0));
    }

    #[test]
    fn test_plot_sky_map_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sky.png");
        let stars = vec![
            labeled(1, 0.0, 0.0, 0),
            labeled(2, 1.0, 1.0, 0),
            labeled(3, 50.0, -20.0, -1),
            labeled(4, -30.0, 10.0, 1),
        ];
        let summary = AnalysisSummary {
            clusters: Vec::new(),
            runaways: vec![4],
        };

        plot_sky_map(&path, &stars, Some(&summary)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_plot_hr_diagram_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hr.png");
        let points = vec![
            HrPoint {
                source_id: 1,
                bp_rp: 0.5,
                abs_mag: 2.0,
            },
            HrPoint {
                source_id: 2,
                bp_rp: 1.5,
                abs_mag: 7.5,
            },
        ];

        plot_hr_diagram(&path, &points, 0).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_compute_bounds_empty() {
        assert_eq!(compute_bounds(&[]), (-1.0, 1.0, -1.0, 1.0));
    }

    #[test]
    fn test_empty_input_renders_bare_axes() {
        let dir = tempdir().unwrap();
        let sky = dir.path().join("sky.png");
        let summary = AnalysisSummary {
            clusters: Vec::new(),
            runaways: Vec::new(),
        };
        plot_sky_map(&sky, &[], Some(&summary)).unwrap();
        assert!(sky.exists());

        let hr = dir.path().join("hr.png");
        plot_hr_diagram(&hr, &[], 0).unwrap();
        assert!(hr.exists());
    }
}
