use std::collections::HashSet;
use std::fs;
use std::io::Write;

use comoving_groups::core::loaders::{load_analysis, load_labeled_stars, Catalog, Star};
use comoving_groups::core::transforms::K_TANGENTIAL;
use comoving_groups::processors::pipeline::{analyze_catalog_file, export_cluster_hr, run_analysis};
use comoving_groups::visualization::plot_sky_map;
use comoving_groups::PipelineConfig;
use tempfile::tempdir;

const GROUP_SIZE: usize = 60;
const TAIL_ID: i64 = 9999;

const CENTER_A: [f64; 3] = [80.0, 60.0, 40.0];
const VEL_A: [f64; 3] = [12.0, -6.0, 15.0];
const CENTER_B: [f64; 3] = [90.0, 70.0, 50.0];
const VEL_B: [f64; 3] = [14.0, -4.0, 17.0];

/// Deterministic jitter in [-0.5, 0.5).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) - 0.5
    }
}

/// Star at heliocentric position `p` (pc) with the given proper motions and
/// radial velocity.
fn star_at(source_id: i64, p: [f64; 3], vel: [f64; 3]) -> Star {
    let dist = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
    Star {
        source_id,
        ra: p[1].atan2(p[0]).to_degrees(),
        dec: (p[2] / dist).asin().to_degrees(),
        parallax: 1000.0 / dist,
        pmra: vel[0],
        pmdec: vel[1],
        radial_velocity: vel[2],
        phot_g_mean_mag: 9.0 + (source_id % 7) as f64 * 0.5,
        bp_rp: Some(0.4 + (source_id % 5) as f64 * 0.2),
    }
}

fn group(first_id: i64, center: [f64; 3], vel: [f64; 3], rng: &mut Lcg) -> Vec<Star> {
    (0..GROUP_SIZE)
        .map(|i| {
            let p = [
                center[0] + rng.next(),
                center[1] + rng.next(),
                center[2] + rng.next(),
            ];
            let v = [
                vel[0] + 0.2 * rng.next(),
                vel[1] + 0.2 * rng.next(),
                vel[2] + 0.2 * rng.next(),
            ];
            star_at(first_id + i as i64, p, v)
        })
        .collect()
}

/// Two comoving groups plus one star 50 pc from group A moving exactly with it.
fn tail_scenario() -> Vec<Star> {
    let mut rng = Lcg(42);
    let mut stars = group(1000, CENTER_A, VEL_A, &mut rng);
    stars.extend(group(2000, CENTER_B, VEL_B, &mut rng));
    stars.push(star_at(
        TAIL_ID,
        [CENTER_A[0] + 50.0, CENTER_A[1], CENTER_A[2]],
        VEL_A,
    ));
    stars
}

fn write_catalog_csv(path: &std::path::Path, stars: &[Star]) {
    let mut file = fs::File::create(path).unwrap();
    writeln!(
        file,
        "source_id,ra,dec,parallax,pmra,pmdec,radial_velocity,phot_g_mean_mag,bp_rp"
    )
    .unwrap();
    for s in stars {
        let bp_rp = s.bp_rp.map(|v| v.to_string()).unwrap_or_default();
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{}",
            s.source_id,
            s.ra,
            s.dec,
            s.parallax,
            s.pmra,
            s.pmdec,
            s.radial_velocity,
            s.phot_g_mean_mag,
            bp_rp
        )
        .unwrap();
    }
}

#[test]
fn test_tail_star_detected_for_its_group() {
    let catalog = Catalog::from_stars(tail_scenario());
    let result = run_analysis(&catalog, &PipelineConfig::default()).unwrap();
    let clusters = &result.summary.clusters;

    assert_eq!(clusters.len(), 2);

    let a = clusters
        .iter()
        .find(|c| c.members.contains(&1000))
        .expect("group A should be a cluster");
    let b = clusters
        .iter()
        .find(|c| c.members.contains(&2000))
        .expect("group B should be a cluster");
    assert_ne!(a.id, b.id);
    assert_eq!(a.count, GROUP_SIZE);
    assert_eq!(b.count, GROUP_SIZE);

    let tail = result.stars.iter().find(|s| s.source_id == TAIL_ID).unwrap();
    assert_eq!(tail.cluster_id, -1);

    assert_eq!(a.tail_members, vec![TAIL_ID]);
    assert!(b.tail_members.is_empty());

    for d in 0..3 {
        assert!((a.pos[d] - CENTER_A[d]).abs() < 0.5);
        assert!((a.vel[d] - VEL_A[d]).abs() < 0.1);
        assert!(a.std_vel[d] < 0.1);
    }
}

#[test]
fn test_output_invariants() {
    let config = PipelineConfig::default();
    let catalog = Catalog::from_stars(tail_scenario());
    let result = run_analysis(&catalog, &config).unwrap();

    assert_eq!(result.stars.len(), catalog.len());
    for (labeled, star) in result.stars.iter().zip(&catalog.stars) {
        assert_eq!(labeled.source_id, star.source_id);
    }

    let noise: HashSet<i64> = result
        .stars
        .iter()
        .filter(|s| s.cluster_id == -1)
        .map(|s| s.source_id)
        .collect();

    for cluster in &result.summary.clusters {
        assert!(cluster.count >= config.clustering.min_cluster_size);
        assert_eq!(cluster.count, cluster.members.len());

        let members: HashSet<i64> = cluster.members.iter().copied().collect();
        for id in &cluster.tail_members {
            assert!(!members.contains(id));
            assert!(noise.contains(id));
        }
        for star in result.stars.iter().filter(|s| members.contains(&s.source_id)) {
            assert_eq!(star.cluster_id, cluster.id);
        }
    }

    let fast: Vec<i64> = result
        .stars
        .iter()
        .filter(|s| s.v_tot > config.runaways.min_total_velocity_kms)
        .map(|s| s.source_id)
        .collect();
    assert_eq!(result.summary.runaways, fast);
}

#[test]
fn test_runaway_at_150_kms() {
    let stars = vec![
        Star {
            source_id: 1,
            ra: 15.0,
            dec: -10.0,
            parallax: K_TANGENTIAL,
            pmra: 150.0,
            pmdec: 0.0,
            radial_velocity: 0.0,
            phot_g_mean_mag: 10.0,
            bp_rp: Some(1.0),
        },
        star_at(2, [100.0, 0.0, 0.0], [5.0, 5.0, 20.0]),
        star_at(3, [0.0, 120.0, 10.0], [-3.0, 1.0, -99.0]),
    ];
    let catalog = Catalog::from_stars(stars);
    let result = run_analysis(&catalog, &PipelineConfig::default()).unwrap();

    assert!((result.stars[0].v_tot - 150.0).abs() < 1e-6);
    assert_eq!(result.summary.runaways, vec![1]);
    assert!(result.summary.clusters.is_empty());
    assert!(result.stars.iter().all(|s| s.cluster_id == -1));
}

#[test]
fn test_analysis_is_idempotent() {
    let catalog = Catalog::from_stars(tail_scenario());
    let config = PipelineConfig::default();

    let first = run_analysis(&catalog, &config).unwrap();
    let second = run_analysis(&catalog, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_catalog() {
    let result = run_analysis(&Catalog::default(), &PipelineConfig::default()).unwrap();
    assert!(result.stars.is_empty());
    assert!(result.summary.clusters.is_empty());
    assert!(result.summary.runaways.is_empty());
}

#[test]
fn test_invalid_parameters_fail() {
    let mut config = PipelineConfig::default();
    config.clustering.min_cluster_size = 1;
    let catalog = Catalog::from_stars(tail_scenario());
    assert!(run_analysis(&catalog, &config).is_err());
}

#[test]
fn test_analyze_file_writes_artifacts() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("catalog.csv");
    let output_dir = dir.path().join("out");
    write_catalog_csv(&input, &tail_scenario());

    let (result, outputs) =
        analyze_catalog_file(&input, &output_dir, &PipelineConfig::default(), true).unwrap();

    assert_eq!(outputs.dropped_rows, 0);

    let stars = load_labeled_stars(&outputs.stars_json).unwrap();
    assert_eq!(stars.len(), 2 * GROUP_SIZE + 1);
    for (loaded, expected) in stars.iter().zip(&result.stars) {
        assert_eq!(loaded.source_id, expected.source_id);
        assert_eq!(loaded.cluster_id, expected.cluster_id);
        assert_eq!(loaded.bp_rp.is_some(), expected.bp_rp.is_some());
    }

    let summary = load_analysis(&outputs.analysis_json).unwrap();
    assert_eq!(summary.clusters.len(), result.summary.clusters.len());
    for (loaded, expected) in summary.clusters.iter().zip(&result.summary.clusters) {
        assert_eq!(loaded.id, expected.id);
        assert_eq!(loaded.members, expected.members);
        assert_eq!(loaded.tail_members, expected.tail_members);
    }
    assert_eq!(summary.runaways, result.summary.runaways);
    assert_eq!(summary.tail_ids(), HashSet::from([TAIL_ID]));

    let csv_path = outputs.stars_csv.unwrap();
    let csv = fs::read_to_string(csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2 * GROUP_SIZE + 2);

    let cluster_id = summary.clusters[0].id;
    let hr_path = dir.path().join(format!("cluster_{}_data.csv", cluster_id));
    let rows = export_cluster_hr(
        &input,
        &outputs.analysis_json,
        cluster_id,
        &hr_path,
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(rows, GROUP_SIZE);

    let hr = fs::read_to_string(hr_path).unwrap();
    assert!(hr.starts_with("source_id,bp_rp,abs_mag"));
    assert_eq!(hr.lines().count(), GROUP_SIZE + 1);
}

#[test]
fn test_export_unknown_cluster_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("catalog.csv");
    write_catalog_csv(&input, &tail_scenario());
    let (_, outputs) =
        analyze_catalog_file(&input, dir.path(), &PipelineConfig::default(), false).unwrap();

    let err = export_cluster_hr(
        &input,
        &outputs.analysis_json,
        42,
        &dir.path().join("hr.csv"),
        &PipelineConfig::default(),
    );
    assert!(err.is_err());
}

#[test]
fn test_dropped_rows_are_reported() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("catalog.csv");
    write_catalog_csv(&input, &tail_scenario());
    let mut file = fs::OpenOptions::new().append(true).open(&input).unwrap();
    writeln!(file, "1,10.0,10.0,0.0,1.0,1.0,1.0,9.0,0.5").unwrap();
    writeln!(file, "2,10.0,10.0,3.0,1.0,1.0,,9.0,0.5").unwrap();
    drop(file);

    let (result, outputs) =
        analyze_catalog_file(&input, dir.path(), &PipelineConfig::default(), false).unwrap();
    assert_eq!(outputs.dropped_rows, 2);
    assert_eq!(result.stars.len(), 2 * GROUP_SIZE + 1);
}

#[test]
fn test_empty_catalog_artifacts_can_be_plotted() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("catalog.csv");
    write_catalog_csv(&input, &[]);

    let (_, outputs) =
        analyze_catalog_file(&input, dir.path(), &PipelineConfig::default(), false).unwrap();
    let stars = load_labeled_stars(&outputs.stars_json).unwrap();
    let summary = load_analysis(&outputs.analysis_json).unwrap();
    assert!(stars.is_empty());

    let sky = dir.path().join("sky.png");
    plot_sky_map(&sky, &stars, Some(&summary)).unwrap();
    assert!(sky.exists());
}
