//! Data loaders for star catalogs and pipeline artifacts.
//!
//! This module provides parsers for:
//! - Astrometric star catalog CSV files (the acquisition step's output)
//! - Labeled star catalogs written by a previous run (`stars.json`)
//! - Analysis summaries written by a previous run (`analysis.json`)

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CatalogConfig;
use crate::processors::assembly::{AnalysisSummary, LabeledStar};

/// Columns every catalog row must provide.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "source_id",
    "ra",
    "dec",
    "parallax",
    "pmra",
    "pmdec",
    "radial_velocity",
    "phot_g_mean_mag",
    "bp_rp",
];

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required columns: {0}")]
    MissingColumns(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One catalog entry with its astrometric and photometric measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub source_id: i64,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    /// Parallax in milliarcseconds, strictly positive
    pub parallax: f64,
    /// Proper motion in RA (mas/yr)
    pub pmra: f64,
    /// Proper motion in Dec (mas/yr)
    pub pmdec: f64,
    /// Line-of-sight velocity in km/s
    pub radial_velocity: f64,
    pub phot_g_mean_mag: f64,
    /// BP-RP color, absent for some sources
    pub bp_rp: Option<f64>,
}

/// Ordered collection of stars as read from disk.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub stars: Vec<Star>,
    /// Rows rejected for violating the input contract or the selection
    pub dropped: usize,
}

impl Catalog {
    /// Wraps an in-memory list of stars.
    pub fn from_stars(stars: Vec<Star>) -> Self {
        Self {
            stars,
            dropped: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

/// Why a row was not accepted into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowRejection {
    Unparseable,
    NonPositiveParallax,
    OutsideSelection,
}

struct ColumnIndex {
    source_id: usize,
    ra: usize,
    dec: usize,
    parallax: usize,
    pmra: usize,
    pmdec: usize,
    radial_velocity: usize,
    phot_g_mean_mag: usize,
    bp_rp: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let col_map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| !col_map.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::MissingColumns(missing.join(", ")));
        }

        Ok(Self {
            source_id: col_map["source_id"],
            ra: col_map["ra"],
            dec: col_map["dec"],
            parallax: col_map["parallax"],
            pmra: col_map["pmra"],
            pmdec: col_map["pmdec"],
            radial_velocity: col_map["radial_velocity"],
            phot_g_mean_mag: col_map["phot_g_mean_mag"],
            bp_rp: col_map["bp_rp"],
        })
    }
}

fn parse_f64(record: &StringRecord, idx: usize) -> Option<f64> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_row(
    record: &StringRecord,
    cols: &ColumnIndex,
    selection: &CatalogConfig,
) -> std::result::Result<Star, RowRejection> {
    let source_id: i64 = record
        .get(cols.source_id)
        .and_then(|s| s.trim().parse().ok())
        .ok_or(RowRejection::Unparseable)?;

    let field = |idx| parse_f64(record, idx).ok_or(RowRejection::Unparseable);

    let star = Star {
        source_id,
        ra: field(cols.ra)?,
        dec: field(cols.dec)?,
        parallax: field(cols.parallax)?,
        pmra: field(cols.pmra)?,
        pmdec: field(cols.pmdec)?,
        radial_velocity: field(cols.radial_velocity)?,
        phot_g_mean_mag: field(cols.phot_g_mean_mag)?,
        bp_rp: parse_f64(record, cols.bp_rp),
    };

    if star.parallax <= 0.0 {
        return Err(RowRejection::NonPositiveParallax);
    }

    if let Some(max_pc) = selection.max_distance_pc {
        if 1000.0 / star.parallax >= max_pc {
            return Err(RowRejection::OutsideSelection);
        }
    }
    if let Some(max_mag) = selection.max_g_mag {
        if star.phot_g_mean_mag >= max_mag {
            return Err(RowRejection::OutsideSelection);
        }
    }

    Ok(star)
}

/// Load an astrometric star catalog from a CSV file.
///
/// The header must name every column in [`REQUIRED_COLUMNS`] (case-insensitive,
/// any order; extra columns are ignored). Rows whose parallax is not strictly
/// positive, or whose required numeric fields are empty or unparseable, are
/// rejected and counted in [`Catalog::dropped`]; they never reach the
/// coordinate transform. A missing `bp_rp` value is kept as `None`.
///
/// # Arguments
///
/// * `path` - Path to the catalog CSV
/// * `selection` - Optional distance/magnitude/count cuts (none if `None`)
///
/// # Errors
///
/// Returns an error if the file cannot be read or lacks required columns.
pub fn load_catalog_csv<P: AsRef<Path>>(
    path: P,
    selection: Option<&CatalogConfig>,
) -> Result<Catalog> {
    let path = path.as_ref();
    let default_selection = CatalogConfig::default();
    let selection = selection.unwrap_or(&default_selection);

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let cols = ColumnIndex::from_headers(&headers)?;

    let mut stars = Vec::with_capacity(50_000);
    let mut invalid = 0usize;
    let mut outside = 0usize;

    for result in reader.records() {
        let record = result?;

        if let Some(limit) = selection.max_stars {
            if stars.len() >= limit {
                break;
            }
        }

        match parse_row(&record, &cols, selection) {
            Ok(star) => stars.push(star),
            Err(RowRejection::OutsideSelection) => outside += 1,
            Err(_) => invalid += 1,
        }
    }

    if invalid > 0 {
        log::warn!(
            "{}: dropped {} rows with non-positive parallax or missing measurements",
            path.display(),
            invalid
        );
    }
    if outside > 0 {
        log::info!(
            "{}: {} rows outside the configured selection",
            path.display(),
            outside
        );
    }
    log::info!("{}: loaded {} stars", path.display(), stars.len());

    Ok(Catalog {
        stars,
        dropped: invalid + outside,
    })
}

fn read_json<T, P>(path: P) -> Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoaderError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a labeled star catalog (`stars.json`) written by a previous run.
pub fn load_labeled_stars<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledStar>> {
    read_json(path)
}

/// Load an analysis summary (`analysis.json`) written by a previous run.
pub fn load_analysis<P: AsRef<Path>>(path: P) -> Result<AnalysisSummary> {
    read_json(path)
}
