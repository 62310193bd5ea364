//! Writers for the analysis artifacts.
//!
//! - labeled star catalog as a JSON array (and optionally CSV)
//! - cluster/runaway summary as a JSON object
//! - per-cluster color-magnitude rows as CSV

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::processors::assembly::{AnalysisSummary, HrPoint, LabeledStar};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| WriteError::Json {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the labeled star catalog as a JSON array, one record per star in
/// catalog order. Noise stars carry `cluster_id: -1`.
///
/// # Example
///
/// ```no_run
/// use comoving_groups::core::writers::write_stars_json;
/// use std::path::Path;
///
/// write_stars_json(Path::new("out/stars.json"), &[]).unwrap();
/// ```
pub fn write_stars_json(path: &Path, stars: &[LabeledStar]) -> Result<()> {
    write_json(path, stars)
}

/// Write the cluster summaries and runaway ids as a JSON object.
pub fn write_analysis_json(path: &Path, summary: &AnalysisSummary) -> Result<()> {
    write_json(path, summary)
}

/// Write the labeled star catalog as CSV with the same columns as the JSON
/// records. A missing `bp_rp` is an empty field.
pub fn write_stars_csv(path: &Path, stars: &[LabeledStar]) -> Result<()> {
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    let path_str = path.display().to_string();

    // serialize() emits the header from the field names
    for star in stars {
        csv_writer
            .serialize(star)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write color-magnitude rows as CSV with header `source_id,bp_rp,abs_mag`.
pub fn write_hr_csv(path: &Path, points: &[HrPoint]) -> Result<()> {
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    let path_str = path.display().to_string();

    csv_writer
        .write_record(["source_id", "bp_rp", "abs_mag"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for point in points {
        csv_writer
            .write_record(&[
                point.source_id.to_string(),
                format!("{:.6}", point.bp_rp),
                format!("{:.6}", point.abs_mag),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Default HR export file name for a cluster.
pub fn hr_file_name(cluster_id: i32) -> String {
    format!("cluster_{}_data.csv", cluster_id)
}
