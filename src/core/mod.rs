//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_catalog_csv, Catalog, LoaderError, Star};
pub use transforms::Position;
pub use writers::{write_analysis_json, write_hr_csv, write_stars_csv, write_stars_json, WriteError};
