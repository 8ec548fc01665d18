//! Centralized error handling for precip-accum
//!
//! Every fallible operation in the crate returns [`Result`]. The first six
//! variants form the domain taxonomy used by the accumulation and differencing
//! pipelines; the remaining ones wrap failures from the gridded-field store
//! and the runtime.

use thiserror::Error;

/// Main error type for precip-accum operations
#[derive(Error, Debug)]
pub enum PrecipError {
    /// Bad argument combination or impossible time range, reported before any I/O
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input files could not be joined into one time series
    #[error("Concatenation failed: {0}")]
    ConcatenationError(String),

    /// No time slice falls inside the requested window
    #[error("No data selected: {0}")]
    EmptySelection(String),

    /// A forecast slice does not span the expected number of hours
    #[error("Bounds validation failed: {0}")]
    BoundsValidationError(String),

    /// Two fields cannot be combined element-wise
    #[error("Grid mismatch: {0}")]
    GridMismatchError(String),

    /// The requested cutout leaves no grid points
    #[error("Cutout out of bounds: {0}")]
    CropOutOfBounds(String),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Variable not found in NetCDF file
    #[error("Variable '{var}' not found in {file}")]
    VariableNotFound { var: String, file: String },

    /// Required attribute or coordinate missing or unreadable
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Result type alias for precip-accum operations
pub type Result<T> = std::result::Result<T, PrecipError>;
