//! Error types for voxmap.

use thiserror::Error;

/// Top-level error type for map operations.
///
/// Most map faults are recoverable by contract (a missing tile image is just
/// an empty tile), so these errors usually end up logged rather than
/// propagated past the crate boundary.
#[derive(Debug, Error)]
pub enum MapError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster encode/decode failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// Decoded raster does not match the buffer it is loaded into
    #[error("Raster size mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        /// Buffer width
        expected_width: u32,
        /// Buffer height
        expected_height: u32,
        /// Decoded width
        actual_width: u32,
        /// Decoded height
        actual_height: u32,
    },

    /// Configuration could not be parsed or written
    #[error("Config error: {0}")]
    Config(String),

    /// Job submitted to a worker queue that has been stopped
    #[error("Worker queue '{0}' is stopped")]
    WorkerStopped(String),
}

/// Result type alias for map operations.
pub type MapResult<T> = Result<T, MapError>;
