//! Error types for rank-order-monitor

use thiserror::Error;

use crate::simulation::WorkerStatus;

/// Errors raised while mapping engine-ordered data onto rank order.
///
/// Both variants point at an inconsistent topology or at snapshots taken
/// from different poll cycles. Neither is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    /// The reported ranks are not a permutation of `[0, N)`
    #[error("Invalid rank list: {0}")]
    InvalidInput(String),

    /// Values and rank index disagree on the number of engines
    #[error("Length mismatch: {values} values for a rank index of {index}")]
    LengthMismatch { values: usize, index: usize },
}

/// Errors raised while stitching rank-ordered blocks into one mesh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("No blocks to assemble")]
    Empty,

    /// Block `rank` has a different column count than block 0
    #[error("Block for rank {rank} has {found} columns, expected {expected}")]
    ColumnMismatch {
        rank: usize,
        expected: usize,
        found: usize,
    },

    #[error("Shape error: {0}")]
    Shape(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for the monitoring loop and the binary.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Reorder(#[from] ReorderError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cluster could not answer a pull
    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Engine {engine_id} ended with status {status:?}")]
    EngineFailed {
        engine_id: usize,
        status: WorkerStatus,
    },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
