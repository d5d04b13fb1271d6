use comm::CommError;
use thiserror::Error;

use crate::ROOT;

pub type Result<T> = std::result::Result<T, Error>;

/// A multiply that cannot run with the requested shape. Every rank detects
/// these before communicating, so a rejected multiply is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("matrix dimension must be positive")]
    ZeroDimension,

    #[error("process count must be positive")]
    ZeroProcesses,

    #[error("{procs} processes do not evenly divide {n} rows")]
    IndivisibleRows { n: usize, procs: usize },

    #[error("Cannon requires a perfect square process count, got {procs}")]
    NonSquareProcessCount { procs: usize },

    #[error("grid dimension {grid} does not divide matrix dimension {n}")]
    IndivisibleBlocks { n: usize, grid: usize },

    #[error("configured for {expected} processes but the group has {actual}")]
    GroupSizeMismatch { expected: usize, actual: usize },

    #[error("unknown algorithm `{0}` (expected `row-partition` or `cannon`)")]
    UnknownAlgorithm(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transport failure: {0}")]
    Comm(#[from] CommError),

    #[error("coordinator is missing operand {0}")]
    MissingOperand(&'static str),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Report a configuration error once, on the coordinator.
pub(crate) fn rejected(rank: usize, what: &'static str, err: ConfigError) -> Error {
    if rank == ROOT {
        tracing::error!(%err, "{what} rejected");
    }
    err.into()
}

pub(crate) fn check_dim(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, actual })
    }
}
