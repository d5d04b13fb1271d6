use std::time::Duration;

use thiserror::Error;

use crate::Tag;

pub type Result<T> = std::result::Result<T, CommError>;

/// Transport failures. The multipliers treat every one of them as fatal.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {rank} is outside a group of size {size}")]
    RankOutOfRange { rank: usize, size: usize },

    #[error("buffer length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("message from rank {peer} does not carry the requested element type")]
    TypeMismatch { peer: usize },

    #[error("root {root} must supply a buffer for {op}")]
    MissingRootBuffer { root: usize, op: &'static str },

    #[error("tag {0:#x} is reserved for collectives")]
    ReservedTag(Tag),

    #[error("mailbox of rank {0} is disconnected")]
    Disconnected(usize),

    #[error("no message arrived within {0:?}")]
    Timeout(Duration),

    #[error("process group aborted by rank {origin}")]
    Aborted { origin: usize },

    #[error("rank {0} panicked")]
    RankPanicked(usize),

    #[error("failed to spawn rank {rank}")]
    Spawn {
        rank: usize,
        #[source]
        source: std::io::Error,
    },
}
