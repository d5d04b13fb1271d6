//! Distributed dense integer matrix multiplication.
//!
//! Two N×N matrices start on the coordinator (rank [`ROOT`]); the product is
//! computed across every rank of a [`comm::Communicator`] group and lands
//! back on the coordinator. Two partitionings are provided:
//!
//! - [`row_partition_multiply`]: A is split into row bands, B is replicated;
//! - [`cannon_multiply`]: A and B are tiled over a √P × √P grid, skewed, then
//!   rotated through √P shift-and-multiply steps.
//!
//! [`serial_verify_reference`] and [`verify`] check a distributed result
//! against a single-process product.

pub mod cannon;
pub mod config;
mod error;
pub mod init;
pub mod kernel;
pub mod matrix;
pub mod reference;
pub mod report;
pub mod row_partition;
pub mod run;
pub mod tile;
pub mod timing;
pub mod verify;

pub use cannon::cannon_multiply;
pub use config::{Algorithm, RunConfig};
pub use error::{ConfigError, Error, Result};
pub use init::{initialize_matrices, Operands};
pub use matrix::Matrix;
pub use reference::serial_verify_reference;
pub use report::RunReport;
pub use row_partition::row_partition_multiply;
pub use run::run;
pub use timing::Timing;
pub use verify::{verify, Verification};

/// Rank that owns the whole matrices before and after a multiply.
pub const ROOT: usize = 0;
