//! Row-band partitioned multiply.
//!
//! A is cut into `P` horizontal bands of `N / P` rows, one per rank, while B
//! is replicated everywhere. Each rank computes its band of C independently
//! and the coordinator gathers the bands back in rank order, which is row
//! order, so no reshuffling is needed afterwards.

use comm::Communicator;

use crate::error::{check_dim, rejected, ConfigError, Error, Result};
use crate::init::Operands;
use crate::kernel::multiply_accumulate;
use crate::timing::{self, Timing};
use crate::ROOT;

/// Shape of the row decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBands {
    n: usize,
    rows_per_proc: usize,
}

impl RowBands {
    pub fn new(n: usize, procs: usize) -> std::result::Result<Self, ConfigError> {
        if n == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if procs == 0 {
            return Err(ConfigError::ZeroProcesses);
        }
        if n % procs != 0 {
            return Err(ConfigError::IndivisibleRows { n, procs });
        }
        Ok(Self {
            n,
            rows_per_proc: n / procs,
        })
    }

    pub fn rows_per_proc(&self) -> usize {
        self.rows_per_proc
    }

    /// Elements in one band.
    pub fn band_len(&self) -> usize {
        self.rows_per_proc * self.n
    }
}

/// Compute `C = A · B` with A split into row bands.
///
/// Every rank must call this with operands of the same dimension. The
/// divisibility check runs on every rank before any message is exchanged,
/// so a rejected shape returns an error everywhere without touching C.
pub fn row_partition_multiply<C: Communicator>(
    world: &C,
    operands: &mut Operands,
) -> Result<Timing> {
    let rank = world.rank();
    let n = operands.n;
    let bands = RowBands::new(n, world.size())
        .map_err(|err| rejected(rank, "row-partition multiply", err))?;
    check_dim(n, operands.b.dim())?;

    let mut local_a = vec![0; bands.band_len()];
    let mut local_c = vec![0; bands.band_len()];

    let a = if rank == ROOT {
        let a = operands.a.as_ref().ok_or(Error::MissingOperand("A"))?;
        check_dim(n, a.dim())?;
        if operands.c.is_none() {
            return Err(Error::MissingOperand("C"));
        }
        Some(a.as_slice())
    } else {
        None
    };

    world.scatter(a, &mut local_a, ROOT)?;
    world.broadcast(operands.b.as_mut_slice(), ROOT)?;
    tracing::debug!(rank, rows = bands.rows_per_proc(), "row band distributed");

    let ((), local) = timing::timed(world, || {
        multiply_accumulate(
            &local_a,
            operands.b.as_slice(),
            &mut local_c,
            bands.rows_per_proc(),
            n,
            n,
        );
        Ok(())
    })?;

    let c = operands.c.as_mut().map(|c| c.as_mut_slice());
    world.gather(&local_c, c, ROOT)?;
    tracing::debug!(rank, local, "row band gathered");

    timing::finish(world, local)
}
