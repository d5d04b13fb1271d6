//! Cannon's algorithm on a `g × g` process grid.
//!
//! The coordinator deals one A tile and one B tile to every rank. Tiles are
//! then skewed so that the rank at grid cell (row, col) holds A(row, row+col)
//! and B(row+col, col), after which `g` rounds of multiply, rotate A one
//! step left and rotate B one step up accumulate the full C tile on every
//! rank. Rotations run inside per-row and per-column sub-groups.

use comm::Communicator;

use crate::error::{check_dim, rejected, Error, Result};
use crate::init::Operands;
use crate::kernel::multiply_accumulate;
use crate::matrix::Element;
use crate::tile::TileGrid;
use crate::timing::{self, Timing};
use crate::ROOT;

/// Compute `C = A · B` with Cannon's algorithm.
///
/// `world.size()` must be a perfect square `g²` with `g` dividing the matrix
/// dimension. The check runs on every rank before any communication, so a
/// rejected grid leaves C untouched and no rank waits on another.
pub fn cannon_multiply<C: Communicator>(world: &C, operands: &mut Operands) -> Result<Timing> {
    let rank = world.rank();
    let grid = TileGrid::new(operands.n, world.size())
        .map_err(|err| rejected(rank, "Cannon multiply", err))?;
    check_dim(operands.n, operands.b.dim())?;
    if rank == ROOT && operands.c.is_none() {
        return Err(Error::MissingOperand("C"));
    }

    let (mut local_a, mut local_b) = distribute_tiles(world, &grid, operands)?;
    let (row_comm, col_comm) = split_grid(world, &grid)?;
    skew(&row_comm, &col_comm, &mut local_a, &mut local_b)?;
    tracing::debug!(rank, dim = grid.dim(), block = grid.block(), "tiles skewed");

    let mut local_c = vec![0; grid.tile_len()];
    let block = grid.block();
    let ((), local) = timing::timed(world, || {
        for step in 0..grid.dim() {
            multiply_accumulate(&local_a, &local_b, &mut local_c, block, block, block);
            rotate(&row_comm, &mut local_a, 1)?;
            rotate(&col_comm, &mut local_b, 1)?;
            tracing::trace!(rank, step, "shifted");
        }
        Ok(())
    })?;

    let mut tiles = (rank == ROOT).then(|| vec![0; grid.tile_len() * world.size()]);
    world.gather(&local_c, tiles.as_deref_mut(), ROOT)?;
    if let (Some(tiles), Some(c)) = (tiles, operands.c.as_mut()) {
        *c = grid.unpack(&tiles)?;
    }

    row_comm.free()?;
    col_comm.free()?;
    timing::finish(world, local)
}

/// Deal every rank its own A and B tile from the coordinator, returned as
/// `(A tile, B tile)` in row-major order.
pub fn distribute_tiles<C: Communicator>(
    world: &C,
    grid: &TileGrid,
    operands: &Operands,
) -> Result<(Vec<Element>, Vec<Element>)> {
    let (packed_a, packed_b) = if world.rank() == ROOT {
        let a = operands.a.as_ref().ok_or(Error::MissingOperand("A"))?;
        (Some(grid.pack(a)?), Some(grid.pack(&operands.b)?))
    } else {
        (None, None)
    };

    let mut local_a = vec![0; grid.tile_len()];
    let mut local_b = vec![0; grid.tile_len()];
    world.scatter(packed_a.as_deref(), &mut local_a, ROOT)?;
    world.scatter(packed_b.as_deref(), &mut local_b, ROOT)?;
    Ok((local_a, local_b))
}

/// Split `world` into its grid-row group (ranked by column) and its
/// grid-column group (ranked by row).
pub fn split_grid<C: Communicator>(world: &C, grid: &TileGrid) -> Result<(C, C)> {
    let (row, col) = grid.coords(world.rank());
    let row_comm = world.split(row, col)?;
    let col_comm = world.split(col, row)?;
    Ok((row_comm, col_comm))
}

/// Initial alignment: A moves `row` steps left along its grid row and B moves
/// `col` steps up along its grid column.
pub fn skew<C: Communicator>(
    row_comm: &C,
    col_comm: &C,
    local_a: &mut [Element],
    local_b: &mut [Element],
) -> Result<()> {
    let row = col_comm.rank();
    let col = row_comm.rank();
    rotate(row_comm, local_a, row)?;
    rotate(col_comm, local_b, col)?;
    Ok(())
}

/// Cyclically move every member's `buf` `by` positions towards rank 0 of
/// `group`: each rank sends to `rank - by` and receives from `rank + by`.
fn rotate<C: Communicator>(group: &C, buf: &mut [Element], by: usize) -> Result<()> {
    let size = group.size();
    let rank = group.rank();
    let by = by % size;
    let send_to = (rank + size - by) % size;
    let recv_from = (rank + by) % size;
    Ok(group.sendrecv_replace(buf, send_to, recv_from)?)
}
