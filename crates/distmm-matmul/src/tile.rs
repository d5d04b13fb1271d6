//! Block decomposition for Cannon's algorithm.
//!
//! A grid of `dim × dim` tiles covers the matrix; the tile at grid cell
//! (row, col) belongs to rank `row * dim + col`. The *tile-major* layout
//! concatenates the tiles in that rank order, each tile row-major, which is
//! exactly what gathering one tile per rank produces.

use crate::error::{check_dim, ConfigError, Result};
use crate::matrix::{Element, Matrix};

/// Square process grid over an N×N matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    n: usize,
    dim: usize,
    block: usize,
}

impl TileGrid {
    /// Grid for `procs` ranks, which must be a perfect square whose root
    /// divides `n`.
    pub fn new(n: usize, procs: usize) -> std::result::Result<Self, ConfigError> {
        if n == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if procs == 0 {
            return Err(ConfigError::ZeroProcesses);
        }
        let dim = integer_sqrt(procs);
        if dim * dim != procs {
            return Err(ConfigError::NonSquareProcessCount { procs });
        }
        if n % dim != 0 {
            return Err(ConfigError::IndivisibleBlocks { n, grid: dim });
        }
        Ok(Self {
            n,
            dim,
            block: n / dim,
        })
    }

    /// Tiles per grid row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Tile edge length.
    pub fn block(&self) -> usize {
        self.block
    }

    pub fn tile_len(&self) -> usize {
        self.block * self.block
    }

    /// Grid coordinates (row, col) of `rank`.
    pub fn coords(&self, rank: usize) -> (usize, usize) {
        (rank / self.dim, rank % self.dim)
    }

    pub fn rank_of(&self, row: usize, col: usize) -> usize {
        row * self.dim + col
    }

    /// Copy out the tile at grid cell (`row`, `col`).
    pub fn extract(&self, matrix: &Matrix, row: usize, col: usize) -> Vec<Element> {
        let mut tile = Vec::with_capacity(self.tile_len());
        for i in 0..self.block {
            let start = col * self.block;
            tile.extend_from_slice(&matrix.row(row * self.block + i)[start..start + self.block]);
        }
        tile
    }

    /// Lay `matrix` out tile-major, ready to scatter one tile per rank.
    pub fn pack(&self, matrix: &Matrix) -> Result<Vec<Element>> {
        check_dim(self.n, matrix.dim())?;
        let mut packed = Vec::with_capacity(matrix.len());
        for rank in 0..self.dim * self.dim {
            let (row, col) = self.coords(rank);
            packed.extend(self.extract(matrix, row, col));
        }
        Ok(packed)
    }

    /// Deinterleave a tile-major buffer back into a row-major matrix.
    pub fn unpack(&self, tiles: &[Element]) -> Result<Matrix> {
        check_dim(self.n * self.n, tiles.len())?;
        let mut matrix = Matrix::zeros(self.n);
        for row in 0..self.dim {
            for col in 0..self.dim {
                let start = self.rank_of(row, col) * self.tile_len();
                let tile = &tiles[start..start + self.tile_len()];
                for (i, tile_row) in tile.chunks_exact(self.block).enumerate() {
                    for (j, &value) in tile_row.iter().enumerate() {
                        matrix[(row * self.block + i, col * self.block + j)] = value;
                    }
                }
            }
        }
        Ok(matrix)
    }
}

fn integer_sqrt(value: usize) -> usize {
    let mut root = (value as f64).sqrt() as usize;
    while root * root > value {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= value {
        root += 1;
    }
    root
}
