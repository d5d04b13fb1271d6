//! Operand allocation and seeded population.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{check_dim, ConfigError, Result};
use crate::matrix::{Element, Matrix};
use crate::ROOT;

/// Smallest generated element.
pub const ELEMENT_MIN: Element = 1;
/// Largest generated element.
pub const ELEMENT_MAX: Element = 9;

/// The buffers one rank brings to a multiply.
///
/// Only the coordinator holds A and C. Every rank holds a B buffer: the
/// coordinator's is the operand, the others are receive buffers that the
/// multipliers overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands {
    pub n: usize,
    pub a: Option<Matrix>,
    pub b: Matrix,
    pub c: Option<Matrix>,
}

impl Operands {
    /// Coordinator operands from explicit matrices, with C zeroed.
    pub fn coordinator(a: Matrix, b: Matrix) -> Result<Self> {
        let n = a.dim();
        check_dim(n, b.dim())?;
        Ok(Self {
            n,
            a: Some(a),
            b,
            c: Some(Matrix::zeros(n)),
        })
    }

    /// Non-coordinator operands: a zeroed B receive buffer only.
    pub fn worker(n: usize) -> Self {
        Self {
            n,
            a: None,
            b: Matrix::zeros(n),
            c: None,
        }
    }

    /// Operands for `rank`: [`Operands::coordinator`] on [`ROOT`], otherwise
    /// [`Operands::worker`].
    pub fn for_rank(rank: usize, a: Matrix, b: Matrix) -> Result<Self> {
        if rank == ROOT {
            Self::coordinator(a, b)
        } else {
            Ok(Self::worker(a.dim()))
        }
    }

    /// Whether these operands carry the full matrices.
    pub fn is_coordinator(&self) -> bool {
        self.a.is_some()
    }
}

/// Allocate operands for `rank`, filling A and B on the coordinator with
/// values in `[ELEMENT_MIN, ELEMENT_MAX]` drawn from a ChaCha8 stream seeded
/// with `seed`. Cells are visited row-major, drawing the A value then the B
/// value, so the same seed always yields the same pair of matrices.
pub fn initialize_matrices(n: usize, rank: usize, seed: u64) -> Result<Operands> {
    if n == 0 {
        return Err(ConfigError::ZeroDimension.into());
    }
    if rank != ROOT {
        return Ok(Operands::worker(n));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut a = Matrix::zeros(n);
    let mut b = Matrix::zeros(n);
    for (a_ij, b_ij) in a.as_mut_slice().iter_mut().zip(b.as_mut_slice()) {
        *a_ij = rng.gen_range(ELEMENT_MIN..=ELEMENT_MAX);
        *b_ij = rng.gen_range(ELEMENT_MIN..=ELEMENT_MAX);
    }
    tracing::debug!(n, seed, "operands initialized");
    Operands::coordinator(a, b)
}
