//! Comparison of a distributed product against the serial reference.

use serde::{Deserialize, Serialize};

use crate::error::{check_dim, Result};
use crate::matrix::{Element, Matrix};
use crate::ROOT;

/// Mismatching cells listed individually; the rest are only counted.
pub const MAX_REPORTED_MISMATCHES: usize = 5;

/// Largest relative L2 error a passing result may have.
pub const TOLERANCE: f64 = 1e-6;

/// Guards the relative error against an all-zero reference.
pub const EPSILON: f64 = 1e-12;

/// One cell where the result disagrees with the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub got: Element,
    pub expected: Element,
    pub diff: u64,
}

/// Outcome of comparing a result with its reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// `sqrt(Σ diff² / (Σ ref² + EPSILON))`.
    pub rel_error: f64,
    pub mismatch_count: usize,
    /// The first [`MAX_REPORTED_MISMATCHES`] mismatches in row-major order.
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn compare(c: &Matrix, c_verify: &Matrix) -> Result<Self> {
        check_dim(c_verify.dim(), c.dim())?;
        let n = c.dim();
        let mut diff_sum: u128 = 0;
        let mut ref_sum: u128 = 0;
        let mut mismatch_count = 0;
        let mut mismatches = Vec::new();

        for (index, (&got, &expected)) in c.as_slice().iter().zip(c_verify.as_slice()).enumerate() {
            let diff = (i64::from(got) - i64::from(expected)).unsigned_abs();
            let reference = i64::from(expected).unsigned_abs();
            diff_sum += u128::from(diff) * u128::from(diff);
            ref_sum += u128::from(reference) * u128::from(reference);
            if diff != 0 {
                mismatch_count += 1;
                if mismatches.len() < MAX_REPORTED_MISMATCHES {
                    mismatches.push(Mismatch {
                        row: index / n,
                        col: index % n,
                        got,
                        expected,
                        diff,
                    });
                }
            }
        }

        let rel_error = (diff_sum as f64 / (ref_sum as f64 + EPSILON)).sqrt();
        Ok(Self {
            rel_error,
            mismatch_count,
            mismatches,
        })
    }

    /// Exact agreement: no mismatching cell and a relative error under
    /// [`TOLERANCE`].
    pub fn passed(&self) -> bool {
        self.mismatch_count == 0 && self.rel_error < TOLERANCE
    }

    pub fn log(&self) {
        for m in &self.mismatches {
            tracing::warn!(
                row = m.row,
                col = m.col,
                got = m.got,
                expected = m.expected,
                diff = m.diff,
                "mismatch"
            );
        }
        if self.mismatch_count > self.mismatches.len() {
            tracing::warn!(
                omitted = self.mismatch_count - self.mismatches.len(),
                "further mismatches not listed"
            );
        }
        if self.passed() {
            tracing::info!(rel_error = self.rel_error, "verification passed");
        } else {
            tracing::warn!(
                rel_error = self.rel_error,
                mismatches = self.mismatch_count,
                "verification failed"
            );
        }
    }
}

/// Compare `c` with `c_verify` on the coordinator, logging the outcome.
///
/// Non-coordinator ranks hold no result and always report success. A
/// dimension mismatch counts as a failure.
pub fn verify(rank: usize, c: &Matrix, c_verify: &Matrix) -> bool {
    if rank != ROOT {
        return true;
    }
    match Verification::compare(c, c_verify) {
        Ok(verification) => {
            verification.log();
            verification.passed()
        }
        Err(err) => {
            tracing::error!(%err, "cannot verify result");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_fn(4, |i, j| (i * 4 + j + 1) as Element)
    }

    #[test]
    fn test_identical_matrices_pass() {
        let v = Verification::compare(&sample(), &sample()).unwrap();
        assert_eq!(v.rel_error, 0.0);
        assert_eq!(v.mismatch_count, 0);
        assert!(v.passed());
    }

    #[test]
    fn test_single_corruption() {
        let mut c = sample();
        c[(2, 1)] += 3;
        let v = Verification::compare(&c, &sample()).unwrap();
        assert_eq!(v.mismatch_count, 1);
        assert_eq!(
            v.mismatches,
            vec![Mismatch {
                row: 2,
                col: 1,
                got: 13,
                expected: 10,
                diff: 3
            }]
        );
        assert!(v.rel_error > 0.0);
        assert!(!v.passed());
    }

    #[test]
    fn test_listing_is_bounded() {
        let c = Matrix::zeros(4);
        let v = Verification::compare(&c, &sample()).unwrap();
        assert_eq!(v.mismatch_count, 16);
        assert_eq!(v.mismatches.len(), MAX_REPORTED_MISMATCHES);
        assert!((v.rel_error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let c = Matrix::filled(2, Element::MIN);
        let reference = Matrix::filled(2, Element::MAX);
        let v = Verification::compare(&c, &reference).unwrap();
        assert_eq!(v.mismatch_count, 4);
        assert!(v.rel_error.is_finite());
    }

    #[test]
    fn test_non_root_always_passes() {
        assert!(verify(1, &Matrix::zeros(2), &Matrix::identity(2)));
        assert!(!verify(ROOT, &Matrix::zeros(2), &Matrix::identity(2)));
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        assert!(!verify(ROOT, &Matrix::zeros(2), &Matrix::zeros(3)));
    }
}
