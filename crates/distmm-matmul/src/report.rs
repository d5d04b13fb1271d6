//! Serializable summary of one run, as printed by the driver and consumed
//! by `xtask sweep`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Algorithm;
use crate::verify::Verification;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub passed: bool,
    pub rel_error: f64,
    pub mismatches: usize,
}

impl From<&Verification> for VerificationSummary {
    fn from(verification: &Verification) -> Self {
        Self {
            passed: verification.passed(),
            rel_error: verification.rel_error,
            mismatches: verification.mismatch_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub algorithm: Algorithm,
    pub n: usize,
    pub procs: usize,
    pub seed: u64,
    /// Slowest rank's compute phase, in seconds.
    pub compute_time_max: f64,
    /// Coordinator's wall time from initialization to the end of
    /// verification, in seconds.
    pub wall_time: f64,
    /// Absent when verification was skipped.
    pub verification: Option<VerificationSummary>,
}

impl RunReport {
    /// A run passes unless it was verified and failed.
    pub fn passed(&self) -> bool {
        self.verification.as_ref().map_or(true, |v| v.passed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "algorithm:        {}", self.algorithm)?;
        writeln!(f, "matrix:           {0}x{0}", self.n)?;
        writeln!(f, "processes:        {}", self.procs)?;
        writeln!(f, "seed:             {}", self.seed)?;
        writeln!(f, "compute time max: {:.6} s", self.compute_time_max)?;
        write!(f, "wall time:        {:.6} s", self.wall_time)?;
        match &self.verification {
            Some(v) => write!(
                f,
                "\nverification:     {} (rel_error = {:e}, mismatches = {})",
                if v.passed { "PASSED" } else { "FAILED" },
                v.rel_error,
                v.mismatches
            ),
            None => write!(f, "\nverification:     skipped"),
        }
    }
}
