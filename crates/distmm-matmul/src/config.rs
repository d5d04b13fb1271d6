//! Run configuration.

use std::fmt;
use std::str::FromStr;

use comm::Communicator;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::init::Operands;
use crate::row_partition::RowBands;
use crate::tile::TileGrid;
use crate::timing::Timing;
use crate::{cannon_multiply, row_partition_multiply};

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// Partitioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    RowPartition,
    Cannon,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::RowPartition, Algorithm::Cannon];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::RowPartition => "row-partition",
            Algorithm::Cannon => "cannon",
        }
    }

    /// Check that an `n × n` multiply can run on `procs` ranks.
    pub fn validate(self, n: usize, procs: usize) -> std::result::Result<(), ConfigError> {
        match self {
            Algorithm::RowPartition => RowBands::new(n, procs).map(drop),
            Algorithm::Cannon => TileGrid::new(n, procs).map(drop),
        }
    }

    pub fn multiply<C: Communicator>(self, world: &C, operands: &mut Operands) -> Result<Timing> {
        match self {
            Algorithm::RowPartition => row_partition_multiply(world, operands),
            Algorithm::Cannon => cannon_multiply(world, operands),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_verify() -> bool {
    true
}

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Matrix dimension N.
    pub n: usize,
    /// Number of ranks P.
    pub procs: usize,
    pub algorithm: Algorithm,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Compare the result with the serial reference on the coordinator.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

impl RunConfig {
    pub fn new(n: usize, procs: usize, algorithm: Algorithm) -> Self {
        Self {
            n,
            procs,
            algorithm,
            seed: DEFAULT_SEED,
            verify: true,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.algorithm.validate(self.n, self.procs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.to_string().parse::<Algorithm>(), Ok(algorithm));
        }
        assert_eq!(
            "strassen".parse::<Algorithm>(),
            Err(ConfigError::UnknownAlgorithm("strassen".to_string()))
        );
    }

    #[test]
    fn test_validate() {
        assert!(RunConfig::new(12, 4, Algorithm::RowPartition).validate().is_ok());
        assert!(RunConfig::new(12, 5, Algorithm::RowPartition).validate().is_err());
        assert!(RunConfig::new(12, 9, Algorithm::Cannon).validate().is_ok());
        assert_eq!(
            RunConfig::new(12, 6, Algorithm::Cannon).validate(),
            Err(ConfigError::NonSquareProcessCount { procs: 6 })
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"n": 8, "procs": 4, "algorithm": "cannon"}"#).unwrap();
        assert_eq!(config, RunConfig::new(8, 4, Algorithm::Cannon));
    }
}
