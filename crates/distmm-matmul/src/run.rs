use comm::Communicator;

use crate::config::RunConfig;
use crate::error::{rejected, ConfigError, Error, Result};
use crate::init::initialize_matrices;
use crate::reference::serial_verify_reference;
use crate::report::{RunReport, VerificationSummary};
use crate::verify::Verification;
use crate::ROOT;

/// Initialize, multiply and (optionally) verify one configuration on
/// `world`. Every rank must call this with the same `config`.
///
/// The coordinator returns the report; every other rank returns `None`.
pub fn run<C: Communicator>(world: &C, config: &RunConfig) -> Result<Option<RunReport>> {
    let rank = world.rank();
    if config.procs != world.size() {
        let err = ConfigError::GroupSizeMismatch {
            expected: config.procs,
            actual: world.size(),
        };
        return Err(rejected(rank, "run", err));
    }
    config.validate().map_err(|err| rejected(rank, "run", err))?;

    let start = world.wall_time();
    let mut operands = initialize_matrices(config.n, rank, config.seed)?;
    let timing = config.algorithm.multiply(world, &mut operands)?;
    if rank != ROOT {
        return Ok(None);
    }

    let verification = if config.verify {
        let a = operands.a.as_ref().ok_or(Error::MissingOperand("A"))?;
        let c = operands.c.as_ref().ok_or(Error::MissingOperand("C"))?;
        let expected = serial_verify_reference(a, &operands.b)?;
        let verification = Verification::compare(c, &expected)?;
        verification.log();
        Some(VerificationSummary::from(&verification))
    } else {
        None
    };

    let report = RunReport {
        algorithm: config.algorithm,
        n: config.n,
        procs: config.procs,
        seed: config.seed,
        compute_time_max: timing.max.unwrap_or(timing.local),
        wall_time: world.wall_time() - start,
        verification,
    };
    tracing::info!(
        algorithm = %report.algorithm,
        n = report.n,
        procs = report.procs,
        compute_time_max = report.compute_time_max,
        "run complete"
    );
    Ok(Some(report))
}
