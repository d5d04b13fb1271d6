//! Distributed matrix multiply driver.
//!
//! Spawns one thread per rank, multiplies two seeded N×N matrices with the
//! selected algorithm and prints the coordinator's report on stdout. Logs go
//! to stderr, filtered by `RUST_LOG`.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use comm::LocalUniverse;
use matmul::config::DEFAULT_SEED;
use matmul::{Algorithm, RunConfig, RunReport};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "matmul-run", version, about = "Distributed dense integer matrix multiply")]
struct Cli {
    /// Matrix dimension N
    #[arg(short = 'n', long, env = "DISTMM_SIZE", default_value_t = 256)]
    size: usize,

    /// Number of ranks P
    #[arg(short = 'p', long, env = "DISTMM_PROCS", default_value_t = 4)]
    procs: usize,

    /// Partitioning strategy: `row-partition` or `cannon`
    #[arg(short, long, env = "DISTMM_ALGORITHM", default_value_t = Algorithm::RowPartition)]
    algorithm: Algorithm,

    /// Seed for the operand generator
    #[arg(long, env = "DISTMM_SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Skip comparison with the serial reference
    #[arg(long)]
    no_verify: bool,

    /// Print the report as one JSON line
    #[arg(long)]
    json: bool,

    /// Fail a receive that waits longer than this many seconds
    #[arg(long, env = "DISTMM_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn config(&self) -> RunConfig {
        RunConfig {
            n: self.size,
            procs: self.procs,
            algorithm: self.algorithm,
            seed: self.seed,
            verify: !self.no_verify,
        }
    }
}

fn execute(cli: &Cli) -> Result<RunReport> {
    let config = cli.config();
    config.validate().with_context(|| {
        format!("cannot run {} on {} processes", config.algorithm, config.procs)
    })?;

    let mut universe = LocalUniverse::new(config.procs);
    if let Some(secs) = cli.timeout_secs {
        universe = universe.recv_timeout(Duration::from_secs(secs));
    }

    let reports = universe
        .run(|world| matmul::run(&world, &config))
        .context("distributed multiply failed")?;
    reports
        .into_iter()
        .flatten()
        .next()
        .context("coordinator produced no report")
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let report = match execute(&cli) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(err) => {
                tracing::error!(%err, "cannot serialize report");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{report}");
    }

    if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["matmul-run"]).unwrap();
        let config = cli.config();
        assert_eq!(config.algorithm, Algorithm::RowPartition);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert!(config.verify);
    }

    #[test]
    fn test_cli_parses_algorithm() {
        let args = ["matmul-run", "-n", "8", "-p", "4", "-a", "cannon", "--no-verify"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(
            cli.config(),
            RunConfig {
                verify: false,
                ..RunConfig::new(8, 4, Algorithm::Cannon)
            }
        );
    }

    #[test]
    fn test_cli_rejects_unknown_algorithm() {
        assert!(Cli::try_parse_from(["matmul-run", "-a", "strassen"]).is_err());
    }

    #[test]
    fn test_execute_small_run() {
        let cli = Cli::try_parse_from(["matmul-run", "-n", "6", "-p", "9", "-a", "cannon"]).unwrap();
        let report = execute(&cli).unwrap();
        assert!(report.passed());
        assert_eq!(report.procs, 9);
    }

    #[test]
    fn test_execute_rejects_invalid_shape() {
        let cli = Cli::try_parse_from(["matmul-run", "-n", "10", "-p", "4"]).unwrap();
        assert!(execute(&cli).is_err());
    }
}
