//! Scaling sweep: run the driver over every (algorithm, size, process count)
//! combination of a YAML config and tabulate speedup and efficiency.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use matmul::config::DEFAULT_SEED;
use matmul::{Algorithm, RunConfig, RunReport};
use serde::{Deserialize, Serialize};

use crate::sh::{ShOptionsBuilder, StreamMode};

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Path to YAML config (defaults to `<workspace>/sweep.yaml`)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only sweep these algorithms (repeatable)
    #[arg(short, long = "algorithm")]
    pub algorithms: Vec<Algorithm>,

    /// Write the measurements and scaling table as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print commands as they run
    #[arg(long)]
    pub verbose: bool,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Deserialize)]
struct SweepConfig {
    /// Commands run once before the sweep, e.g. a release build.
    #[serde(default)]
    pre: Vec<String>,
    /// Template with `{size}`, `{procs}`, `{algorithm}` and `{seed}`
    /// placeholders. The command must print a JSON run report as its last
    /// line of stdout.
    command: String,
    #[serde(default = "default_seed")]
    seed: u64,
    sizes: Vec<usize>,
    procs: Vec<usize>,
    algorithms: Vec<Algorithm>,
}

fn load_config(path: &Path) -> Result<SweepConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_slice(&bytes).with_context(|| format!("cannot parse {}", path.display()))
}

fn render_template(template: &str, workspace: &Path, run: &RunConfig) -> String {
    template
        .replace("{workspace}", &workspace.to_string_lossy())
        .replace("{size}", &run.n.to_string())
        .replace("{procs}", &run.procs.to_string())
        .replace("{algorithm}", run.algorithm.name())
        .replace("{seed}", &run.seed.to_string())
}

/// Every valid run of the config, in (algorithm, size, procs) order, plus a
/// note for each combination that cannot run.
fn plan(config: &SweepConfig, only: &[Algorithm]) -> (Vec<RunConfig>, Vec<String>) {
    let mut runs = Vec::new();
    let mut skipped = Vec::new();
    for &algorithm in &config.algorithms {
        if !only.is_empty() && !only.contains(&algorithm) {
            continue;
        }
        for &n in &config.sizes {
            for &procs in &config.procs {
                let run = RunConfig {
                    seed: config.seed,
                    ..RunConfig::new(n, procs, algorithm)
                };
                match run.validate() {
                    Ok(()) => runs.push(run),
                    Err(err) => skipped.push(format!("{algorithm} n={n} p={procs}: {err}")),
                }
            }
        }
    }
    (runs, skipped)
}

/// The report on the last non-empty stdout line.
fn parse_report(stdout: &str) -> Result<RunReport> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("command printed no report"))?;
    serde_json::from_str(line).with_context(|| format!("not a run report: {line}"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Scaling {
    algorithm: Algorithm,
    n: usize,
    procs: usize,
    compute_time: f64,
    speedup: f64,
    efficiency: f64,
}

/// Speedup and efficiency of each report relative to the smallest process
/// count measured for the same algorithm and size.
fn scaling(reports: &[RunReport]) -> Vec<Scaling> {
    let mut series: BTreeMap<(Algorithm, usize), Vec<&RunReport>> = BTreeMap::new();
    for report in reports {
        series
            .entry((report.algorithm, report.n))
            .or_default()
            .push(report);
    }

    let mut rows = Vec::new();
    for ((algorithm, n), mut runs) in series {
        runs.sort_by_key(|report| report.procs);
        let Some(base) = runs.first().copied() else {
            continue;
        };
        for report in runs {
            let speedup = if report.compute_time_max > 0.0 {
                base.compute_time_max / report.compute_time_max
            } else {
                f64::NAN
            };
            rows.push(Scaling {
                algorithm,
                n,
                procs: report.procs,
                compute_time: report.compute_time_max,
                speedup,
                efficiency: speedup * base.procs as f64 / report.procs as f64,
            });
        }
    }
    rows
}

fn format_table(rows: &[Scaling]) -> String {
    let mut out = format!(
        "{:<14} {:>6} {:>6} {:>12} {:>9} {:>10}\n",
        "algorithm", "n", "procs", "compute (s)", "speedup", "efficiency"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<14} {:>6} {:>6} {:>12.6} {:>9.2} {:>10.2}",
            row.algorithm.name(),
            row.n,
            row.procs,
            row.compute_time,
            row.speedup,
            row.efficiency
        );
    }
    out
}

#[derive(Serialize)]
struct SweepOutput<'a> {
    reports: &'a [RunReport],
    scaling: &'a [Scaling],
    skipped: &'a [String],
}

pub fn run(args: SweepArgs) -> Result<()> {
    let workspace = match &args.config {
        Some(path) => path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => crate::findup::workspace_root()?,
    };
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| workspace.join("sweep.yaml"));
    let config = load_config(&config_path)?;

    let (runs, skipped) = plan(&config, &args.algorithms);
    for note in &skipped {
        println!("[sweep] skipping {note}");
    }

    let opts = ShOptionsBuilder::default()
        .stdout(StreamMode::Pipe)
        .cwd(Some(workspace.clone()))
        .quiet(!args.verbose)
        .build()?;

    for (i, cmd) in config.pre.iter().enumerate() {
        println!("[pre {}/{}] {}", i + 1, config.pre.len(), cmd);
        if !args.dry_run {
            crate::sh!(options(opts), cmd)?;
        }
    }

    let mut reports = Vec::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        let cmd = render_template(&config.command, &workspace, run);
        println!(
            "[{}/{}] {} n={} p={}",
            i + 1,
            runs.len(),
            run.algorithm,
            run.n,
            run.procs
        );
        if args.verbose || args.dry_run {
            println!("{cmd}");
        }
        if args.dry_run {
            continue;
        }

        let out = crate::sh!(options(opts), &cmd)?;
        reports.push(parse_report(&out.stdout)?);
    }

    if args.dry_run {
        return Ok(());
    }

    let rows = scaling(&reports);
    print!("{}", format_table(&rows));

    if let Some(path) = &args.output {
        let output = SweepOutput {
            reports: &reports,
            scaling: &rows,
            skipped: &skipped,
        };
        let json = serde_json::to_string_pretty(&output)?;
        std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
        println!("[sweep] wrote {}", path.display());
    }

    println!("[sweep] done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
pre:
  - cargo build --release -p matmul-run
command: target/release/matmul-run --json -n {size} -p {procs} -a {algorithm} --seed {seed}
sizes: [12, 16]
procs: [1, 4, 6]
algorithms: [row-partition, cannon]
"#;

    fn report(algorithm: Algorithm, n: usize, procs: usize, time: f64) -> RunReport {
        RunReport {
            algorithm,
            n,
            procs,
            seed: DEFAULT_SEED,
            compute_time_max: time,
            wall_time: time * 2.0,
            verification: None,
        }
    }

    #[test]
    fn test_parse_config() {
        let config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.algorithms, vec![Algorithm::RowPartition, Algorithm::Cannon]);
        assert_eq!(config.pre.len(), 1);
    }

    #[test]
    fn test_plan_skips_invalid_shapes() {
        let config: SweepConfig = serde_yaml::from_str(CONFIG).unwrap();
        let (runs, skipped) = plan(&config, &[]);
        // Row partition: 16 is not divisible by 6. Cannon: 6 is not square
        // for either size.
        assert_eq!(runs.len(), 12 - 3);
        assert_eq!(skipped.len(), 3);
        assert!(skipped.iter().any(|note| note.starts_with("cannon n=12 p=6")));

        let (cannon_only, _) = plan(&config, &[Algorithm::Cannon]);
        assert!(cannon_only.iter().all(|run| run.algorithm == Algorithm::Cannon));
        assert_eq!(cannon_only.len(), 4);
    }

    #[test]
    fn test_render_template() {
        let run = RunConfig::new(64, 16, Algorithm::Cannon);
        let cmd = render_template(
            "{workspace}/bin -n {size} -p {procs} -a {algorithm} --seed {seed}",
            Path::new("/ws"),
            &run,
        );
        assert_eq!(cmd, "/ws/bin -n 64 -p 16 -a cannon --seed 42");
    }

    #[test]
    fn test_parse_report_uses_last_line() {
        let json = serde_json::to_string(&report(Algorithm::Cannon, 8, 4, 0.5)).unwrap();
        let stdout = format!("building...\n{json}\n\n");
        assert_eq!(parse_report(&stdout).unwrap(), report(Algorithm::Cannon, 8, 4, 0.5));
        assert!(parse_report("\n").is_err());
        assert!(parse_report("not json\n").is_err());
    }

    #[test]
    fn test_scaling_relative_to_smallest_process_count() {
        let reports = vec![
            report(Algorithm::RowPartition, 64, 4, 1.0),
            report(Algorithm::RowPartition, 64, 2, 2.0),
            report(Algorithm::RowPartition, 64, 8, 0.8),
        ];
        let rows = scaling(&reports);
        let procs: Vec<usize> = rows.iter().map(|row| row.procs).collect();
        assert_eq!(procs, vec![2, 4, 8]);
        assert_eq!(rows[0].speedup, 1.0);
        assert_eq!(rows[0].efficiency, 1.0);
        assert_eq!(rows[1].speedup, 2.0);
        assert_eq!(rows[1].efficiency, 1.0);
        assert_eq!(rows[2].speedup, 2.5);
        assert_eq!(rows[2].efficiency, 0.625);
    }

    #[test]
    fn test_scaling_separates_series() {
        let reports = vec![
            report(Algorithm::Cannon, 64, 4, 1.0),
            report(Algorithm::RowPartition, 64, 4, 1.0),
            report(Algorithm::Cannon, 128, 16, 3.0),
        ];
        let rows = scaling(&reports);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.speedup == 1.0));
    }

    #[test]
    fn test_table_has_row_per_measurement() {
        let rows = scaling(&[report(Algorithm::Cannon, 64, 4, 1.0)]);
        let table = format_table(&rows);
        assert_eq!(table.lines().count(), 2);
        assert!(table.lines().nth(1).unwrap().starts_with("cannon"));
    }
}
