#![warn(missing_docs)]
//! PerfDiff CLI
//!
//! Computes bootstrap confidence intervals for JMH-style CSV result files.
//! One file (or group) reports per-benchmark intervals; two files (or
//! groups) compare the result sets and report the paired ratio per
//! benchmark. Results are printed as semicolon-separated lines; stream
//! errors go to stderr and processing continues.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use perfdiff_bench::{merge_streams, read_executions, CancelToken, EventReceiver, Sampler, Transform};
use perfdiff_bootstrap::{
    ci_stream, compare_streams, BenchmarkCis, BenchmarkRatio, CiContext, CompareResult,
    SimulationConfig,
};
use perfdiff_stats::Ci;
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

/// The statistic to bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatisticKind {
    /// Arithmetic mean.
    Mean,
    /// Median.
    Median,
    /// Coefficient of variation.
    Cov,
}

impl StatisticKind {
    fn function(self) -> perfdiff_stats::StatisticFn {
        match self {
            StatisticKind::Mean => perfdiff_stats::mean,
            StatisticKind::Median => perfdiff_stats::median,
            StatisticKind::Cov => perfdiff_stats::cov,
        }
    }

    fn name(self) -> &'static str {
        match self {
            StatisticKind::Mean => "Mean",
            StatisticKind::Median => "Median",
            StatisticKind::Cov => "COV",
        }
    }
}

/// PerfDiff command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "perfdiff")]
#[command(author, version, about = "Bootstrap CIs and change detection for benchmark results")]
pub struct Cli {
    /// CSV result files: one for CI mode, two (or 2 * group-size) for
    /// comparison mode
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// The statistic to bootstrap
    #[arg(long, short = 's', value_enum, default_value_t = StatisticKind::Mean)]
    pub statistic: StatisticKind,

    /// Number of bootstrap simulations
    #[arg(long, short = 'b', default_value_t = 1000)]
    pub bootstrap: usize,

    /// Significance level; repeat for multiple levels sharing one simulation
    #[arg(long = "significance", default_values_t = [0.05])]
    pub significance: Vec<f64>,

    /// Invocation samples per iteration: 0 for the mean across all
    /// invocations, -1 for all, > 0 for a weighted subsample of that size
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub invocation_samples: i64,

    /// Number of files per group (test or control); e.g. 3 means 6 file
    /// arguments in total
    #[arg(long, default_value_t = 1)]
    pub group_size: usize,

    /// Worker thread cap for the simulation pool (defaults to all cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Multiply every value by this factor before statistics
    #[arg(long)]
    pub factor: Option<f64>,

    /// Decimal digits kept when --factor is applied
    #[arg(long, default_value_t = 3)]
    pub round_digits: i32,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

enum Mode {
    Ci,
    Compare,
}

/// Parse arguments from the process environment and run.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run with already-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .init();
    }

    let mode = match cli.files.len() {
        1 => Mode::Ci,
        n if cli.group_size >= 1 && n == 2 * cli.group_size => Mode::Compare,
        _ => bail!(
            "expected 1 file or {} files (2 * group-size), got {}",
            2 * cli.group_size.max(1),
            cli.files.len()
        ),
    };

    let sampler = sampler_for(cli.invocation_samples)?;
    let transform = match cli.factor {
        Some(factor) => Transform::ConstantFactor {
            factor,
            precision: cli.round_digits,
        },
        None => Transform::Identity,
    };
    let max_workers = cli.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    });
    let ctx = CiContext {
        config: SimulationConfig {
            iterations: cli.bootstrap,
            max_workers,
            significance_levels: cli.significance.clone(),
        },
        statistic: cli.statistic.function(),
        sampler,
        transform,
    };

    let (files_1, files_2): (&[PathBuf], &[PathBuf]) = match mode {
        Mode::Ci => (&cli.files, &[]),
        Mode::Compare => cli.files.split_at(cli.group_size),
    };
    print!("{}", render_header(&cli, &mode, max_workers, sampler, files_1, files_2));

    let start = Instant::now();
    let cancel = CancelToken::new();
    match mode {
        Mode::Ci => {
            let group = open_group(&cli.files, &cancel)?;
            for result in ci_stream(group, ctx).iter() {
                match result {
                    Ok(cis) => print!("{}", format_cis(&cis)),
                    Err(e) => eprintln!("error while retrieving CI result: {e}"),
                }
            }
        }
        Mode::Compare => {
            let (control, test) = cli.files.split_at(cli.group_size);
            let control = open_group(control, &cancel)?;
            let test = open_group(test, &cancel)?;
            for result in compare_streams(control, test, ctx).iter() {
                match result {
                    Ok(CompareResult::Ratio(ratio)) => print!("{}", format_ratio(&ratio)),
                    Ok(CompareResult::OneSided { side, result }) => {
                        print!("{}", format_one_sided(side, &result));
                    }
                    Err(e) => eprintln!("error while retrieving CI result: {e}"),
                }
            }
        }
    }
    println!("#total execution took {:?}", start.elapsed());
    Ok(())
}

fn sampler_for(invocation_samples: i64) -> anyhow::Result<Sampler> {
    match invocation_samples {
        0 => Ok(Sampler::Mean),
        -1 => Ok(Sampler::All),
        n if n > 0 => Ok(Sampler::Sample(n as usize)),
        _ => bail!(
            "invalid number of invocation samples: must be 0 for the iteration mean, \
             -1 for all, or > 0 for a subsample size"
        ),
    }
}

/// Open every file of one group and merge their ingestion streams. A file
/// that cannot be opened aborts the whole group.
fn open_group(files: &[PathBuf], cancel: &CancelToken) -> anyhow::Result<EventReceiver> {
    let mut streams = Vec::with_capacity(files.len());
    for path in files {
        let file = File::open(path).with_context(|| format!("could not open file '{}'", path.display()))?;
        streams.push(read_executions(file, cancel.clone()));
    }
    if streams.len() == 1 {
        return Ok(streams.swap_remove(0));
    }
    Ok(merge_streams(streams))
}

fn render_header(
    cli: &Cli,
    mode: &Mode,
    workers: usize,
    sampler: Sampler,
    files_1: &[PathBuf],
    files_2: &[PathBuf],
) -> String {
    let mode_name = match mode {
        Mode::Ci => "CI",
        Mode::Compare => "Detection",
    };
    let sampling = match sampler {
        Sampler::Mean => "Mean".to_string(),
        Sampler::All => "All".to_string(),
        Sampler::Sample(n) => format!("{n} invocations per iteration"),
    };
    let levels = cli
        .significance
        .iter()
        .map(|l| format!("{l:.2}"))
        .collect::<Vec<_>>()
        .join(",");
    let mut out = String::new();
    out.push_str("#Execute CIs:\n");
    out.push_str(&format!("# cmd = {mode_name}\n"));
    out.push_str(&format!("# number of cores = {workers}\n"));
    out.push_str(&format!("# bootstrap simulations = {}\n", cli.bootstrap));
    out.push_str(&format!("# significance levels = {levels}\n"));
    out.push_str(&format!("# statistic = {}\n", cli.statistic.name()));
    out.push_str(&format!("# invocation sampling = {sampling}\n"));
    out.push_str(&format!("# files 1 = {}\n", join_paths(files_1)));
    out.push_str(&format!("# files 2 = {}\n", join_paths(files_2)));
    out.push('\n');
    out
}

fn join_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn identity_prefix(benchmark: &perfdiff_bench::Benchmark) -> String {
    format!(
        "{};{};{}",
        benchmark.name,
        benchmark.function_params.join(","),
        benchmark.perf_params_string()
    )
}

fn ci_fields(ci: &Ci) -> String {
    format!("{:e};{:e};{:e};{:.2}", ci.metric, ci.lower, ci.upper, ci.level)
}

fn format_cis(cis: &BenchmarkCis) -> String {
    let prefix = identity_prefix(&cis.benchmark);
    let mut out = String::new();
    for ci in &cis.cis {
        out.push_str(&format!("{prefix};{}\n", ci_fields(ci)));
    }
    out
}

fn format_one_sided(side: perfdiff_bootstrap::Side, cis: &BenchmarkCis) -> String {
    let prefix = identity_prefix(&cis.benchmark);
    let mut out = String::new();
    for ci in &cis.cis {
        out.push_str(&format!("{prefix};{side};{}\n", ci_fields(ci)));
    }
    out
}

fn format_ratio(ratio: &BenchmarkRatio) -> String {
    let prefix = identity_prefix(&ratio.benchmark);
    let mut out = String::new();
    for ((a, b), r) in ratio
        .cis
        .a
        .iter()
        .zip(&ratio.cis.b)
        .zip(&ratio.cis.ratio)
    {
        out.push_str(&format!(
            "{prefix};{};{};{}\n",
            ci_fields(a),
            ci_fields(b),
            ci_fields(r)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfdiff_bench::Benchmark;

    #[test]
    fn test_sampler_mapping() {
        assert_eq!(sampler_for(0).unwrap(), Sampler::Mean);
        assert_eq!(sampler_for(-1).unwrap(), Sampler::All);
        assert_eq!(sampler_for(10).unwrap(), Sampler::Sample(10));
        assert!(sampler_for(-2).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["perfdiff", "results.csv"]).unwrap();
        assert_eq!(cli.bootstrap, 1000);
        assert_eq!(cli.significance, vec![0.05]);
        assert_eq!(cli.statistic, StatisticKind::Mean);
        assert_eq!(cli.group_size, 1);
        assert_eq!(cli.invocation_samples, 0);
    }

    #[test]
    fn test_cli_repeated_significance() {
        let cli = Cli::try_parse_from([
            "perfdiff",
            "--significance",
            "0.01",
            "--significance",
            "0.05",
            "a.csv",
            "b.csv",
        ])
        .unwrap();
        assert_eq!(cli.significance, vec![0.01, 0.05]);
        assert_eq!(cli.files.len(), 2);
    }

    #[test]
    fn test_cli_negative_invocation_samples() {
        let cli =
            Cli::try_parse_from(["perfdiff", "--invocation-samples", "-1", "a.csv"]).unwrap();
        assert_eq!(cli.invocation_samples, -1);
    }

    #[test]
    fn test_cli_requires_files() {
        assert!(Cli::try_parse_from(["perfdiff"]).is_err());
    }

    #[test]
    fn test_header_lists_files_per_group() {
        let cli = Cli::try_parse_from(["perfdiff", "a.csv", "b.csv"]).unwrap();
        let (files_1, files_2) = cli.files.split_at(1);
        let header = render_header(&cli, &Mode::Compare, 4, Sampler::Mean, files_1, files_2);

        assert!(header.starts_with("#Execute CIs:\n# cmd = Detection\n"));
        assert!(header.contains("# number of cores = 4\n"));
        assert!(header.contains("# files 1 = a.csv\n"));
        assert!(header.contains("# files 2 = b.csv\n"));
    }

    #[test]
    fn test_header_ci_mode_second_group_empty() {
        let cli = Cli::try_parse_from(["perfdiff", "results.csv"]).unwrap();
        let header = render_header(&cli, &Mode::Ci, 2, Sampler::All, &cli.files, &[]);

        assert!(header.contains("# cmd = CI\n"));
        assert!(header.contains("# files 1 = results.csv\n"));
        assert!(header.contains("# files 2 = \n"));
    }

    #[test]
    fn test_format_cis_line() {
        let mut b = Benchmark::new("pkg.Bench");
        b.add_param("size", "10");
        let cis = BenchmarkCis {
            benchmark: b,
            cis: vec![Ci {
                metric: 2.0,
                lower: 1.0,
                upper: 3.0,
                level: 0.95,
            }],
        };
        assert_eq!(format_cis(&cis), "pkg.Bench;;size=10;2e0;1e0;3e0;0.95\n");
    }

    #[test]
    fn test_format_ratio_lines_per_level() {
        let ci = Ci {
            metric: 1.0,
            lower: 1.0,
            upper: 1.0,
            level: 0.95,
        };
        let ratio = BenchmarkRatio {
            benchmark: Benchmark::new("b"),
            cis: perfdiff_bootstrap::RatioCis {
                a: vec![ci; 2],
                b: vec![ci; 2],
                ratio: vec![ci; 2],
            },
        };
        let out = format_ratio(&ratio);
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("b;;;1e0;1e0;1e0;0.95;1e0;1e0;1e0;0.95;1e0;1e0;1e0;0.95\n"));
    }
}
