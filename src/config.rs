use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use argonbench_params::DEFAULT_MEMORY_COST_KIB;
use clap::{Parser, ValueEnum};

const DEFAULT_DIFFICULTY_FILE: &str = "difficulty.txt";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_ITERATIONS: u64 = 200_000;
const DEFAULT_SAMPLES: u32 = 10;
const DEFAULT_SKIP_DELAY_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendMode {
    Cuda,
    Opencl,
    Cpu,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cuda => "cuda",
            Self::Opencl => "opencl",
            Self::Cpu => "cpu",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputType {
    /// Nanoseconds per batch.
    Ns,
    /// Nanoseconds per individual hash.
    NsPerHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Verbose,
    Raw,
    Mean,
    MeanAndMdev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KernelType {
    BySegment,
    Oneshot,
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BySegment => "by-segment",
            Self::Oneshot => "oneshot",
        })
    }
}

/// What happens to the difficulty once an interrupt has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShutdownPolicy {
    Keep,
    /// Lower the difficulty by one, never below 1.
    Decrement,
}

#[derive(Debug, Parser)]
#[command(
    name = "argonbench",
    version,
    about = "Argon2id benchmark runner: CUDA, OpenCL and CPU modes with live difficulty control"
)]
struct Cli {
    /// List all available devices and exit
    #[arg(short = 'l', long)]
    list_devices: bool,

    /// Mode in which to run
    #[arg(short = 'm', long, value_enum, default_value_t = BackendMode::Cuda)]
    mode: BackendMode,

    /// Use device with index INDEX
    #[arg(short = 'd', long = "device", value_name = "INDEX", default_value_t = 0)]
    device_index: usize,

    /// What to output
    #[arg(short = 'o', long, value_enum, value_name = "TYPE", default_value_t = OutputType::Ns)]
    output_type: OutputType,

    /// Output mode
    #[arg(long, value_enum, value_name = "MODE", default_value_t = OutputMode::Verbose)]
    output_mode: OutputMode,

    /// Number of tasks per batch (0 sizes the batch from free device memory)
    #[arg(short = 'b', long, value_name = "N", default_value_t = 0)]
    batch_size: u32,

    /// Kernel type
    #[arg(short = 'k', long, value_enum, value_name = "TYPE", default_value_t = KernelType::Oneshot)]
    kernel_type: KernelType,

    /// Precompute reference indices with Argon2i
    #[arg(short = 'p', long)]
    precompute_refs: bool,

    /// File holding the live difficulty (memory cost in KiB)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DIFFICULTY_FILE)]
    difficulty_file: PathBuf,

    /// Difficulty used until the difficulty file is read successfully
    #[arg(
        long,
        value_name = "KIB",
        default_value_t = DEFAULT_MEMORY_COST_KIB,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    initial_difficulty: u32,

    /// Seconds between difficulty file reads
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    poll_interval_secs: u64,

    /// Hard ceiling on benchmark iterations
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_ITERATIONS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    max_iterations: u64,

    /// Timing samples collected per iteration
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_SAMPLES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    samples: u32,

    /// CPU worker threads (defaults to available parallelism)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    threads: Option<u64>,

    /// Difficulty adjustment applied after an interrupt
    #[arg(long, value_enum, value_name = "POLICY", default_value_t = ShutdownPolicy::Decrement)]
    shutdown_policy: ShutdownPolicy,

    /// Seconds to wait after a skipped iteration
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_SKIP_DELAY_SECS)]
    skip_delay_secs: u64,

    /// Write a JSON run report to PATH on exit
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub list_devices: bool,
    pub mode: BackendMode,
    pub device_index: usize,
    pub output_type: OutputType,
    pub output_mode: OutputMode,
    /// Zero means the batch is sized from the device memory probe.
    pub batch_size: u32,
    pub kernel_type: KernelType,
    pub precompute_refs: bool,
    pub difficulty_file: PathBuf,
    pub initial_difficulty: u32,
    pub poll_interval: Duration,
    pub max_iterations: u64,
    pub samples: u32,
    pub threads: usize,
    pub shutdown_policy: ShutdownPolicy,
    pub skip_delay: Duration,
    pub report: Option<PathBuf>,
}

impl Config {
    /// Parses the process arguments. The error carries clap's rendered
    /// message and exit code: 0 for `--help`/`--version`, 2 for usage errors.
    pub fn parse() -> Result<Self, clap::Error> {
        Cli::try_parse().map(Self::from_cli)
    }

    #[cfg(test)]
    fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Cli::try_parse_from(args).map(Self::from_cli)
    }

    fn from_cli(cli: Cli) -> Self {
        let threads = cli
            .threads
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_else(default_threads);

        Self {
            list_devices: cli.list_devices,
            mode: cli.mode,
            device_index: cli.device_index,
            output_type: cli.output_type,
            output_mode: cli.output_mode,
            batch_size: cli.batch_size,
            kernel_type: cli.kernel_type,
            precompute_refs: cli.precompute_refs,
            difficulty_file: cli.difficulty_file,
            initial_difficulty: cli.initial_difficulty,
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
            max_iterations: cli.max_iterations,
            samples: cli.samples,
            threads,
            shutdown_policy: cli.shutdown_policy,
            skip_delay: Duration::from_secs(cli.skip_delay_secs),
            report: cli.report,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_bench_surface() {
        let cfg = Config::try_parse_from(["argonbench"]).expect("defaults should parse");
        assert_eq!(cfg.mode, BackendMode::Cuda);
        assert_eq!(cfg.device_index, 0);
        assert_eq!(cfg.output_type, OutputType::Ns);
        assert_eq!(cfg.output_mode, OutputMode::Verbose);
        assert_eq!(cfg.batch_size, 0);
        assert_eq!(cfg.kernel_type, KernelType::Oneshot);
        assert!(!cfg.precompute_refs);
        assert!(!cfg.list_devices);
        assert_eq!(cfg.difficulty_file, PathBuf::from("difficulty.txt"));
        assert_eq!(cfg.initial_difficulty, 1727);
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.max_iterations, 200_000);
        assert_eq!(cfg.shutdown_policy, ShutdownPolicy::Decrement);
        assert!(cfg.threads >= 1);
    }

    #[test]
    fn parses_short_and_long_flags() {
        let cfg = Config::try_parse_from([
            "argonbench",
            "-m",
            "cpu",
            "-d",
            "2",
            "-o",
            "ns-per-hash",
            "--output-mode",
            "mean-and-mdev",
            "-b",
            "64",
            "-k",
            "by-segment",
            "-p",
            "--shutdown-policy",
            "keep",
            "--threads",
            "3",
        ])
        .expect("flags should parse");

        assert_eq!(cfg.mode, BackendMode::Cpu);
        assert_eq!(cfg.device_index, 2);
        assert_eq!(cfg.output_type, OutputType::NsPerHash);
        assert_eq!(cfg.output_mode, OutputMode::MeanAndMdev);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.kernel_type, KernelType::BySegment);
        assert!(cfg.precompute_refs);
        assert_eq!(cfg.shutdown_policy, ShutdownPolicy::Keep);
        assert_eq!(cfg.threads, 3);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Config::try_parse_from(["argonbench", "--mode", "metal"]).is_err());
    }

    #[test]
    fn rejects_zero_difficulty_and_zero_ceiling() {
        assert!(Config::try_parse_from(["argonbench", "--initial-difficulty", "0"]).is_err());
        assert!(Config::try_parse_from(["argonbench", "--max-iterations", "0"]).is_err());
        assert!(Config::try_parse_from(["argonbench", "--poll-interval-secs", "0"]).is_err());
    }

    #[test]
    fn help_is_reported_as_display_help() {
        let err = Config::try_parse_from(["argonbench", "--help"]).expect_err("help short-circuits");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn usage_errors_exit_with_code_two() {
        let err = Config::try_parse_from(["argonbench", "--batch-size", "many"])
            .expect_err("non-numeric batch size is a usage error");
        assert_eq!(err.exit_code(), 2);

        let err = Config::try_parse_from(["argonbench", "--no-such-flag"])
            .expect_err("unknown flag is a usage error");
        assert_eq!(err.exit_code(), 2);
    }
}
