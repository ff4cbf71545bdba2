//! CLI argument parsing
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Common arguments shared via composition, not inheritance
//! - Every option overrides the matching config-file value when given

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, PolicyKind, RunMode};

/// Common arguments shared across binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (ignored if it does not exist)
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,
}

/// Arguments for a simulation run
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Source dataset (comma-delimited, timestamp first)
    #[arg(short = 's', long = "source")]
    pub source: Option<PathBuf>,

    /// Output CSV file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Stop after N accepted events
    #[arg(short = 'n', long = "limit")]
    pub limit: Option<u64>,

    /// Disorder window (maximum positional displacement)
    #[arg(short = 'w', long = "window", allow_negative_numbers = true)]
    pub window: Option<i64>,

    /// Selection policy
    #[arg(short = 'p', long = "policy", value_enum)]
    pub policy: Option<PolicyKind>,

    /// Seed for the random policy
    #[arg(long, env = "DISORDER_SEED")]
    pub seed: Option<u64>,

    /// Emit disordered or sorted output
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<RunMode>,

    /// Channel capacity between loader and consumer (0 = unbounded)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(source) = &self.source {
            config.source.path = source.clone();
        }
        if let Some(output) = &self.output {
            config.sink.path = output.clone();
        }
        if self.limit.is_some() {
            config.source.record_limit = self.limit;
        }
        if let Some(window) = self.window {
            config.disorder.window = window;
        }
        if let Some(policy) = self.policy {
            config.disorder.policy = policy;
        }
        if let Some(seed) = self.seed {
            config.disorder.seed = seed;
        }
        if let Some(mode) = self.mode {
            config.disorder.mode = mode;
        }
        if let Some(capacity) = self.capacity {
            config.source.channel_capacity = capacity;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_args_default() {
        let args = CommonArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.config_file, "config.toml");
    }

    #[test]
    fn test_common_args_custom_config() {
        let args = CommonArgs::try_parse_from(["test", "-f", "custom.toml"]).unwrap();
        assert_eq!(args.config_file, "custom.toml");
    }

    #[test]
    fn test_run_args_default() {
        let args = RunArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.common.config_file, "config.toml");
        assert_eq!(args.source, None);
        assert_eq!(args.window, None);
        assert_eq!(args.policy, None);
        assert!(!args.json);
    }

    #[test]
    fn test_run_args_full() {
        let args = RunArgs::try_parse_from([
            "test",
            "-f",
            "sim.toml",
            "-s",
            "log.csv",
            "-o",
            "out.csv",
            "-n",
            "1000",
            "-w",
            "5",
            "-p",
            "round-robin",
            "--seed",
            "3",
            "-m",
            "sorted",
            "--capacity",
            "64",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.common.config_file, "sim.toml");
        assert_eq!(args.source, Some(PathBuf::from("log.csv")));
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
        assert_eq!(args.limit, Some(1000));
        assert_eq!(args.window, Some(5));
        assert_eq!(args.policy, Some(PolicyKind::RoundRobin));
        assert_eq!(args.seed, Some(3));
        assert_eq!(args.mode, Some(RunMode::Sorted));
        assert_eq!(args.capacity, Some(64));
        assert!(args.json);
    }

    #[test]
    fn test_negative_window_parses_then_fails_validation() {
        let args = RunArgs::try_parse_from(["test", "--window", "-1"]).unwrap();
        assert_eq!(args.window, Some(-1));
        let config = args.apply(Config::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(RunArgs::try_parse_from(["test", "--policy", "lifo"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs::try_parse_from(["test", "-w", "2", "-n", "10"]).unwrap();
        let config = args.apply(Config::default());
        assert_eq!(config.disorder.window, 2);
        assert_eq!(config.source.record_limit, Some(10));
        // Untouched values keep their defaults
        assert_eq!(config.source.channel_capacity, 10_000);
        assert_eq!(config.disorder.policy, PolicyKind::Random);
    }
}
