//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// pireduce - approximate pi with Nilakantha's series across cooperating workers
#[derive(Parser, Debug)]
#[command(name = "pireduce")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Total number of series terms (e.g. 100000000 or 1e8; 100M or higher recommended)
    #[arg(value_name = "TERMS")]
    pub terms: Option<f64>,

    /// Number of workers (defaults to the number of CPUs)
    #[arg(short = 'n', long, env = "PIREDUCE_WORKERS")]
    pub workers: Option<usize>,

    /// Reduction strategy
    #[arg(short = 's', long, value_enum)]
    pub strategy: Option<StrategyType>,

    /// Split policy for the accumulate strategy
    #[arg(long, value_enum)]
    pub accumulate_split: Option<SplitType>,

    /// JSON report output path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Enable diagnostic output (per-worker partitions, debug logging)
    #[arg(long)]
    pub debug: bool,
}

/// Reduction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    /// Two-sided directed messages with a final broadcast
    Exchange,
    /// One-sided merges into a shared cell between two fences
    Accumulate,
}

/// Split policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitType {
    /// floor(N/P) - 1 terms per worker; trailing terms are dropped
    UniformFloor,
    /// floor(N/P) terms per worker, last worker takes the remainder
    RemainderToLast,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    ///
    /// The term count is deliberately not checked here; only the coordinator
    /// validates it.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(0) = self.workers {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "pireduce",
            "1e8",
            "--workers",
            "4",
            "--strategy",
            "accumulate",
            "--accumulate-split",
            "remainder-to-last",
            "--debug",
        ])
        .unwrap();

        assert_eq!(cli.terms, Some(1e8));
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.strategy, Some(StrategyType::Accumulate));
        assert_eq!(cli.accumulate_split, Some(SplitType::RemainderToLast));
        assert!(cli.debug);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_terms_are_optional_at_parse_time() {
        let cli = Cli::try_parse_from(["pireduce", "-n", "2"]).unwrap();
        assert_eq!(cli.terms, None);
    }

    #[test]
    fn test_negative_terms_reach_validation() {
        let cli = Cli::try_parse_from(["pireduce", "-n", "2", "--", "-5"]).unwrap();
        assert_eq!(cli.terms, Some(-5.0));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cli = Cli::try_parse_from(["pireduce", "100", "--workers", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
