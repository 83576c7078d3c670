//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! The total term count travels separately from the rest of the configuration:
//! it is handed only to the coordinator, which validates it before any work is
//! distributed (see [`validator::validate_term_count`]).

pub mod cli;
pub mod toml;
pub mod validator;

use crate::partition::SplitPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Raw total term count, validated by the coordinator
    #[serde(default)]
    pub terms: Option<f64>,
    /// Number of workers in the worker set
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Reduction strategy
    #[serde(default)]
    pub strategy: Strategy,
    /// Split policy used by the accumulate strategy
    #[serde(default = "default_accumulate_split")]
    pub accumulate_split: SplitPolicy,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_accumulate_split() -> SplitPolicy {
    SplitPolicy::UniformFloor
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terms: None,
            workers: default_workers(),
            strategy: Strategy::default(),
            accumulate_split: default_accumulate_split(),
            output: OutputConfig::default(),
        }
    }
}

/// How partial sums are combined at the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Directed messages: config out, partials in, final value back out
    #[default]
    Exchange,
    /// Commutative merges into a shared cell between two fences
    Accumulate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Exchange => write!(f, "exchange"),
            Strategy::Accumulate => write!(f, "accumulate"),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Enable diagnostics (debug logging, partition table)
    #[serde(default)]
    pub debug: bool,
    /// JSON report path
    pub json_output: Option<PathBuf>,
}

impl Config {
    /// Split policy the selected strategy partitions with
    pub fn split_policy(&self) -> SplitPolicy {
        match self.strategy {
            Strategy::Exchange => SplitPolicy::RemainderToLast,
            Strategy::Accumulate => self.accumulate_split,
        }
    }
}
