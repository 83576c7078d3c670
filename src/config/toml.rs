//! TOML configuration file parsing
//!
//! ```toml
//! terms = 1e8
//! workers = 8
//! strategy = "accumulate"
//! accumulate_split = "remainder-to-last"
//!
//! [output]
//! debug = true
//! json_output = "run.json"
//! ```

use super::*;
use crate::config::cli::{Cli, SplitType, StrategyType};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(terms) = cli.terms {
        config.terms = Some(terms);
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    if let Some(strategy) = cli.strategy {
        config.strategy = match strategy {
            StrategyType::Exchange => Strategy::Exchange,
            StrategyType::Accumulate => Strategy::Accumulate,
        };
    }
    if let Some(split) = cli.accumulate_split {
        config.accumulate_split = match split {
            SplitType::UniformFloor => SplitPolicy::UniformFloor,
            SplitType::RemainderToLast => SplitPolicy::RemainderToLast,
        };
    }

    if cli.debug {
        config.output.debug = true;
    }
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }

    config
}

/// Build the run configuration: config file (if any) overlaid with CLI values
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    Ok(merge_cli_with_config(cli, base))
}
