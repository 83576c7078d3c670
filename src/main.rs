//! pireduce CLI entry point

use anyhow::{Context, Result};
use pireduce::config::cli::Cli;
use pireduce::config::toml::load_config;
use pireduce::config::validator::validate_config;
use pireduce::config::Config;
use pireduce::output::{json, text};
use pireduce::reduce::{for_strategy, ReduceError};
use pireduce::worker::launch;
use std::process;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = load_config(&cli).context("Failed to load configuration")?;
    init_logging(config.output.debug);

    validate_config(&config).context("Configuration validation failed")?;

    println!("pireduce v{}", env!("CARGO_PKG_VERSION"));
    println!();

    run(&config)
}

/// `--debug` lowers the default filter to `debug`; `RUST_LOG` still wins
fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn run(config: &Config) -> Result<()> {
    let reduction = for_strategy(config.strategy, config.accumulate_split);
    log::debug!(
        "strategy={}, split={}, workers={}",
        reduction.name(),
        config.split_policy(),
        config.workers
    );

    let summary = match launch(config.workers, reduction, config.terms) {
        Ok(summary) => summary,
        Err(ReduceError::Usage(err)) => {
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Usage: pireduce <TERMS> [OPTIONS]");
            eprintln!("  TERMS is the number of series terms to evaluate.");
            eprintln!("  The value should be 100M (1e8) or higher for a meaningful runtime.");
            process::exit(2);
        }
        Err(err) => return Err(err).context("Reduction failed"),
    };

    text::print_results(&summary, config);

    if let Some(ref path) = config.output.json_output {
        let report = json::build_report(&summary, chrono::Utc::now());
        json::write_json_output(path, &report, true)
            .context("Failed to write JSON output")?;
    }

    Ok(())
}
