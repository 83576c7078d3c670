//! Configuration validation
//!
//! Two stages:
//!
//! - [`validate_config`] runs in the launcher before any worker starts and
//!   checks everything except the term count.
//! - [`validate_term_count`] runs once, on the coordinator, before any work is
//!   distributed. Its error is broadcast to every other worker so the whole
//!   set exits together.

use super::*;
use crate::series::MAX_TERMS;
use anyhow::Result;
use thiserror::Error;

/// Upper bound on the worker set; each worker is an OS thread
pub const MAX_WORKERS: usize = 4096;

/// Rejected term count
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UsageError {
    #[error("you must pass a single numeric term count")]
    MissingTerms,

    #[error("term count must be at least 1, got {0}")]
    NonPositive(f64),

    #[error("term count {0} exceeds the supported maximum of 2^51")]
    TooLarge(f64),
}

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workers(config.workers)?;
    validate_output(&config.output)?;
    Ok(())
}

fn validate_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }
    if workers > MAX_WORKERS {
        anyhow::bail!("workers must be at most {}, got {}", MAX_WORKERS, workers);
    }
    Ok(())
}

fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        if path.is_dir() {
            anyhow::bail!("json_output {} is a directory", path.display());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                anyhow::bail!(
                    "json_output directory {} does not exist",
                    parent.display()
                );
            }
        }
    }
    Ok(())
}

/// Validate the raw term count handed to the coordinator
///
/// Real values are accepted (`1e8`) and truncated toward zero.
pub fn validate_term_count(raw: Option<f64>) -> std::result::Result<u64, UsageError> {
    let raw = raw.ok_or(UsageError::MissingTerms)?;

    if raw.is_nan() || raw < 1.0 {
        return Err(UsageError::NonPositive(raw));
    }
    if raw > MAX_TERMS as f64 {
        return Err(UsageError::TooLarge(raw));
    }

    Ok(raw.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_count_accepts_scientific() {
        assert_eq!(validate_term_count(Some(1e8)), Ok(100_000_000));
        assert_eq!(validate_term_count(Some(7.9)), Ok(7));
        assert_eq!(validate_term_count(Some(1.0)), Ok(1));
    }

    #[test]
    fn test_term_count_rejections() {
        assert_eq!(validate_term_count(None), Err(UsageError::MissingTerms));
        assert_eq!(validate_term_count(Some(0.0)), Err(UsageError::NonPositive(0.0)));
        assert_eq!(validate_term_count(Some(-3.0)), Err(UsageError::NonPositive(-3.0)));
        assert_eq!(validate_term_count(Some(0.5)), Err(UsageError::NonPositive(0.5)));
        assert!(matches!(validate_term_count(Some(f64::NAN)), Err(UsageError::NonPositive(_))));
        assert_eq!(
            validate_term_count(Some(f64::INFINITY)),
            Err(UsageError::TooLarge(f64::INFINITY))
        );
    }

    #[test]
    fn test_validate_workers() {
        let mut config = Config::default();
        config.workers = 0;
        assert!(validate_config(&config).is_err());

        config.workers = MAX_WORKERS + 1;
        assert!(validate_config(&config).is_err());

        config.workers = 4;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_json_output_parent() {
        let mut config = Config::default();
        config.workers = 1;
        config.output.json_output = Some(PathBuf::from("/nonexistent-dir/report.json"));
        assert!(validate_config(&config).is_err());

        let dir = tempfile::tempdir().unwrap();
        config.output.json_output = Some(dir.path().join("report.json"));
        assert!(validate_config(&config).is_ok());

        config.output.json_output = Some(dir.path().to_path_buf());
        assert!(validate_config(&config).is_err());
    }
}
