//! JSON output formatting
//!
//! One report per run, written by the launcher after every worker has exited.
//! Extended-precision values are emitted as their two `f64` components plus a
//! fixed-point rendering, so no precision is lost in the file.

use crate::output::text::format_real;
use crate::partition::WorkAssignment;
use crate::series::{absolute_error, Real};
use crate::util::time::format_duration;
use crate::worker::RunSummary;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub millis: f64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            millis: d.as_secs_f64() * 1_000.0,
            human: format_duration(d),
        }
    }
}

/// Double-double value split into its components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReal {
    pub hi: f64,
    pub lo: f64,
    pub text: String,
}

impl JsonReal {
    pub fn from_real(value: Real) -> Self {
        Self {
            hi: value.hi(),
            lo: value.lo(),
            text: format_real(value),
        }
    }
}

/// A contiguous range of series terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSlice {
    pub first_term: u64,
    pub term_count: u64,
    pub start_n: u64,
    pub start_sign: i8,
}

impl From<&WorkAssignment> for JsonSlice {
    fn from(a: &WorkAssignment) -> Self {
        Self {
            first_term: a.first_term,
            term_count: a.term_count,
            start_n: a.start.term_index,
            start_sign: a.start.sign.as_i8(),
        }
    }
}

/// Per-worker detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWorker {
    pub rank: usize,
    pub slice: JsonSlice,
    pub partial: JsonReal,
    /// Whether the final value was delivered back to this worker
    pub received_final: bool,
}

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: String,
    pub version: String,
    pub strategy: String,
    pub split_policy: String,
    pub workers: usize,
    pub total_terms: u64,
    pub evaluated_terms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_evaluated: Option<JsonSlice>,
    pub value: JsonReal,
    pub absolute_error: f64,
    pub elapsed: JsonDuration,
    pub per_worker: Vec<JsonWorker>,
}

/// Build the report for a completed run
pub fn build_report(summary: &RunSummary, generated_at: DateTime<Utc>) -> JsonReport {
    let error = absolute_error(summary.result.value);

    JsonReport {
        generated_at: generated_at.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        strategy: summary.strategy.to_string(),
        split_policy: summary.policy.to_string(),
        workers: summary.workers,
        total_terms: summary.result.total_terms,
        evaluated_terms: summary.evaluated_terms(),
        not_evaluated: summary.uncovered().as_ref().map(JsonSlice::from),
        value: JsonReal::from_real(summary.result.value),
        absolute_error: error.hi() + error.lo(),
        elapsed: JsonDuration::from_duration(summary.result.elapsed),
        per_worker: summary
            .reports
            .iter()
            .map(|r| JsonWorker {
                rank: r.assignment.owner,
                slice: JsonSlice::from(&r.assignment),
                partial: JsonReal::from_real(r.partial.value),
                received_final: r.final_value.is_some(),
            })
            .collect(),
    }
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, report)?;
    } else {
        serde_json::to_writer(file, report)?;
    }

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}
