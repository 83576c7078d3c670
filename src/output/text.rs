//! Human-readable text output

use crate::config::Config;
use crate::series::{absolute_error, Real};
use crate::util::time::{calculate_rate, format_count, format_duration, format_rate, millis};
use crate::worker::RunSummary;
use std::fmt;

/// Digits after the decimal point for the reported value
///
/// A double-double carries about 32 significant decimal digits.
const VALUE_DIGITS: usize = 30;

/// Print the run results to the console
///
/// Always shows the worker count, strategy, approximation, error and elapsed
/// time. With `debug` set, the per-worker partition table is included.
pub fn print_results(summary: &RunSummary, config: &Config) {
    print!("{}", ResultsReport::new(summary, config.output.debug));
}

/// Console report for a completed run
pub struct ResultsReport<'a> {
    summary: &'a RunSummary,
    debug: bool,
}

impl<'a> ResultsReport<'a> {
    pub fn new(summary: &'a RunSummary, debug: bool) -> Self {
        Self { summary, debug }
    }

    fn write_partition_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Partition:")?;
        writeln!(
            f,
            "  {:>5}  {:>14}  {:>14}  {:>16}  {:>4}  {:>34}",
            "rank", "first term", "terms", "start n", "sign", "partial"
        )?;

        for report in &self.summary.reports {
            let a = &report.assignment;
            writeln!(
                f,
                "  {:>5}  {:>14}  {:>14}  {:>16}  {:>4}  {:>34}",
                a.owner,
                a.first_term,
                a.term_count,
                a.start.term_index,
                a.start.sign,
                format_real(report.partial.value)
            )?;
        }

        if let Some(tail) = self.summary.uncovered() {
            writeln!(
                f,
                "  not evaluated: terms [{}, {}) ({} terms from n = {})",
                tail.first_term,
                tail.end_term(),
                tail.term_count,
                tail.start.term_index
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ResultsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        let result = &summary.result;
        let error = absolute_error(result.value);

        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        writeln!(f, "                    RESULTS")?;
        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Workers:  {}", summary.workers)?;
        writeln!(f, "Strategy: {} (split: {})", summary.strategy, summary.policy)?;
        writeln!(
            f,
            "Terms:    {} requested, {} evaluated",
            format_count(result.total_terms),
            format_count(summary.evaluated_terms())
        )?;

        if self.debug {
            writeln!(f)?;
            self.write_partition_table(f)?;
        }

        writeln!(f)?;
        writeln!(f, "PI is approx {}", format_real(result.value))?;
        writeln!(f, "Error is     {:.3e}", error.hi() + error.lo())?;
        writeln!(
            f,
            "Runtime:     {:.3} ms ({})",
            millis(result.elapsed),
            format_duration(result.elapsed)
        )?;
        writeln!(
            f,
            "Rate:        {} terms/s",
            format_rate(calculate_rate(summary.evaluated_terms(), result.elapsed))
        )?;
        writeln!(f, "═══════════════════════════════════════════════════════════")
    }
}

/// Fixed-point rendering of an extended-precision value
///
/// Digits are peeled off the full double-double, so everything past the
/// 16th decimal place comes from the low word.
pub fn format_real(value: Real) -> String {
    let mut out = String::with_capacity(VALUE_DIGITS + 24);
    let mut rest = value;
    if rest.hi() < 0.0 {
        out.push('-');
        rest = -rest;
    }

    let whole = floor(rest);
    out.push_str(&format!("{:.0}", whole));
    out.push('.');
    rest = rest - Real::from(whole);

    for _ in 0..VALUE_DIGITS {
        rest = rest * 10.0;
        let digit = floor(rest).clamp(0.0, 9.0);
        out.push(char::from(b'0' + digit as u8));
        rest = rest - Real::from(digit);
    }

    out
}

/// Largest integer not above `value`, as an `f64`
fn floor(value: Real) -> f64 {
    let hi = value.hi().floor();
    if hi == value.hi() && value.lo() < 0.0 {
        hi - 1.0
    } else {
        hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{assignments, SplitPolicy};
    use crate::reduce::{FinalResult, PartialResult, WorkerReport};
    use crate::series::{evaluate, reference_pi, seed};
    use std::time::Duration;

    fn summary(total: u64, workers: usize, policy: SplitPolicy) -> RunSummary {
        let reports: Vec<WorkerReport> = assignments(total, workers, policy)
            .unwrap()
            .into_iter()
            .map(|assignment| WorkerReport {
                assignment,
                partial: PartialResult {
                    owner: assignment.owner,
                    value: evaluate(assignment.start, assignment.term_count),
                },
                final_value: None,
            })
            .collect();
        let value = reports.iter().fold(seed(), |acc, r| acc + r.partial.value);

        RunSummary {
            strategy: "exchange",
            policy,
            workers,
            result: FinalResult {
                value,
                total_terms: total,
                elapsed: Duration::from_millis(12),
            },
            reports,
        }
    }

    #[test]
    fn test_report_contains_value_and_error() {
        let summary = summary(1_000_000, 4, SplitPolicy::RemainderToLast);
        let text = ResultsReport::new(&summary, false).to_string();
        assert!(text.contains("Workers:  4"));
        assert!(text.contains("PI is approx 3.14159265"));
        assert!(text.contains("Error is"));
        assert!(text.contains("12.000 ms"));
        assert!(!text.contains("Partition:"));
    }

    #[test]
    fn test_debug_adds_partition_table() {
        let summary = summary(7, 3, SplitPolicy::RemainderToLast);
        let text = ResultsReport::new(&summary, true).to_string();
        assert!(text.contains("Partition:"));
        assert_eq!(text.lines().filter(|l| l.contains("+1")).count(), 3);
        assert!(!text.contains("not evaluated"));
    }

    #[test]
    fn test_debug_shows_uncovered_tail() {
        let summary = summary(1_000, 4, SplitPolicy::UniformFloor);
        let text = ResultsReport::new(&summary, true).to_string();
        assert!(text.contains("not evaluated: terms [996, 1000)"));
        assert!(text.contains("996 evaluated"));
    }

    #[test]
    fn test_format_real_exact_values() {
        assert_eq!(format_real(seed()), format!("3.{}", "0".repeat(VALUE_DIGITS)));
        assert_eq!(format_real(Real::from(-0.5)), format!("-0.5{}", "0".repeat(VALUE_DIGITS - 1)));
    }

    #[test]
    fn test_format_real_keeps_low_word_digits() {
        // pi = 3.14159265358979323846264338327950...; f64 alone stops near the 16th digit
        let text = format_real(reference_pi());
        assert!(text.starts_with("3.1415926535897932384626433832"), "{}", text);
    }

    #[test]
    fn test_format_real_below_integer_boundary() {
        // 1 - 2^-70 = 0.999999999999999999999152...
        let just_below_one = Real::new_add(1.0, -(2f64.powi(-70)));
        let text = format_real(just_below_one);
        assert!(text.starts_with("0.9999999999999999999991"), "{}", text);
    }
}
