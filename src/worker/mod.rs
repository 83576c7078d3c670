//! Worker set launcher
//!
//! Stands in for the external process launcher: builds the message mesh for a
//! fixed number of ranks, starts one named thread per rank, hands the raw term
//! count to the coordinator only, and joins every thread.
//!
//! # Lifecycle
//!
//! 1. **Mesh**: `comm::mesh(P)` creates every rank's endpoint up front
//! 2. **Spawn**: rank `i` runs `Reduction::run` on thread `rank-i`
//! 3. **Join**: all threads are joined, even when one of them failed
//! 4. **Collect**: the coordinator's result plus every rank's report
//!
//! Each rank is single-threaded and shares nothing with the others beyond its
//! endpoint and, for the accumulate strategy, the accumulator window.

use crate::comm::{mesh, Rank, COORDINATOR};
use crate::partition::{uncovered_tail, PartitionError, SplitPolicy, WorkAssignment};
use crate::reduce::{FinalResult, ReduceError, Reduction, WorkerOutcome, WorkerReport};
use std::sync::Arc;
use std::thread;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Strategy that produced the result
    pub strategy: &'static str,
    /// Split policy every rank partitioned with
    pub policy: SplitPolicy,
    /// Number of ranks in the worker set
    pub workers: usize,
    /// The coordinator's final result
    pub result: FinalResult,
    /// Per-rank reports, in rank order
    pub reports: Vec<WorkerReport>,
}

impl RunSummary {
    /// Total number of terms evaluated across all ranks
    pub fn evaluated_terms(&self) -> u64 {
        self.reports.iter().map(|r| r.assignment.term_count).sum()
    }

    /// Trailing terms no rank evaluated, if the split policy left any
    pub fn uncovered(&self) -> Option<WorkAssignment> {
        uncovered_tail(self.result.total_terms, self.workers, self.policy)
            .ok()
            .flatten()
    }
}

/// Run `reduction` on a worker set of `workers` ranks
///
/// `terms` is delivered to the coordinator only. On a rejected term count the
/// coordinator's usage error is returned after every rank has exited. An
/// empty worker set is rejected before anything is spawned.
pub fn launch(
    workers: usize,
    reduction: Arc<dyn Reduction>,
    terms: Option<f64>,
) -> Result<RunSummary, ReduceError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers.into());
    }
    log::info!("launching {} workers ({} strategy)", workers, reduction.name());

    let mut handles = Vec::with_capacity(workers);
    let mut spawn_error = None;

    for endpoint in mesh(workers) {
        let rank = endpoint.rank();
        let reduction = Arc::clone(&reduction);
        let rank_terms = if rank == COORDINATOR { terms } else { None };

        let spawned = thread::Builder::new()
            .name(format!("rank-{}", rank))
            .spawn(move || reduction.run(endpoint, rank_terms));

        match spawned {
            Ok(handle) => handles.push((rank, handle)),
            Err(source) => {
                // Endpoints of unspawned ranks drop here; their peers fail with
                // Disconnected instead of waiting.
                spawn_error = Some(ReduceError::Spawn { rank, source });
                break;
            }
        }
    }

    let mut outcomes: Vec<(Rank, Result<WorkerOutcome, ReduceError>)> = handles
        .into_iter()
        .map(|(rank, handle)| {
            let outcome = handle
                .join()
                .unwrap_or(Err(ReduceError::WorkerPanicked { rank }));
            (rank, outcome)
        })
        .collect();

    if let Some(err) = spawn_error {
        return Err(err);
    }

    collect(reduction.as_ref(), workers, &mut outcomes)
}

/// Fold per-rank outcomes into a summary
///
/// The coordinator's error wins over any other rank's, since peers usually
/// fail as a consequence of it.
fn collect(
    reduction: &dyn Reduction,
    workers: usize,
    outcomes: &mut Vec<(Rank, Result<WorkerOutcome, ReduceError>)>,
) -> Result<RunSummary, ReduceError> {
    outcomes.sort_by_key(|(rank, _)| *rank);

    let mut result = None;
    let mut reports = Vec::with_capacity(workers);
    let mut first_error = None;

    for (rank, outcome) in outcomes.drain(..) {
        match outcome {
            Ok(WorkerOutcome::Coordinator { report, result: r }) => {
                result = Some(r);
                reports.push(report);
            }
            Ok(WorkerOutcome::Follower { report }) => reports.push(report),
            Ok(WorkerOutcome::Aborted { rank, reason }) => {
                log::debug!("rank {} exited early: {}", rank, reason);
            }
            Err(err) => {
                log::error!("rank {} failed: {}", rank, err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    match result {
        Some(result) => Ok(RunSummary {
            strategy: reduction.name(),
            policy: reduction.policy(),
            workers,
            result,
            reports,
        }),
        None => Err(ReduceError::WorkerPanicked { rank: COORDINATOR }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validator::UsageError;
    use crate::partition::SplitPolicy;
    use crate::reduce::{AccumulateReduction, ExchangeReduction};
    use crate::series::{absolute_error, Real, Sign};

    fn approx(value: Real) -> f64 {
        value.hi() + value.lo()
    }

    fn exchange() -> Arc<dyn Reduction> {
        Arc::new(ExchangeReduction::new())
    }

    #[test]
    fn test_million_terms_four_workers() {
        let summary = launch(4, exchange(), Some(1_000_000.0)).unwrap();

        assert_eq!(summary.workers, 4);
        assert_eq!(summary.strategy, "exchange");
        let counts: Vec<u64> = summary.reports.iter().map(|r| r.assignment.term_count).collect();
        assert_eq!(counts, vec![250_000; 4]);
        assert_eq!(summary.evaluated_terms(), 1_000_000);
        assert!(summary.uncovered().is_none());

        let value = approx(summary.result.value);
        assert!((value - 3.141_592_653).abs() < 1e-6);
        assert!(approx(absolute_error(summary.result.value)) < 1e-6);
    }

    #[test]
    fn test_reports_in_rank_order() {
        let summary = launch(3, exchange(), Some(7.0)).unwrap();
        let owners: Vec<Rank> = summary.reports.iter().map(|r| r.partial.owner).collect();
        assert_eq!(owners, vec![0, 1, 2]);

        let signs: Vec<Sign> = summary.reports.iter().map(|r| r.assignment.start.sign).collect();
        assert_eq!(signs, vec![Sign::Plus, Sign::Plus, Sign::Plus]);
    }

    #[test]
    fn test_error_decreases_with_terms() {
        let errors: Vec<f64> = [100.0, 10_000.0, 1_000_000.0]
            .iter()
            .map(|&n| {
                let summary = launch(4, exchange(), Some(n)).unwrap();
                approx(absolute_error(summary.result.value))
            })
            .collect();

        assert!(errors[0] > errors[1], "{:?}", errors);
        assert!(errors[1] > errors[2], "{:?}", errors);
    }

    #[test]
    fn test_usage_error_surfaces_after_join() {
        let err = launch(4, exchange(), None).unwrap_err();
        assert!(matches!(err, ReduceError::Usage(UsageError::MissingTerms)));

        let accumulate: Arc<dyn Reduction> = Arc::new(AccumulateReduction::new(SplitPolicy::UniformFloor));
        let err = launch(4, accumulate, Some(-2.0)).unwrap_err();
        assert!(matches!(err, ReduceError::Usage(UsageError::NonPositive(_))));
    }

    #[test]
    fn test_accumulate_drops_tail_by_default() {
        let accumulate: Arc<dyn Reduction> = Arc::new(AccumulateReduction::new(SplitPolicy::UniformFloor));
        let summary = launch(4, accumulate, Some(1_000.0)).unwrap();
        assert_eq!(summary.evaluated_terms(), 4 * 249);
        assert_eq!(summary.result.total_terms, 1_000);
        let tail = summary.uncovered().unwrap();
        assert_eq!((tail.first_term, tail.term_count), (996, 4));
        assert!(summary.reports[1..].iter().all(|r| r.final_value.is_none()));
    }

    #[test]
    fn test_empty_worker_set_rejected() {
        let err = launch(0, exchange(), Some(1_000.0)).unwrap_err();
        assert!(matches!(err, ReduceError::Partition(PartitionError::NoWorkers)));
    }

    #[test]
    fn test_more_workers_than_terms() {
        let summary = launch(8, exchange(), Some(3.0)).unwrap();
        assert_eq!(summary.evaluated_terms(), 3);
        assert_eq!(summary.reports[7].assignment.term_count, 3);
    }
}
