//! Reduction controllers
//!
//! A reduction runs once on every rank of the worker set and combines all
//! partial sums into one [`FinalResult`] at the coordinator. Two strategies
//! implement the [`Reduction`] trait:
//!
//! - [`exchange::ExchangeReduction`]: directed messages, strict ascending-rank
//!   aggregation, final value sent back to every worker
//! - [`accumulate::AccumulateReduction`]: commutative merges into the
//!   coordinator's accumulator cell between two fences, no round trip
//!
//! # Failure model
//!
//! A bad term count is detected once, on the coordinator, and every other rank
//! is told to stop before it waits for work. Communication failures are fatal:
//! there is no retry, no timeout and no partial-result fallback. A rank that
//! never sends what its peers wait for stalls them.

pub mod accumulate;
pub mod exchange;

use crate::comm::{CommError, Endpoint, Message, Rank};
use crate::config::validator::UsageError;
use crate::config::Strategy;
use crate::partition::{partition, PartitionError, SplitPolicy, WorkAssignment};
use crate::series::{evaluate, Real};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use accumulate::AccumulateReduction;
pub use exchange::ExchangeReduction;

/// Reduction failures
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("rank {rank}: unexpected {got} message from rank {peer}")]
    Protocol {
        rank: Rank,
        peer: Rank,
        got: &'static str,
    },

    #[error("rank {peer} sent a partial result labelled as rank {owner}")]
    MisattributedPartial { peer: Rank, owner: Rank },

    #[error("failed to launch rank {rank}: {source}")]
    Spawn {
        rank: Rank,
        #[source]
        source: std::io::Error,
    },

    #[error("rank {rank} panicked")]
    WorkerPanicked { rank: Rank },
}

/// One worker's contribution
#[derive(Debug, Clone, Copy)]
pub struct PartialResult {
    pub owner: Rank,
    pub value: Real,
}

/// The reduced value, produced once per run at the coordinator
#[derive(Debug, Clone, Copy)]
pub struct FinalResult {
    pub value: Real,
    /// Validated term count the run was asked for
    pub total_terms: u64,
    /// Wall-clock time from launch to the end of aggregation
    pub elapsed: Duration,
}

/// What one rank computed
#[derive(Debug, Clone, Copy)]
pub struct WorkerReport {
    pub assignment: WorkAssignment,
    pub partial: PartialResult,
    /// Final value as seen by this rank, when the strategy delivers it
    pub final_value: Option<Real>,
}

/// How a rank's reduction ended
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    /// The coordinator finished the reduction
    Coordinator {
        report: WorkerReport,
        result: FinalResult,
    },
    /// A non-coordinator rank finished its part
    Follower { report: WorkerReport },
    /// The coordinator rejected the configuration before any work started
    Aborted { rank: Rank, reason: String },
}

impl WorkerOutcome {
    pub fn report(&self) -> Option<&WorkerReport> {
        match self {
            WorkerOutcome::Coordinator { report, .. } | WorkerOutcome::Follower { report } => {
                Some(report)
            }
            WorkerOutcome::Aborted { .. } => None,
        }
    }
}

/// A cross-rank reduction discipline
///
/// `run` is called once per rank, each on its own thread, with that rank's
/// endpoint. `terms` is the raw term count from the launch arguments; only the
/// coordinator reads it.
pub trait Reduction: Send + Sync {
    /// Strategy name for logs and reports
    fn name(&self) -> &'static str;

    /// Split policy every rank partitions with
    fn policy(&self) -> SplitPolicy;

    /// Execute this rank's part of the reduction
    fn run(&self, endpoint: Endpoint, terms: Option<f64>) -> Result<WorkerOutcome, ReduceError>;
}

/// Build the reduction for a configured strategy
pub fn for_strategy(strategy: Strategy, accumulate_split: SplitPolicy) -> Arc<dyn Reduction> {
    match strategy {
        Strategy::Exchange => Arc::new(ExchangeReduction::new()),
        Strategy::Accumulate => Arc::new(AccumulateReduction::new(accumulate_split)),
    }
}

/// Partition and log this rank's slice
fn assign(
    endpoint: &Endpoint,
    total_terms: u64,
    policy: SplitPolicy,
) -> Result<WorkAssignment, PartitionError> {
    let assignment = partition(total_terms, endpoint.size(), endpoint.rank(), policy)?;
    log::debug!(
        "rank {}: first_term={}, local_terms={}, start_n={}, start_sign={}",
        assignment.owner,
        assignment.first_term,
        assignment.term_count,
        assignment.start.term_index,
        assignment.start.sign
    );
    Ok(assignment)
}

/// Evaluate an assigned slice
fn compute(assignment: &WorkAssignment) -> PartialResult {
    let value = evaluate(assignment.start, assignment.term_count);
    log::debug!(
        "rank {}: partial result {:.20} ({} terms)",
        assignment.owner,
        value.hi(),
        assignment.term_count
    );
    PartialResult {
        owner: assignment.owner,
        value,
    }
}

/// Tell every other rank the run is over
///
/// Best effort: a peer that is already gone cannot be waiting on us.
fn abort_peers(endpoint: &Endpoint, err: &UsageError) {
    let reason = err.to_string();
    for peer in endpoint.peers() {
        let msg = Message::Abort {
            reason: reason.clone(),
        };
        if let Err(e) = endpoint.send(peer, msg) {
            log::warn!("rank {}: could not notify rank {}: {}", endpoint.rank(), peer, e);
        }
    }
    log::info!("rank {}: configuration rejected, {} workers notified", endpoint.rank(), endpoint.size() - 1);
}

fn unexpected(endpoint: &Endpoint, peer: Rank, msg: &Message) -> ReduceError {
    ReduceError::Protocol {
        rank: endpoint.rank(),
        peer,
        got: msg.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::mesh;
    use crate::series::Sign;

    #[test]
    fn test_assign_uses_endpoint_identity() {
        let endpoints = mesh(3);
        let assignment = assign(&endpoints[2], 7, SplitPolicy::RemainderToLast).unwrap();
        assert_eq!(assignment.owner, 2);
        assert_eq!(assignment.term_count, 3);
        assert_eq!(assignment.start.sign, Sign::Plus);
    }

    #[test]
    fn test_abort_reaches_every_peer() {
        let mut endpoints = mesh(3);
        abort_peers(&endpoints[0], &UsageError::MissingTerms);

        for ep in endpoints.drain(1..) {
            match ep.recv(0, crate::comm::Tag::Config).unwrap() {
                Message::Abort { reason } => assert!(reason.contains("term count")),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_for_strategy_names() {
        assert_eq!(
            for_strategy(Strategy::Exchange, SplitPolicy::UniformFloor).name(),
            "exchange"
        );
        let accumulate = for_strategy(Strategy::Accumulate, SplitPolicy::UniformFloor);
        assert_eq!(accumulate.name(), "accumulate");
        assert_eq!(accumulate.policy(), SplitPolicy::UniformFloor);
    }
}
