//! One-sided accumulate reduction
//!
//! The coordinator allocates the accumulator window and exposes a merge-only
//! handle to every other rank together with the validated term count. Then all
//! ranks, the coordinator included, run one epoch:
//!
//! ```text
//! fence A -> evaluate own slice -> merge into cell -> fence B
//! ```
//!
//! Only the coordinator reads the cell, and only after fence B. There is no
//! round trip: other ranks finish without learning the final value.
//!
//! The default split policy is [`SplitPolicy::UniformFloor`], which leaves the
//! trailing terms of the series unevaluated; the result then differs from the
//! exchange strategy by exactly those terms' contribution.

use super::{
    abort_peers, assign, compute, unexpected, FinalResult, ReduceError, Reduction, WorkerOutcome,
    WorkerReport,
};
use crate::comm::{Endpoint, Message, Tag, COORDINATOR};
use crate::config::validator::validate_term_count;
use crate::partition::SplitPolicy;
use crate::series::seed;
use crate::window::{AccumulatorCell, AccumulatorHandle};
use std::time::Instant;

/// Fence-delimited accumulate reduction
#[derive(Debug)]
pub struct AccumulateReduction {
    policy: SplitPolicy,
}

impl AccumulateReduction {
    pub fn new(policy: SplitPolicy) -> Self {
        Self { policy }
    }

    fn run_coordinator(&self, endpoint: Endpoint, terms: Option<f64>) -> Result<WorkerOutcome, ReduceError> {
        let started = Instant::now();
        let (mut cell, handles) = AccumulatorCell::expose(endpoint.size());

        let total_terms = match validate_term_count(terms) {
            Ok(n) => n,
            Err(err) => {
                drop(handles);
                cell.free();
                abort_peers(&endpoint, &err);
                return Err(err.into());
            }
        };

        for (peer, handle) in endpoint.peers().zip(handles) {
            endpoint.send(peer, Message::Expose { total_terms, handle })?;
        }

        let assignment = assign(&endpoint, total_terms, self.policy)?;

        let mut epoch = cell.open_epoch();
        let partial = compute(&assignment);
        epoch.merge(partial.value);
        let accumulated = epoch.close();

        let value = seed() + accumulated;
        let result = FinalResult {
            value,
            total_terms,
            elapsed: started.elapsed(),
        };
        log::info!("rank {}: accumulation epoch closed over {} workers", COORDINATOR, endpoint.size());
        cell.free();

        Ok(WorkerOutcome::Coordinator {
            report: WorkerReport {
                assignment,
                partial,
                final_value: Some(value),
            },
            result,
        })
    }

    fn run_follower(&self, endpoint: Endpoint) -> Result<WorkerOutcome, ReduceError> {
        let rank = endpoint.rank();

        let (total_terms, mut handle): (u64, AccumulatorHandle) =
            match endpoint.recv(COORDINATOR, Tag::Config)? {
                Message::Expose {
                    total_terms,
                    handle,
                } => (total_terms, handle),
                Message::Abort { reason } => {
                    log::debug!("rank {}: aborted by coordinator: {}", rank, reason);
                    return Ok(WorkerOutcome::Aborted { rank, reason });
                }
                other => return Err(unexpected(&endpoint, COORDINATOR, &other)),
            };

        let assignment = assign(&endpoint, total_terms, self.policy)?;

        let mut epoch = handle.open_epoch();
        let partial = compute(&assignment);
        epoch.merge(partial.value);
        epoch.close();

        Ok(WorkerOutcome::Follower {
            report: WorkerReport {
                assignment,
                partial,
                final_value: None,
            },
        })
    }
}

impl Reduction for AccumulateReduction {
    fn name(&self) -> &'static str {
        "accumulate"
    }

    fn policy(&self) -> SplitPolicy {
        self.policy
    }

    fn run(&self, endpoint: Endpoint, terms: Option<f64>) -> Result<WorkerOutcome, ReduceError> {
        if endpoint.is_coordinator() {
            self.run_coordinator(endpoint, terms)
        } else {
            self.run_follower(endpoint)
        }
    }
}
