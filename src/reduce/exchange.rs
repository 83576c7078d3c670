//! Two-sided exchange reduction
//!
//! Every rank runs the same state machine:
//!
//! ```text
//! INIT -> DISTRIBUTE_CONFIG -> COMPUTE -> EXCHANGE_RESULTS
//!      -> (coordinator only: AGGREGATE -> BROADCAST_FINAL) -> DONE
//! ```
//!
//! The coordinator receives partial sums strictly in ascending rank order, not
//! in completion order. A slow low rank holds up aggregation of every later
//! rank, but the summation order, and therefore the rounding, is identical
//! from run to run.

use super::{
    abort_peers, assign, compute, unexpected, FinalResult, ReduceError, Reduction, WorkerOutcome,
    WorkerReport,
};
use crate::comm::{Endpoint, Message, Tag, COORDINATOR};
use crate::config::validator::validate_term_count;
use crate::partition::SplitPolicy;
use crate::series::{seed, Real};
use std::time::Instant;

/// What the coordinator told a non-coordinator rank to do
enum Directive {
    Run { total_terms: u64 },
    Abort { reason: String },
}

/// Directed-message reduction with a final broadcast back to every worker
#[derive(Debug, Default)]
pub struct ExchangeReduction;

impl ExchangeReduction {
    pub fn new() -> Self {
        Self
    }

    /// DISTRIBUTE_CONFIG on the coordinator
    ///
    /// On a bad term count every other rank gets an ABORT instead of CONFIG.
    fn distribute_config(&self, endpoint: &Endpoint, terms: Option<f64>) -> Result<u64, ReduceError> {
        let total_terms = match validate_term_count(terms) {
            Ok(n) => n,
            Err(err) => {
                abort_peers(endpoint, &err);
                return Err(err.into());
            }
        };

        for peer in endpoint.peers() {
            endpoint.send(peer, Message::Config { total_terms })?;
        }
        Ok(total_terms)
    }

    /// DISTRIBUTE_CONFIG on a non-coordinator
    fn await_config(&self, endpoint: &Endpoint) -> Result<Directive, ReduceError> {
        match endpoint.recv(COORDINATOR, Tag::Config)? {
            Message::Config { total_terms } => Ok(Directive::Run { total_terms }),
            Message::Abort { reason } => Ok(Directive::Abort { reason }),
            other => Err(unexpected(endpoint, COORDINATOR, &other)),
        }
    }

    /// AGGREGATE: own partial first, then ranks 1, 2, ... in order
    fn aggregate(&self, endpoint: &Endpoint, own: Real) -> Result<Real, ReduceError> {
        let mut total = seed() + own;
        for peer in endpoint.peers() {
            match endpoint.recv(peer, Tag::Partial)? {
                Message::Partial { owner, value } if owner == peer => total = total + value,
                Message::Partial { owner, .. } => {
                    return Err(ReduceError::MisattributedPartial { peer, owner })
                }
                other => return Err(unexpected(endpoint, peer, &other)),
            }
        }
        Ok(total)
    }
}

impl Reduction for ExchangeReduction {
    fn name(&self) -> &'static str {
        "exchange"
    }

    fn policy(&self) -> SplitPolicy {
        SplitPolicy::RemainderToLast
    }

    fn run(&self, endpoint: Endpoint, terms: Option<f64>) -> Result<WorkerOutcome, ReduceError> {
        let started = Instant::now();
        let rank = endpoint.rank();

        let total_terms = if endpoint.is_coordinator() {
            self.distribute_config(&endpoint, terms)?
        } else {
            match self.await_config(&endpoint)? {
                Directive::Run { total_terms } => total_terms,
                Directive::Abort { reason } => {
                    log::debug!("rank {}: aborted by coordinator: {}", rank, reason);
                    return Ok(WorkerOutcome::Aborted { rank, reason });
                }
            }
        };

        // COMPUTE
        let assignment = assign(&endpoint, total_terms, self.policy())?;
        let partial = compute(&assignment);

        // EXCHANGE_RESULTS
        if !endpoint.is_coordinator() {
            endpoint.send(
                COORDINATOR,
                Message::Partial {
                    owner: rank,
                    value: partial.value,
                },
            )?;

            let final_value = match endpoint.recv(COORDINATOR, Tag::Final)? {
                Message::Final { value } => value,
                other => return Err(unexpected(&endpoint, COORDINATOR, &other)),
            };
            log::debug!("rank {}: received final value {:.17}", rank, final_value.hi());

            return Ok(WorkerOutcome::Follower {
                report: WorkerReport {
                    assignment,
                    partial,
                    final_value: Some(final_value),
                },
            });
        }

        let value = self.aggregate(&endpoint, partial.value)?;
        let result = FinalResult {
            value,
            total_terms,
            elapsed: started.elapsed(),
        };
        log::info!("rank {}: aggregated {} partial results", rank, endpoint.size());

        // BROADCAST_FINAL
        for peer in endpoint.peers() {
            endpoint.send(peer, Message::Final { value })?;
        }
        log::debug!("rank {}: sent final value to all workers", rank);

        Ok(WorkerOutcome::Coordinator {
            report: WorkerReport {
                assignment,
                partial,
                final_value: Some(value),
            },
            result,
        })
    }
}
