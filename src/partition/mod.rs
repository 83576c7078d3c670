//! Work partitioning
//!
//! Maps `(total_terms, worker_count, rank)` to the contiguous slice of series
//! terms that rank evaluates. Slices are laid out in rank order starting at the
//! series origin, so the start state of a rank depends only on how many terms
//! the lower ranks consumed.
//!
//! # Policies
//!
//! - **RemainderToLast**: every rank gets `floor(N / P)` terms and the last rank
//!   also absorbs the remainder. Covers exactly `N` terms.
//! - **UniformFloor**: every rank gets `floor(N / P) - 1` terms. The trailing
//!   `N - P * (floor(N / P) - 1)` terms are never evaluated; see
//!   [`uncovered_tail`].
//!
//! # Example
//!
//! ```
//! use pireduce::partition::{partition, SplitPolicy};
//! use pireduce::series::Sign;
//!
//! let last = partition(7, 3, 2, SplitPolicy::RemainderToLast).unwrap();
//! assert_eq!(last.first_term, 4);
//! assert_eq!(last.term_count, 3);
//! assert_eq!(last.start.sign, Sign::Plus);
//! ```

use crate::comm::Rank;
use crate::series::SeriesState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How the total term count is split among workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitPolicy {
    /// Even share per rank, last rank absorbs the remainder
    #[default]
    RemainderToLast,
    /// One fewer than the even share per rank, trailing terms dropped
    UniformFloor,
}

impl SplitPolicy {
    /// Number of terms assigned to `rank`
    fn share(self, total_terms: u64, worker_count: usize, rank: Rank) -> u64 {
        let workers = worker_count as u64;
        let base = total_terms / workers;
        match self {
            SplitPolicy::RemainderToLast => {
                if rank == worker_count - 1 {
                    total_terms - base * (workers - 1)
                } else {
                    base
                }
            }
            SplitPolicy::UniformFloor => base.saturating_sub(1),
        }
    }

    /// Terms consumed by ranks `0..rank`
    fn consumed_before(self, total_terms: u64, worker_count: usize, rank: Rank) -> u64 {
        let base = total_terms / worker_count as u64;
        let per_rank = match self {
            SplitPolicy::RemainderToLast => base,
            SplitPolicy::UniformFloor => base.saturating_sub(1),
        };
        per_rank * rank as u64
    }
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitPolicy::RemainderToLast => write!(f, "remainder-to-last"),
            SplitPolicy::UniformFloor => write!(f, "uniform-floor"),
        }
    }
}

/// Errors raised for an invalid partition request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("rank {rank} is outside a worker set of size {worker_count}")]
    RankOutOfRange { rank: Rank, worker_count: usize },
}

/// The contiguous slice of series terms one worker evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkAssignment {
    /// Rank that owns the slice
    pub owner: Rank,
    /// Zero-based offset of the first term in the series
    pub first_term: u64,
    /// Series state at `first_term`
    pub start: SeriesState,
    /// Number of terms in the slice
    pub term_count: u64,
}

impl WorkAssignment {
    /// One past the last term offset of the slice
    pub fn end_term(&self) -> u64 {
        self.first_term + self.term_count
    }
}

/// Compute the slice assigned to `rank`
pub fn partition(
    total_terms: u64,
    worker_count: usize,
    rank: Rank,
    policy: SplitPolicy,
) -> Result<WorkAssignment, PartitionError> {
    if worker_count == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if rank >= worker_count {
        return Err(PartitionError::RankOutOfRange { rank, worker_count });
    }

    let first_term = policy.consumed_before(total_terms, worker_count, rank);

    Ok(WorkAssignment {
        owner: rank,
        first_term,
        start: SeriesState::at(first_term),
        term_count: policy.share(total_terms, worker_count, rank),
    })
}

/// Compute every rank's slice, in rank order
pub fn assignments(
    total_terms: u64,
    worker_count: usize,
    policy: SplitPolicy,
) -> Result<Vec<WorkAssignment>, PartitionError> {
    (0..worker_count)
        .map(|rank| partition(total_terms, worker_count, rank, policy))
        .collect()
}

/// Terms of `[0, total_terms)` that no rank evaluates under `policy`
///
/// Returns `None` when the policy covers every term. Otherwise the missing
/// terms always form a single trailing range.
pub fn uncovered_tail(
    total_terms: u64,
    worker_count: usize,
    policy: SplitPolicy,
) -> Result<Option<WorkAssignment>, PartitionError> {
    let all = assignments(total_terms, worker_count, policy)?;
    let covered = all.last().map(WorkAssignment::end_term).unwrap_or(0);

    if covered >= total_terms {
        return Ok(None);
    }

    Ok(Some(WorkAssignment {
        owner: worker_count - 1,
        first_term: covered,
        start: SeriesState::at(covered),
        term_count: total_terms - covered,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Sign;

    fn counts(total: u64, workers: usize, policy: SplitPolicy) -> Vec<u64> {
        assignments(total, workers, policy)
            .unwrap()
            .iter()
            .map(|a| a.term_count)
            .collect()
    }

    #[test]
    fn test_remainder_to_last_exact_coverage() {
        for workers in 1..=9 {
            for total in [1u64, 2, 5, 7, 10, 99, 100, 1_000, 12_345] {
                let all = assignments(total, workers, SplitPolicy::RemainderToLast).unwrap();
                let mut expected_start = 0;
                for (rank, a) in all.iter().enumerate() {
                    assert_eq!(a.owner, rank);
                    assert_eq!(a.first_term, expected_start, "gap or overlap at rank {}", rank);
                    assert_eq!(a.start, SeriesState::at(a.first_term));
                    expected_start = a.end_term();
                }
                assert_eq!(expected_start, total, "N={} P={}", total, workers);
            }
        }
    }

    #[test]
    fn test_even_split_million_four_workers() {
        assert_eq!(
            counts(1_000_000, 4, SplitPolicy::RemainderToLast),
            vec![250_000, 250_000, 250_000, 250_000]
        );
    }

    #[test]
    fn test_parity_across_uneven_split() {
        let all = assignments(7, 3, SplitPolicy::RemainderToLast).unwrap();
        let counts: Vec<u64> = all.iter().map(|a| a.term_count).collect();
        let signs: Vec<Sign> = all.iter().map(|a| a.start.sign).collect();
        let indices: Vec<u64> = all.iter().map(|a| a.start.term_index).collect();

        assert_eq!(counts, vec![2, 2, 3]);
        assert_eq!(signs, vec![Sign::Plus, Sign::Plus, Sign::Plus]);
        assert_eq!(indices, vec![2, 6, 10]);
    }

    #[test]
    fn test_parity_with_odd_share() {
        let signs: Vec<Sign> = assignments(9, 3, SplitPolicy::RemainderToLast)
            .unwrap()
            .iter()
            .map(|a| a.start.sign)
            .collect();
        assert_eq!(signs, vec![Sign::Plus, Sign::Minus, Sign::Plus]);
    }

    #[test]
    fn test_more_workers_than_terms() {
        assert_eq!(counts(2, 4, SplitPolicy::RemainderToLast), vec![0, 0, 0, 2]);
        assert_eq!(counts(2, 4, SplitPolicy::UniformFloor), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_uniform_floor_drops_tail() {
        let all = assignments(100, 4, SplitPolicy::UniformFloor).unwrap();
        assert!(all.iter().all(|a| a.term_count == 24));
        assert_eq!(all[3].first_term, 72);

        let tail = uncovered_tail(100, 4, SplitPolicy::UniformFloor).unwrap().unwrap();
        assert_eq!(tail.first_term, 96);
        assert_eq!(tail.term_count, 4);
        assert_eq!(tail.start, SeriesState::at(96));
    }

    #[test]
    fn test_uniform_floor_with_remainder() {
        let tail = uncovered_tail(10, 3, SplitPolicy::UniformFloor).unwrap().unwrap();
        assert_eq!(tail.first_term, 6);
        assert_eq!(tail.term_count, 4);
    }

    #[test]
    fn test_no_tail_for_remainder_to_last() {
        assert_eq!(uncovered_tail(10, 3, SplitPolicy::RemainderToLast).unwrap(), None);
    }

    #[test]
    fn test_invalid_requests() {
        assert_eq!(
            partition(10, 0, 0, SplitPolicy::RemainderToLast),
            Err(PartitionError::NoWorkers)
        );
        assert_eq!(
            partition(10, 2, 2, SplitPolicy::UniformFloor),
            Err(PartitionError::RankOutOfRange { rank: 2, worker_count: 2 })
        );
    }

    #[test]
    fn test_policy_deserializes_kebab_case() {
        let policy: SplitPolicy = serde_json::from_str("\"uniform-floor\"").unwrap();
        assert_eq!(policy, SplitPolicy::UniformFloor);
    }
}
