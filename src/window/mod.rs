//! Shared accumulator window
//!
//! The coordinator exposes a single extended-precision cell to the whole
//! worker set. Access is split by capability:
//!
//! - [`AccumulatorCell`] stays with the coordinator. It is the only way to read
//!   the cell.
//! - [`AccumulatorHandle`] is handed to every other rank. It can only merge
//!   (add) into the cell.
//!
//! Merges happen inside an epoch delimited by two fences across the whole
//! worker set:
//!
//! ```text
//! open_epoch()   -- fence A: nobody merges until every rank has arrived
//! merge(x)       -- any order, any interleaving; addition commutes
//! close()        -- fence B: every merge of the epoch is now visible
//! ```
//!
//! The owner's `close` returns the merged value, so reading before the closing
//! fence cannot be expressed.
//!
//! A rank that never reaches a fence stalls every other rank forever. There is
//! no timeout.

use crate::comm::{Rank, COORDINATOR};
use crate::series::Real;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};

#[derive(Debug)]
struct Shared {
    slot: Mutex<Real>,
    fence: Barrier,
    size: usize,
}

impl Shared {
    fn merge(&self, value: Real) {
        let mut slot = self.slot.lock();
        *slot = *slot + value;
    }
}

/// Coordinator side of the window
#[derive(Debug)]
pub struct AccumulatorCell {
    shared: Arc<Shared>,
}

/// Merge-only capability on the coordinator's cell
#[derive(Debug)]
pub struct AccumulatorHandle {
    shared: Arc<Shared>,
    rank: Rank,
}

impl AccumulatorCell {
    /// Allocate the cell for a worker set of `size` ranks
    ///
    /// Returns the owner side plus one handle for each rank `1..size`, in
    /// rank order.
    pub fn expose(size: usize) -> (Self, Vec<AccumulatorHandle>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Real::from(0.0)),
            fence: Barrier::new(size.max(1)),
            size,
        });

        let handles = (0..size)
            .filter(|&rank| rank != COORDINATOR)
            .map(|rank| AccumulatorHandle {
                shared: Arc::clone(&shared),
                rank,
            })
            .collect();

        (Self { shared }, handles)
    }

    /// Number of ranks the fences wait for
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Reset the cell and wait at the opening fence
    pub fn open_epoch(&mut self) -> OwnerEpoch<'_> {
        *self.shared.slot.lock() = Real::from(0.0);
        self.shared.fence.wait();
        log::debug!("rank {}: accumulation epoch opened", COORDINATOR);
        OwnerEpoch {
            epoch: Epoch {
                shared: self.shared.as_ref(),
                rank: COORDINATOR,
            },
        }
    }

    /// Release the window without running an epoch
    pub fn free(self) {
        log::debug!("rank {}: accumulator window released", COORDINATOR);
    }
}

impl AccumulatorHandle {
    /// Rank this handle was issued to
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Wait at the opening fence
    pub fn open_epoch(&mut self) -> Epoch<'_> {
        self.shared.fence.wait();
        log::debug!("rank {}: accumulation epoch opened", self.rank);
        Epoch {
            shared: self.shared.as_ref(),
            rank: self.rank,
        }
    }
}

/// An open epoch on a non-coordinator rank
#[derive(Debug)]
pub struct Epoch<'a> {
    shared: &'a Shared,
    rank: Rank,
}

impl Epoch<'_> {
    /// Add `value` into the coordinator's cell
    pub fn merge(&mut self, value: Real) {
        self.shared.merge(value);
        log::debug!("rank {}: merged partial into accumulator", self.rank);
    }

    /// Wait at the closing fence
    pub fn close(self) {
        self.shared.fence.wait();
    }
}

/// An open epoch on the coordinator
#[derive(Debug)]
pub struct OwnerEpoch<'a> {
    epoch: Epoch<'a>,
}

impl OwnerEpoch<'_> {
    /// Add the coordinator's own contribution
    pub fn merge(&mut self, value: Real) {
        self.epoch.merge(value);
    }

    /// Wait at the closing fence, then read the cell
    pub fn close(self) -> Real {
        let shared = self.epoch.shared;
        self.epoch.close();
        *shared.slot.lock()
    }
}
