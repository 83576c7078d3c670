//! Messages exchanged between ranks
//!
//! # Message Flow
//!
//! Exchange strategy:
//!
//! ```text
//! Coordinator (rank 0)             Rank i
//!     |                              |
//!     |-------- CONFIG(N) ---------->|   (or ABORT on bad N)
//!     |                              |
//!     |<------- PARTIAL(sum) --------|
//!     |                              |
//!     |-------- FINAL(pi) ---------->|
//! ```
//!
//! Accumulate strategy:
//!
//! ```text
//! Coordinator (rank 0)             Rank i
//!     |                              |
//!     |--- EXPOSE(N, handle) ------->|   (or ABORT on bad N)
//!     |                              |
//!     |====== fence / merge / fence =|
//! ```

use crate::comm::Rank;
use crate::series::Real;
use crate::window::AccumulatorHandle;
use std::fmt;

/// Phase a message belongs to
///
/// A receiver names the tag it expects; any other tag on that channel is a
/// protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Total term count distribution (exchange) or window exposure (accumulate)
    Config,
    /// Partial sum from a worker to the coordinator
    Partial,
    /// Final value from the coordinator back to a worker
    Final,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Config => f.write_str("CONFIG"),
            Tag::Partial => f.write_str("PARTIAL"),
            Tag::Final => f.write_str("FINAL"),
        }
    }
}

/// A directed message between two ranks
#[derive(Debug)]
pub enum Message {
    /// Validated total term count
    Config { total_terms: u64 },

    /// Validated total term count plus a merge-only handle on the accumulator
    Expose {
        total_terms: u64,
        handle: AccumulatorHandle,
    },

    /// The coordinator rejected the configuration; the run is over
    Abort { reason: String },

    /// One worker's partial sum
    Partial { owner: Rank, value: Real },

    /// Final reduced value
    Final { value: Real },
}

impl Message {
    /// Phase this message belongs to
    pub fn tag(&self) -> Tag {
        match self {
            Message::Config { .. } | Message::Expose { .. } | Message::Abort { .. } => Tag::Config,
            Message::Partial { .. } => Tag::Partial,
            Message::Final { .. } => Tag::Final,
        }
    }

    /// Short name for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Config { .. } => "CONFIG",
            Message::Expose { .. } => "EXPOSE",
            Message::Abort { .. } => "ABORT",
            Message::Partial { .. } => "PARTIAL",
            Message::Final { .. } => "FINAL",
        }
    }
}
