//! pireduce - distributed approximation of pi
//!
//! Evaluates Nilakantha's series across a fixed set of cooperating workers and
//! reduces the partial sums into one extended-precision result at the
//! coordinator (rank 0).
//!
//! # Architecture
//!
//! - **series**: term state and the partial evaluator
//! - **partition**: which contiguous slice of terms each rank owns
//! - **comm**: directed, tagged, per-pair FIFO messaging between ranks
//! - **window**: the coordinator's fence-delimited accumulator cell
//! - **reduce**: the exchange and accumulate reduction strategies
//! - **worker**: launches the worker set and collects the outcome
//! - **config** / **output**: CLI, TOML, validation and reports

pub mod comm;
pub mod config;
pub mod output;
pub mod partition;
pub mod reduce;
pub mod series;
pub mod util;
pub mod window;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use reduce::{ReduceError, Reduction};
pub use series::Real;
pub use worker::{launch, RunSummary};

/// Result type used throughout pireduce
pub type Result<T> = anyhow::Result<T>;
