//! Nilakantha series evaluation
//!
//! Pi is approximated as
//!
//! ```text
//! pi = 3 + 4/(2*3*4) - 4/(4*5*6) + 4/(6*7*8) - ...
//! ```
//!
//! This module owns the series state (current `n` and alternation sign) and the
//! partial evaluator that sums a contiguous slice of terms. Evaluation order is
//! fixed: a single running sum, left to right.
//!
//! # Precision
//!
//! All sums use [`Real`], a double-double (~106-bit mantissa). Plain `f64` runs
//! out of precision long before the series stops converging at large term counts.
//!
//! Each term is formed by dividing `4` by the three `f64` factors in turn.
//! `TwoFloat / TwoFloat` division only carries `f64` accuracy, while
//! `TwoFloat / f64` keeps the full double-double result, so the denominator is
//! never built as a `Real`.

use serde::Serialize;
use std::fmt;
use twofloat::TwoFloat;

/// Extended-precision real used for every partial and final value
pub type Real = TwoFloat;

/// Constant term the series starts from, added once at the coordinator
pub const SERIES_SEED: f64 = 3.0;

/// `n` of the first series term
pub const FIRST_TERM_INDEX: u64 = 2;

/// Largest supported term count
///
/// Term indices are carried as `f64` inside the evaluator and must stay exact
/// integers (below 2^53) for `n + 2`.
pub const MAX_TERMS: u64 = 1 << 51;

/// Alternation sign of a series term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    /// Sign of the next term
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        }
    }

    /// Sign after `terms` alternations starting from `Plus`
    pub fn after(terms: u64) -> Self {
        if terms % 2 == 0 {
            Sign::Plus
        } else {
            Sign::Minus
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => f.pad("+1"),
            Sign::Minus => f.pad("-1"),
        }
    }
}

/// Position in the series a partial evaluation begins at
///
/// Advancing one term adds exactly 2 to `term_index` and flips `sign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesState {
    /// `n` of the current term
    pub term_index: u64,
    /// Sign of the current term
    pub sign: Sign,
}

impl SeriesState {
    /// State of the very first term: `n = 2`, positive
    pub fn origin() -> Self {
        Self {
            term_index: FIRST_TERM_INDEX,
            sign: Sign::Plus,
        }
    }

    /// State after `offset` terms have been consumed from the origin
    ///
    /// # Example
    ///
    /// ```
    /// use pireduce::series::{SeriesState, Sign};
    ///
    /// let state = SeriesState::at(3);
    /// assert_eq!(state.term_index, 8);
    /// assert_eq!(state.sign, Sign::Minus);
    /// ```
    pub fn at(offset: u64) -> Self {
        Self {
            term_index: FIRST_TERM_INDEX + 2 * offset,
            sign: Sign::after(offset),
        }
    }

    /// State one term later
    #[inline]
    pub fn advance(self) -> Self {
        Self {
            term_index: self.term_index + 2,
            sign: self.sign.flip(),
        }
    }
}

/// Sum `term_count` consecutive terms starting at `start`
///
/// Pure function of its inputs; workers call it concurrently without any
/// coordination. Returns zero for an empty slice.
pub fn evaluate(start: SeriesState, term_count: u64) -> Real {
    let four = Real::from(4.0);
    let mut sum = Real::from(0.0);
    let mut n = start.term_index as f64;
    let mut sign = start.sign;

    for _ in 0..term_count {
        let term = four / n / (n + 1.0) / (n + 2.0);
        sum = match sign {
            Sign::Plus => sum + term,
            Sign::Minus => sum - term,
        };
        sign = sign.flip();
        n += 2.0;
    }

    sum
}

/// Pi to double-double precision, used to report the approximation error
pub fn reference_pi() -> Real {
    Real::new_add(3.141_592_653_589_793, 1.224_646_799_147_353_2e-16)
}

/// Seed value every final result starts from
pub fn seed() -> Real {
    Real::from(SERIES_SEED)
}

/// Absolute distance between `value` and pi
pub fn absolute_error(value: Real) -> Real {
    (value - reference_pi()).abs()
}
