//! The closed error surface for bytepeg (spec §7), a single `thiserror`-
//! derived enum used everywhere in place of ad hoc strings or panics.
//!
//! Grounded on the teacher's `compiler/error.rs` (one variant per failure
//! mode, `Display` describing "when"), upgraded from a hand-written
//! `core::fmt::Display` impl to `thiserror::Error`: the teacher's `core`
//! crate avoids `thiserror` because it is `no_std`-capable, but this crate
//! isn't, so the derive is a clean ergonomic win with no downside.

use thiserror::Error;

/// All errors `bytepeg-core` can return. None are retried internally; the
/// VM never corrupts the pattern it executes on any failure path (spec §7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PegError {
    /// Requested pattern size is at or beyond the implementation maximum
    /// (jump offsets are signed 16-bit and cannot address it).
    #[error("pattern too big: exceeds the maximum addressable by a 16-bit jump offset")]
    PatternTooBig,

    /// `range()` was called with an odd-length byte string.
    #[error("range() requires an even number of bytes (lo, hi pairs)")]
    InvalidRangeLength,

    /// A grammar was built with zero rules.
    #[error("empty grammar: at least one rule is required")]
    EmptyGrammar,

    /// The grammar's start rule name has no matching rule.
    #[error("initial rule `{0}` is not defined in the grammar")]
    UndefinedStartRule(String),

    /// A value supplied as a grammar rule was not a pattern.
    #[error("grammar rule is not a pattern")]
    NonPatternRule,

    /// The verifier found an `OpenCall` whose target is already on the
    /// verification stack.
    #[error("possible left recursion in rule `{0}`")]
    LeftRecursion(String),

    /// The verifier found a repetition body that can match the empty
    /// string.
    #[error("possible infinite loop in rule `{0}`")]
    EmptyLoopBody(String),

    /// The VM or verifier exhausted its fixed-depth frame stack.
    #[error("too many pending calls/choices")]
    StackOverflow,

    /// A `String` capture's format string referenced an inner capture that
    /// does not exist.
    #[error("invalid capture index in string format: {0}")]
    InvalidCaptureIndex(usize),

    /// A `Fold` capture had no initial value.
    #[error("no initial value for fold capture")]
    MissingFoldSeed,

    /// A `Backref` capture's group was not found in the capture list.
    #[error("back reference `{0}` not found")]
    BackrefNotFound(String),

    /// A runtime capture returned a position outside `[current, end]`.
    #[error("runtime capture returned an out-of-range position")]
    BadRuntimePosition,

    /// `cap_a(i)` was called with `i <= 0` or beyond the signed-short
    /// upper bound.
    #[error("argument index {0} out of range")]
    ArgOutOfRange(i64),

    /// The capture vector exceeded its soft cap.
    #[error("too many captures")]
    TooManyCaptures,
}

pub type PegResult<T> = Result<T, PegError>;
