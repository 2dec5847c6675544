//! Per-pattern environment: an immutable, 1-based-indexed table of auxiliary
//! values referenced from instructions (spec §3 "Environment").
//!
//! Index `0` always means "no value" — this is the single explicit sentinel
//! called for by the open question in `spec.md` §9 ("whether `env2val(0)`
//! must return 'no value' without setting an error"); it is represented here
//! as `None` on `EnvIdx`, never as an error.

use core::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PegError, PegResult};

/// 1-based index into a [`Environment`]. `None` encodes env slot `0`, i.e.
/// "no value".
pub type EnvIdx = Option<core::num::NonZeroU32>;

/// Build an [`EnvIdx`] from a 1-based position.
pub(crate) fn idx_from_pos(pos: u32) -> EnvIdx {
    core::num::NonZeroU32::new(pos)
}

/// Convert an [`EnvIdx`] back to a 0-based `usize` array offset, if any.
pub(crate) fn idx_to_offset(idx: EnvIdx) -> Option<usize> {
    idx.map(|n| (n.get() - 1) as usize)
}

/// A callable captured by `cap_f`/`cap_fold`/`cap_rt`.
///
/// Pre-classified at construction time (spec §9: "replace 'callable or not'
/// runtime type tests with a closed variant pre-classified by the capture
/// constructor"). `Send + Sync` so that `Pattern`, which may embed one of
/// these in its environment, stays `Send + Sync` itself (spec §5).
pub type BoxedFn = Arc<dyn Fn(&[CapturedValue]) -> PegResult<CapturedValue> + Send + Sync>;

/// A fold callable: `f(acc, v) -> acc'`.
pub type BoxedFold =
    Arc<dyn Fn(CapturedValue, &CapturedValue) -> PegResult<CapturedValue> + Send + Sync>;

/// A query table/mapping used by `cap_q`.
pub type BoxedMapping = Arc<dyn Fn(&CapturedValue) -> Option<CapturedValue> + Send + Sync>;

/// The runtime-capture callback contract from spec §4.5/§9: given the input
/// slice, the current byte position, and the tuple of inner captured values,
/// it returns one of `None`/`False`/`True`/`int`/`(int, extras...)`.
pub type RuntimeCaptureFn =
    Arc<dyn Fn(&[u8], usize, &[CapturedValue]) -> PegResult<RuntimeCaptureOutcome> + Send + Sync>;

/// Result of invoking a `Runtime` capture's callback, per spec §4.5.
#[derive(Clone)]
pub enum RuntimeCaptureOutcome {
    /// Veto the match at this point.
    Fail,
    /// Accept, consuming no additional input.
    Accept,
    /// Move `s` to `o + res`; `res` must lie in `[s-o, e-o]`.
    Reposition(usize),
    /// Move `s` as above and synthesize extra captures at the new position.
    RepositionWithExtras(usize, Vec<CapturedValue>),
}

/// A value materialized by the capture engine (spec §4.7) and handed back to
/// callers in a [`crate::MatchResult`], or passed as an "extra argument" to
/// `pattern_match`/`cap_a`/callables.
#[derive(Clone, Debug)]
pub enum CapturedValue {
    /// Matched substring, byte position, or substitution/fold result.
    Bytes(Vec<u8>),
    /// A byte position (`cap_p`).
    Position(usize),
    /// A constant value carried in the environment (`cap_c`).
    Const(ConstValue),
    /// A nested group of values (`Table`/`Group` captures).
    Group(Vec<CapturedValue>),
}

impl CapturedValue {
    /// Render as a UTF-8 (lossily) string for use in `String`/`Subst`
    /// captures, which operate on the textual form of inner captures.
    pub fn as_text(&self) -> Vec<u8> {
        match self {
            CapturedValue::Bytes(b) => b.clone(),
            CapturedValue::Position(p) => p.to_string().into_bytes(),
            CapturedValue::Const(c) => c.as_text(),
            CapturedValue::Group(g) => g.first().map(|v| v.as_text()).unwrap_or_default(),
        }
    }
}

/// A literal constant value, classified at construction time rather than
/// via a runtime type test (spec §9).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Bytes(Vec<u8>),
    Int(i64),
    Bool(bool),
}

impl ConstValue {
    fn as_text(&self) -> Vec<u8> {
        match self {
            ConstValue::Bytes(b) => b.clone(),
            ConstValue::Int(i) => i.to_string().into_bytes(),
            ConstValue::Bool(b) => b.to_string().into_bytes(),
        }
    }
}

/// One value addressable from the environment table.
#[derive(Clone)]
pub enum EnvValue {
    /// A rule name, used by `Var`/`OpenCall` before grammar resolution and
    /// by `Backref`/`Group` to carry the group name.
    Label(String),
    /// A literal constant (`cap_c`).
    Const(ConstValue),
    /// A function capture callable (`cap_f`).
    Function(BoxedFn),
    /// A fold callable (`cap_fold`).
    Fold(BoxedFold),
    /// A query mapping (`cap_q`).
    Mapping(BoxedMapping),
    /// A runtime-capture callback (`cap_rt`).
    Runtime(RuntimeCaptureFn),
    /// A `String`-capture format string (spec §4.4 `String(fmt)`).
    Format(Vec<u8>),
    /// The (1-based) extra-argument index for `cap_a`.
    ArgIndex(u32),
}

impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Label(s) => write!(f, "Label({s:?})"),
            EnvValue::Const(c) => write!(f, "Const({c:?})"),
            EnvValue::Function(_) => write!(f, "Function(..)"),
            EnvValue::Fold(_) => write!(f, "Fold(..)"),
            EnvValue::Mapping(_) => write!(f, "Mapping(..)"),
            EnvValue::Runtime(_) => write!(f, "Runtime(..)"),
            EnvValue::Format(fmt_bytes) => write!(f, "Format({:?})", String::from_utf8_lossy(fmt_bytes)),
            EnvValue::ArgIndex(i) => write!(f, "ArgIndex({i})"),
        }
    }
}

/// An ordered, 1-indexed table of [`EnvValue`]s shared copy-on-extend
/// between patterns (spec §5 "Shared resources").
///
/// Combinators that merge two patterns build a *fresh* environment holding
/// both sides' values (see [`Environment::concat`]); the original owners'
/// environments are untouched, which is what preserves the "patterns are
/// immutable after construction" invariant without needing true structural
/// sharing or a cycle-aware GC (spec §9).
#[derive(Clone, Debug, Default)]
pub struct Environment {
    values: Vec<EnvValue>,
}

impl Environment {
    pub fn new() -> Self {
        Environment { values: Vec::new() }
    }

    /// Append `value`, returning its 1-based [`EnvIdx`].
    pub fn push(&mut self, value: EnvValue) -> EnvIdx {
        self.values.push(value);
        idx_from_pos(self.values.len() as u32)
    }

    pub fn get(&self, idx: EnvIdx) -> Option<&EnvValue> {
        idx_to_offset(idx).and_then(|off| self.values.get(off))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a fresh environment holding `self`'s values followed by
    /// `other`'s, returning the length of `self`'s half so the caller can
    /// shift every env-offset-bearing instruction copied from `other` by
    /// that amount (spec §4.2 concatenation).
    pub fn concat(&self, other: &Environment) -> (Environment, u32) {
        let shift = self.values.len() as u32;
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        (Environment { values }, shift)
    }

    /// Shift an [`EnvIdx`] by `shift` slots — used when splicing a copied
    /// instruction stream into a new, larger environment.
    pub fn shift_idx(idx: EnvIdx, shift: u32) -> EnvIdx {
        idx.map(|n| core::num::NonZeroU32::new(n.get() + shift).expect("shift overflow"))
    }
}

/// Resolve a `Label` env value to its string, or error.
pub fn label_str(env: &Environment, idx: EnvIdx) -> PegResult<&str> {
    match env.get(idx) {
        Some(EnvValue::Label(s)) => Ok(s.as_str()),
        _ => Err(PegError::NonPatternRule),
    }
}
