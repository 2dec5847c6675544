//! The fixed-shape `Instruction` record (spec §3) and the handful of
//! free functions that compute and patch the signed 16-bit relative jump
//! offsets it carries.
//!
//! Unlike the C original this crate is grounded on
//! (`examples/original_source/cpeg.c`'s `Instruction` struct, and the real
//! LPeg encoding it's adapted from) instructions are not flat-packed into a
//! byte array with charsets occupying a following raw slot: each
//! `Instruction` is one entry of a `Vec<Instruction>`, and a charset payload
//! lives inline in the `Set`/`Span` variant. This preserves the data model
//! spec §3 describes (opcode + small aux data + relative offset, with
//! charset-bearing opcodes carrying their charset) while dropping the
//! C-specific physical slot-packing, which is an implementation detail the
//! spec's own design notes (§9) call out for replacement with idiomatic
//! sum types. Jump offsets remain genuinely `i16`-checked so
//! [`crate::error::PegError::PatternTooBig`] still fires exactly when the
//! spec says it should: when a program grows too large for a 16-bit
//! relative offset to address.

use serde::{Deserialize, Serialize};

use crate::charset::Charset;
use crate::env::EnvIdx;
use crate::error::{PegError, PegResult};
use crate::opcode::{CapKind, Opcode};

/// The largest byte length a `FullCapture`'s `off` field can encode (a
/// 4-bit field in the original bit layout), per `SPEC_FULL.md` §3.
pub const MAX_OFF: usize = 15;

/// One instruction slot.
///
/// `Any`, `Char` and `Set` are the three "check" instructions (spec §3's
/// `is_check` property): each carries an optional forward-fail target used
/// by the `check2test` peephole rewrite (spec §4.2's union/negation/
/// difference optimizations convert a hard failure into a jump past a
/// known-safe continuation instead of unwinding to the backtrack stack).
/// `None` means "on failure, enter the normal fail path"; `Some(offset)`
/// means "on failure, jump there instead" (spec §4.5: "if the opcode
/// carries a non-zero forward offset, jump there; else enter the fail
/// path").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Match `n` (1..=255) arbitrary bytes.
    Any(u8, Option<i16>),
    /// Match a single literal byte.
    Char(u8, Option<i16>),
    /// Match a single byte drawn from `cs` (conditional, can fail).
    Set(Charset, Option<i16>),
    /// Greedily match zero or more bytes drawn from `cs` (never fails).
    Span(Charset),
    /// Return to the caller (pop a return frame).
    Ret,
    /// Stop, reporting the final input position.
    End,
    /// Push a backtrack frame targeting the relative offset, then fall
    /// through.
    Choice(i16),
    /// Unconditional relative jump.
    Jmp(i16),
    /// Push a return frame, then jump.
    Call(i16),
    /// Unresolved grammar reference; always resolved to `Call`/`Jmp` before
    /// execution (spec §3 invariant).
    OpenCall(EnvIdx),
    /// Pop a backtrack frame, then jump.
    Commit(i16),
    /// Overwrite the top backtrack frame's position/capture-top, then jump.
    PartialCommit(i16),
    /// Pop a backtrack frame but restore `s` from it, then jump.
    BackCommit(i16),
    /// Pop a backtrack frame and enter the fail path.
    FailTwice,
    /// Enter the fail path directly.
    Fail,
    /// Sentinel frame pushed at VM start-up; reaching it is global failure.
    Giveup,
    /// A self-contained open+close capture of statically bounded length
    /// `off` (0..=[`MAX_OFF`]), ending at the current position.
    FullCapture(CapKind, u8, EnvIdx),
    /// A self-contained, definitionally zero-width capture (spec's
    /// `EmptyCapture`/`EmptyCaptureIdx` opcodes, consolidated into one — see
    /// `DESIGN.md`).
    EmptyCapture(CapKind, EnvIdx),
    /// Open a capture subtree; matched by a later `CloseCapture` at the
    /// same nesting depth.
    OpenCapture(CapKind, EnvIdx),
    /// Close the innermost open capture subtree.
    CloseCapture,
    /// Close a `Runtime` capture, invoking its callback.
    CloseRunTime,
    /// Extension point: invoke a registered callable with this opcode's
    /// 8-bit payload; not used by any construction operation in this crate
    /// today, kept for the closed opcode set's completeness (spec §3).
    Func(EnvIdx, u8),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        use Instruction::*;
        match self {
            Any(..) => Opcode::Any,
            Char(..) => Opcode::Char,
            Set(..) => Opcode::Set,
            Span(_) => Opcode::Span,
            Ret => Opcode::Ret,
            End => Opcode::End,
            Choice(_) => Opcode::Choice,
            Jmp(_) => Opcode::Jmp,
            Call(_) => Opcode::Call,
            OpenCall(_) => Opcode::OpenCall,
            Commit(_) => Opcode::Commit,
            PartialCommit(_) => Opcode::PartialCommit,
            BackCommit(_) => Opcode::BackCommit,
            FailTwice => Opcode::FailTwice,
            Fail => Opcode::Fail,
            Giveup => Opcode::Giveup,
            FullCapture(..) => Opcode::FullCapture,
            EmptyCapture(..) => Opcode::EmptyCapture,
            OpenCapture(..) => Opcode::OpenCapture,
            CloseCapture => Opcode::CloseCapture,
            CloseRunTime => Opcode::CloseRunTime,
            Func(..) => Opcode::Func,
        }
    }

    /// The relative jump offset this instruction carries, if any.
    pub fn offset(&self) -> Option<i16> {
        use Instruction::*;
        match *self {
            Choice(o) | Jmp(o) | Call(o) | Commit(o) | PartialCommit(o) | BackCommit(o) => {
                Some(o)
            }
            _ => None,
        }
    }

    /// Rewrite this instruction's jump offset in place. Panics if this
    /// instruction does not carry an offset (a programmer error in the
    /// compiler, never reachable from public APIs).
    pub fn set_offset(&mut self, new_offset: i16) {
        use Instruction::*;
        match self {
            Choice(o) | Jmp(o) | Call(o) | Commit(o) | PartialCommit(o) | BackCommit(o) => {
                *o = new_offset
            }
            other => panic!("instruction {other:?} does not carry a jump offset"),
        }
    }

    /// The forward-fail-jump target of a check instruction (`Any`/`Char`/
    /// `Set`), if it has been converted from a hard fail into a "test" by
    /// `check2test`. Non-check instructions always return `None`.
    pub fn test_target(&self) -> Option<i16> {
        use Instruction::*;
        match *self {
            Any(_, t) | Char(_, t) | Set(_, t) => t,
            _ => None,
        }
    }

    /// Rewrite a check instruction's forward-fail-jump target. Panics on
    /// any other instruction.
    pub fn set_test_target(&mut self, target: Option<i16>) {
        use Instruction::*;
        match self {
            Any(_, t) | Char(_, t) | Set(_, t) => *t = target,
            other => panic!("instruction {other:?} is not a check instruction"),
        }
    }

    /// True if this is a check instruction (`Any`/`Char`/`Set`) that has
    /// not been converted into a forward-jumping "test" — i.e. on failure
    /// it unwinds to the backtrack stack the ordinary way. This is the
    /// precondition for the head-fail optimizations in spec §4.2.
    pub fn is_hard_check(&self) -> bool {
        self.opcode().is_check() && self.test_target().is_none()
    }

    /// True if executing this instruction can never fail.
    pub fn is_nofail(&self) -> bool {
        self.opcode().is_nofail()
    }
}

/// Compute the relative offset from just after instruction `from` to
/// instruction `to`, checked to fit in `i16` (spec's `PatternTooBig`).
pub fn rel_offset(from: usize, to: usize) -> PegResult<i16> {
    let delta = to as i64 - (from as i64 + 1);
    i16::try_from(delta).map_err(|_| PegError::PatternTooBig)
}

/// Apply a relative offset to get an absolute instruction index.
pub fn apply_offset(from: usize, offset: i16) -> usize {
    (from as i64 + 1 + offset as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_round_trips() {
        let off = rel_offset(3, 10).unwrap();
        assert_eq!(apply_offset(3, off), 10);
    }

    #[test]
    fn backward_offset_round_trips() {
        let off = rel_offset(10, 2).unwrap();
        assert_eq!(apply_offset(10, off), 2);
    }

    #[test]
    fn oversized_offset_is_pattern_too_big() {
        let far = i16::MAX as usize + 100;
        assert_eq!(rel_offset(0, far), Err(PegError::PatternTooBig));
    }
}
