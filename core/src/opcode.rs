//! The closed opcode set (spec §3 "Opcode set") and its property table.
//!
//! Grounded on the teacher's `vm::Instruction` (`vm/instruction_set.rs`),
//! which uses a `#[repr(C, u8)]` enum with inline payloads instead of a
//! separate tag byte; we follow the same "payload lives on the variant"
//! idiom in [`crate::instruction::Instruction`] and keep `Opcode` as the
//! bare discriminant for the property queries the verifier and peephole
//! passes need without having to destructure a full instruction.

use serde::{Deserialize, Serialize};

/// The opcode discriminant, independent of any instruction's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Matching
    Any,
    Char,
    Set,
    Span,
    // Control
    Ret,
    End,
    Choice,
    Jmp,
    Call,
    OpenCall,
    Commit,
    PartialCommit,
    BackCommit,
    FailTwice,
    Fail,
    Giveup,
    // Capture
    FullCapture,
    EmptyCapture,
    OpenCapture,
    CloseCapture,
    CloseRunTime,
    // Extension
    Func,
}

/// The closed set of opcode properties named in spec §3.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpcodeProps {
    /// Unconditionally transfers control (possibly after consuming input).
    pub is_jump: bool,
    /// Performs a pass/fail test against the input.
    pub is_check: bool,
    /// Can never fail once entered (e.g. `Span`, `End`, capture opcodes).
    pub is_nofail: bool,
    /// Appends to the capture list.
    pub is_capture: bool,
    /// May be reordered with an adjacent, non-dependent instruction without
    /// changing semantics (used by peephole scheduling).
    pub is_movable: bool,
    /// Its payload index refers to the environment and must be fixed up
    /// when environments are concatenated (spec §4.2).
    pub is_env_offset: bool,
    /// Is immediately followed by a charset payload.
    pub has_charset: bool,
}

impl Opcode {
    /// The property set for this opcode, per spec §3's closed property
    /// list.
    pub const fn props(self) -> OpcodeProps {
        use Opcode::*;
        match self {
            Any | Char => OpcodeProps {
                is_check: true,
                is_movable: true,
                ..EMPTY
            },
            Set => OpcodeProps {
                is_check: true,
                is_movable: true,
                has_charset: true,
                ..EMPTY
            },
            Span => OpcodeProps {
                is_nofail: true,
                has_charset: true,
                ..EMPTY
            },
            Ret | End | Giveup => OpcodeProps {
                is_nofail: true,
                ..EMPTY
            },
            Choice => OpcodeProps {
                is_jump: true,
                ..EMPTY
            },
            Jmp | Call | Commit | PartialCommit | BackCommit => OpcodeProps {
                is_jump: true,
                is_nofail: true,
                ..EMPTY
            },
            OpenCall => OpcodeProps {
                is_jump: true,
                is_env_offset: true,
                ..EMPTY
            },
            FailTwice | Fail => EMPTY,
            FullCapture | EmptyCapture | OpenCapture => OpcodeProps {
                is_nofail: true,
                is_capture: true,
                is_movable: true,
                is_env_offset: true,
                ..EMPTY
            },
            CloseCapture | CloseRunTime => OpcodeProps {
                is_nofail: false,
                is_capture: true,
                ..EMPTY
            },
            Func => OpcodeProps {
                is_env_offset: true,
                ..EMPTY
            },
        }
    }

    pub const fn is_jump(self) -> bool {
        self.props().is_jump
    }
    pub const fn is_check(self) -> bool {
        self.props().is_check
    }
    pub const fn is_nofail(self) -> bool {
        self.props().is_nofail
    }
    pub const fn is_capture(self) -> bool {
        self.props().is_capture
    }
    pub const fn is_movable(self) -> bool {
        self.props().is_movable
    }
    pub const fn is_env_offset(self) -> bool {
        self.props().is_env_offset
    }
    pub const fn has_charset(self) -> bool {
        self.props().has_charset
    }
}

const EMPTY: OpcodeProps = OpcodeProps {
    is_jump: false,
    is_check: false,
    is_nofail: false,
    is_capture: false,
    is_movable: false,
    is_env_offset: false,
    has_charset: false,
};

/// Capture kind, the discriminator the capture engine (spec §4.7) uses to
/// decide how a captured range of input becomes a user-visible value.
///
/// `Close` is not a user-facing kind; it tags the bookkeeping record
/// produced by the `CloseCapture` instruction so the engine can find where
/// an `Open` record's subtree ends (spec §4.7, "otherwise `OpenCapture`
/// starts a subtree whose close is the matching `CloseCapture`").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapKind {
    Simple,
    Position,
    Constant,
    Argument,
    Backref,
    Group,
    Table,
    Function,
    Query,
    Subst,
    String,
    Fold,
    Runtime,
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_nofail_and_has_charset() {
        let p = Opcode::Span.props();
        assert!(p.is_nofail);
        assert!(p.has_charset);
        assert!(!p.is_check);
    }

    #[test]
    fn char_is_a_movable_check() {
        let p = Opcode::Char.props();
        assert!(p.is_check);
        assert!(p.is_movable);
        assert!(!p.is_nofail);
    }

    #[test]
    fn open_call_carries_env_offset() {
        assert!(Opcode::OpenCall.is_env_offset());
        assert!(Opcode::OpenCall.is_jump());
    }
}
