//! Debug dump and serde round-trip for compiled patterns (`SPEC_FULL.md`
//! §2 "Debug surface" / testable property #11).
//!
//! Grounded on the teacher's `compiler/bytecode.rs` `Code::disassemble`
//! (a one-line-per-instruction listing with a numeric address column,
//! reused verbatim in spirit by [`crate::pattern::Pattern`]'s own `Display`
//! impl) plus `postcard` for the binary round-trip, since the teacher's
//! `vm::Code` type is itself `serde`-derived for its own snapshot tests.

use serde::{Deserialize, Serialize};

use crate::error::{PegError, PegResult};
use crate::instruction::Instruction;

/// A serializable snapshot of a pattern's program, independent of the
/// closures a live [`crate::pattern::Pattern`]'s environment may hold
/// (`EnvValue::Function`/`Fold`/`Mapping`/`Runtime` are not `Serialize` and
/// are dropped from the dump, replaced by a placeholder marker).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dump {
    pub code: Vec<Instruction>,
    pub env: Vec<EnvSnapshot>,
}

/// One environment slot, stripped of any non-serializable callable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EnvSnapshot {
    Label(String),
    Const(crate::env::ConstValue),
    Callable,
    Format(Vec<u8>),
    ArgIndex(u32),
}

/// Snapshot `pattern` into a serializable [`Dump`].
pub fn dump(pattern: &crate::pattern::Pattern) -> Dump {
    let env = (1..=pattern.env().len() as u32)
        .map(|pos| {
            let idx = crate::env::idx_from_pos(pos);
            match pattern.env().get(idx) {
                Some(crate::env::EnvValue::Label(s)) => EnvSnapshot::Label(s.clone()),
                Some(crate::env::EnvValue::Const(c)) => EnvSnapshot::Const(c.clone()),
                Some(crate::env::EnvValue::Format(f)) => EnvSnapshot::Format(f.clone()),
                Some(crate::env::EnvValue::ArgIndex(n)) => EnvSnapshot::ArgIndex(*n),
                Some(crate::env::EnvValue::Function(_))
                | Some(crate::env::EnvValue::Fold(_))
                | Some(crate::env::EnvValue::Mapping(_))
                | Some(crate::env::EnvValue::Runtime(_)) => EnvSnapshot::Callable,
                None => EnvSnapshot::Callable,
            }
        })
        .collect();
    Dump {
        code: pattern.code().to_vec(),
        env,
    }
}

/// Serialize a [`Dump`] to its `postcard` binary encoding.
pub fn to_bytes(dump: &Dump) -> PegResult<Vec<u8>> {
    postcard::to_allocvec(dump).map_err(|_| PegError::PatternTooBig)
}

/// Deserialize a [`Dump`] from its `postcard` binary encoding.
pub fn from_bytes(bytes: &[u8]) -> PegResult<Dump> {
    postcard::from_bytes(bytes).map_err(|_| PegError::PatternTooBig)
}

/// A human-readable assembly-style listing, one instruction per line.
pub fn disassemble(pattern: &crate::pattern::Pattern) -> String {
    pattern.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::match_bytes;

    #[test]
    fn dump_round_trips_through_postcard() {
        let p = match_bytes(b"abc");
        let d = dump(&p);
        let bytes = to_bytes(&d).unwrap();
        let back = from_bytes(&bytes).unwrap();
        assert_eq!(d, back);
        assert_eq!(back.code, vec![
            Instruction::Char(b'a', None),
            Instruction::Char(b'b', None),
            Instruction::Char(b'c', None),
            Instruction::End,
        ]);
    }

    #[test]
    fn disassemble_lists_one_instruction_per_line() {
        let p = match_bytes(b"ab");
        let text = disassemble(&p);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn round_tripped_code_reproduces_match_semantics() {
        use crate::combinators::pow;
        use crate::constructors::set;
        use crate::vm::pattern_match;

        let p = pow(&set(b"0123456789"), 1).unwrap();
        let restored_code = from_bytes(&to_bytes(&dump(&p)).unwrap()).unwrap().code;
        let restored = crate::pattern::Pattern::new_raw(restored_code, p.env().clone());

        for input in [&b"123abc"[..], &b""[..], &b"7"[..]] {
            assert_eq!(
                pattern_match(&p, input, &[]).unwrap().end(),
                pattern_match(&restored, input, &[]).unwrap().end()
            );
        }
    }
}
