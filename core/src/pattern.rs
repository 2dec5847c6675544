//! The `Pattern` value type (spec §3/§4.1): an instruction vector terminated
//! by exactly one `End`, plus its environment.
//!
//! Grounded on the teacher's `vm::Code` (`vm/runtime.rs`), which likewise
//! bundles a flat instruction vector with a side table (there, a constant
//! pool) and provides an assembly-style `Debug` dump; see
//! [`crate::dump`] for the analogous `Pattern` dump.

use std::fmt;
use std::ops::{BitOr, BitXor, Mul, Not, Sub};

use crate::combinators::{choose, concat, diff, negate, pow};
use crate::env::Environment;
use crate::error::PegResult;
use crate::instruction::{apply_offset, rel_offset, Instruction};

/// An immutable, fully-built pattern: an instruction vector ending in one
/// `End`, plus the environment its instructions index into.
///
/// Patterns are built monotonically by constructors and combinators and
/// never mutated afterward (spec §3 "Lifecycles"). Every public combinator
/// takes patterns by value or by reference and returns a *new* `Pattern`.
#[derive(Clone, Debug)]
pub struct Pattern {
    code: Vec<Instruction>,
    env: Environment,
}

impl Pattern {
    /// Build a pattern from a body (not including the trailing `End`) and
    /// an environment.
    pub(crate) fn from_body(mut body: Vec<Instruction>, env: Environment) -> Self {
        body.push(Instruction::End);
        debug_assert!(
            body.iter().filter(|i| matches!(i, Instruction::End)).count() == 1,
            "pattern body must not already contain an End"
        );
        Pattern { code: body, env }
    }

    /// The `True` pattern: matches the empty string, consumes nothing.
    pub fn truth() -> Self {
        Pattern::from_body(Vec::new(), Environment::new())
    }

    /// The `Fail` pattern: never matches.
    pub fn fail() -> Self {
        Pattern::from_body(vec![Instruction::Fail], Environment::new())
    }

    /// Every instruction except the trailing `End`.
    pub fn body(&self) -> &[Instruction] {
        debug_assert!(matches!(self.code.last(), Some(Instruction::End)));
        &self.code[..self.code.len() - 1]
    }

    /// The full instruction vector, including the trailing `End`.
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Number of instruction slots in the body (excludes `End`).
    pub fn len(&self) -> usize {
        self.body().len()
    }

    pub fn is_empty(&self) -> bool {
        self.body().is_empty()
    }

    /// `True`: the pattern is exactly the empty body.
    pub fn is_true(&self) -> bool {
        self.body().is_empty()
    }

    /// `Fail`: the pattern is a single unconditional `Fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self.body(), [Instruction::Fail])
    }

    /// Join `self`'s body with `other`'s, producing a fresh combined
    /// environment and shifting every env-offset-bearing instruction copied
    /// from `other` by `self`'s environment length (spec §4.2
    /// concatenation). Internal jump offsets in `other`'s copied body are
    /// also rebased to the new absolute positions.
    pub(crate) fn splice_body(&self, other: &Pattern) -> (Vec<Instruction>, Environment) {
        let (env, shift) = self.env.concat(&other.env);
        let base = self.body().len();
        let mut out = self.body().to_vec();
        for (i, instr) in other.body().iter().enumerate() {
            let from_idx = base + i;
            out.push(rebase_instruction(instr, from_idx, base, shift));
        }
        (out, env)
    }

    /// Build a pattern directly from an already-combined body and
    /// environment (used by combinators that hand-assemble code, e.g.
    /// `Choice`/`Commit` envelopes).
    pub(crate) fn new_raw(body: Vec<Instruction>, env: Environment) -> Self {
        Pattern::from_body(body, env)
    }
}

/// Shift env indices and rebase jump offsets when copying `instr`, which
/// used to live at `old_idx` (relative to its own pattern's start), into a
/// new body where it will live at `base + old_idx`.
pub(crate) fn rebase_instruction(instr: &Instruction, new_idx: usize, base: usize, env_shift: u32) -> Instruction {
    use Instruction::*;
    match instr {
        OpenCall(idx) => OpenCall(Environment::shift_idx(*idx, env_shift)),
        FullCapture(k, off, idx) => FullCapture(*k, *off, Environment::shift_idx(*idx, env_shift)),
        EmptyCapture(k, idx) => EmptyCapture(*k, Environment::shift_idx(*idx, env_shift)),
        OpenCapture(k, idx) => OpenCapture(*k, Environment::shift_idx(*idx, env_shift)),
        Func(idx, payload) => Func(Environment::shift_idx(*idx, env_shift), *payload),
        Choice(o) | Jmp(o) | Call(o) | Commit(o) | PartialCommit(o) | BackCommit(o) => {
            let old_idx = new_idx - base;
            let target = apply_offset(old_idx, *o) + base;
            let rebuilt = rel_offset(new_idx, target).expect("rebase keeps offsets in range");
            match instr {
                Choice(_) => Choice(rebuilt),
                Jmp(_) => Jmp(rebuilt),
                Call(_) => Call(rebuilt),
                Commit(_) => Commit(rebuilt),
                PartialCommit(_) => PartialCommit(rebuilt),
                BackCommit(_) => BackCommit(rebuilt),
                _ => unreachable!(),
            }
        }
        Any(..) | Char(..) | Set(..) => rebase_test_instruction(instr, new_idx, base),
        other => other.clone(),
    }
}

/// Rebase the optional forward-fail-jump offset on a check instruction
/// (`Any`/`Char`/`Set`); everything else is returned unchanged.
fn rebase_test_instruction(instr: &Instruction, new_idx: usize, base: usize) -> Instruction {
    use Instruction::*;
    let old_idx = new_idx - base;
    match instr {
        Any(n, Some(o)) => {
            let target = apply_offset(old_idx, *o) + base;
            Any(*n, Some(rel_offset(new_idx, target).expect("rebase keeps offsets in range")))
        }
        Char(b, Some(o)) => {
            let target = apply_offset(old_idx, *o) + base;
            Char(*b, Some(rel_offset(new_idx, target).expect("rebase keeps offsets in range")))
        }
        Set(cs, Some(o)) => {
            let target = apply_offset(old_idx, *o) + base;
            Set(cs.clone(), Some(rel_offset(new_idx, target).expect("rebase keeps offsets in range")))
        }
        other => other.clone(),
    }
}

/// `a * b` is sugar for [`concat`]; infallible (concatenation can never
/// overflow an offset that `a` and `b` didn't already fit within).
impl Mul for &Pattern {
    type Output = Pattern;
    fn mul(self, rhs: Self) -> Pattern {
        concat(self, rhs)
    }
}

/// `a | b` is sugar for [`choose`] (ordered choice).
impl BitOr for &Pattern {
    type Output = PegResult<Pattern>;
    fn bitor(self, rhs: Self) -> PegResult<Pattern> {
        choose(self, rhs)
    }
}

/// `a - b` is sugar for [`diff`].
impl Sub for &Pattern {
    type Output = PegResult<Pattern>;
    fn sub(self, rhs: Self) -> PegResult<Pattern> {
        diff(self, rhs)
    }
}

/// `!a` is sugar for [`negate`].
impl Not for &Pattern {
    type Output = PegResult<Pattern>;
    fn not(self) -> PegResult<Pattern> {
        negate(self)
    }
}

/// `a ^ n` is sugar for [`pow`] (`n >= 0`: at least `n`; `n < 0`: at most
/// `|n|`).
impl BitXor<i32> for &Pattern {
    type Output = PegResult<Pattern>;
    fn bitxor(self, n: i32) -> PegResult<Pattern> {
        pow(self, n)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (addr, instr) in self.code.iter().enumerate() {
            writeln!(f, "{addr:4}  {instr:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_is_empty_body() {
        let p = Pattern::truth();
        assert!(p.is_true());
        assert_eq!(p.code(), &[Instruction::End]);
    }

    #[test]
    fn fail_is_single_instruction() {
        let p = Pattern::fail();
        assert!(p.is_fail());
        assert_eq!(p.code(), &[Instruction::Fail, Instruction::End]);
    }

    #[test]
    fn splice_rebases_jumps_and_shifts_env() {
        use crate::env::EnvValue;
        let mut env_a = Environment::new();
        let idx_a = env_a.push(EnvValue::Label("a".into()));
        let a = Pattern::new_raw(vec![Instruction::OpenCall(idx_a)], env_a);

        let mut env_b = Environment::new();
        let idx_b = env_b.push(EnvValue::Label("b".into()));
        // A tiny self-contained choice/commit envelope in `b`.
        let b_body = vec![
            Instruction::Choice(1),
            Instruction::OpenCall(idx_b),
            Instruction::Commit(0),
        ];
        let b = Pattern::new_raw(b_body, env_b);

        let (spliced, env) = a.splice_body(&b);
        assert_eq!(spliced.len(), 4);
        // The OpenCall copied from `b` must now point at env slot 2 (after
        // `a`'s single env value).
        match &spliced[2] {
            Instruction::OpenCall(idx) => {
                assert_eq!(env.get(*idx).is_some(), true);
            }
            other => panic!("unexpected {other:?}"),
        }
        // Choice at spliced index 1 must still target just past Commit at
        // spliced index 3.
        match &spliced[1] {
            Instruction::Choice(off) => assert_eq!(apply_offset(1, *off), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
