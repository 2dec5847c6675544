//! The backtracking parsing VM (spec §4.5).
//!
//! Grounded on the teacher's `vm::runtime::VM` (`vm/runtime.rs`): a public
//! `run` entry point that sets up state and asserts post-conditions, backed
//! by an internal stepping loop, and the teacher's `vm::Stack<T>`
//! (`vm/stack.rs`) bounded-stack type, generalized here to hold the two
//! tagged frame kinds spec §4.5 describes instead of one payload type.
//!
//! Deviation from the teacher (recorded in `DESIGN.md`): the program counter
//! is a plain `usize` index into a `&[Instruction]` slice, not a raw pointer
//! stepped with `unsafe` arithmetic — this crate has no per-byte hot loop at
//! a scale where that matters.

use smallvec::SmallVec;
use tracing::instrument;

use crate::engine::{self, CaptureEntry};
use crate::env::{CapturedValue, EnvValue, Environment, RuntimeCaptureOutcome};
use crate::error::{PegError, PegResult};
use crate::instruction::{apply_offset, Instruction};
use crate::limits::Limits;
use crate::pattern::Pattern;

/// The outcome of a match call: either no match, or a final position plus
/// the materialized capture values (spec §6).
#[derive(Clone, Debug)]
pub struct MatchResult {
    end: Option<usize>,
    captures: Vec<CapturedValue>,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.end.is_some()
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn captures(&self) -> &[CapturedValue] {
        &self.captures
    }
}

#[derive(Debug)]
enum Frame {
    Return(usize),
    Backtrack { addr: usize, s: usize, captop: usize },
    Giveup,
}

/// The frame stack rarely exceeds a handful of entries for typical grammars,
/// so it's inlined on the stack up to this size before spilling to the heap
/// (teacher's `vm::Stack<T>` makes the same "small, usually shallow" bet with
/// a fixed-capacity array backing).
type FrameStack = SmallVec<[Frame; 64]>;

struct Vm<'p> {
    code: &'p [Instruction],
    env: &'p Environment,
    input: &'p [u8],
    extras: &'p [CapturedValue],
    stack: FrameStack,
    captures: Vec<CaptureEntry>,
    limits: Limits,
}

impl<'p> Vm<'p> {
    fn push_choice(&mut self, addr: usize, s: usize) -> PegResult<()> {
        if self.stack.len() >= self.limits.max_stack_depth {
            return Err(PegError::StackOverflow);
        }
        self.stack.push(Frame::Backtrack {
            addr,
            s,
            captop: self.captures.len(),
        });
        Ok(())
    }

    fn push_return(&mut self, addr: usize) -> PegResult<()> {
        if self.stack.len() >= self.limits.max_stack_depth {
            return Err(PegError::StackOverflow);
        }
        self.stack.push(Frame::Return(addr));
        Ok(())
    }

    /// Pop frames until a backtrack frame is found, returning its saved
    /// state. `None` means the sentinel was reached: the match fails
    /// globally.
    fn unwind(&mut self) -> Option<(usize, usize, usize)> {
        loop {
            match self.stack.pop() {
                Some(Frame::Backtrack { addr, s, captop }) => return Some((addr, s, captop)),
                Some(Frame::Return(_)) => continue,
                Some(Frame::Giveup) | None => return None,
            }
        }
    }

    /// Handle a check instruction's failure: jump to its test target if it
    /// has one, else unwind to the nearest backtrack frame. Returns the next
    /// program counter, or `None` for global failure.
    fn check_fail(&mut self, test: Option<i16>, pc: usize, s: &mut usize) -> Option<usize> {
        if let Some(t) = test {
            return Some(apply_offset(pc, t));
        }
        let (addr, ns, captop) = self.unwind()?;
        *s = ns;
        self.captures.truncate(captop);
        Some(addr)
    }

    fn hard_fail(&mut self, s: &mut usize) -> Option<usize> {
        let (addr, ns, captop) = self.unwind()?;
        *s = ns;
        self.captures.truncate(captop);
        Some(addr)
    }

    fn run(&mut self, start_pc: usize, start_s: usize) -> PegResult<Option<usize>> {
        self.stack.push(Frame::Giveup);
        let mut pc = start_pc;
        let mut s = start_s;

        loop {
            let instr = self.code[pc].clone();
            match instr {
                Instruction::Any(n, test) => {
                    if s + n as usize <= self.input.len() {
                        s += n as usize;
                        pc += 1;
                    } else {
                        match self.check_fail(test, pc, &mut s) {
                            Some(np) => pc = np,
                            None => return Ok(None),
                        }
                    }
                }
                Instruction::Char(b, test) => {
                    if s < self.input.len() && self.input[s] == b {
                        s += 1;
                        pc += 1;
                    } else {
                        match self.check_fail(test, pc, &mut s) {
                            Some(np) => pc = np,
                            None => return Ok(None),
                        }
                    }
                }
                Instruction::Set(cs, test) => {
                    if s < self.input.len() && cs.contains(self.input[s]) {
                        s += 1;
                        pc += 1;
                    } else {
                        match self.check_fail(test, pc, &mut s) {
                            Some(np) => pc = np,
                            None => return Ok(None),
                        }
                    }
                }
                Instruction::Span(cs) => {
                    while s < self.input.len() && cs.contains(self.input[s]) {
                        s += 1;
                    }
                    pc += 1;
                }
                Instruction::Ret => match self.stack.pop() {
                    Some(Frame::Return(addr)) => pc = addr,
                    other => panic!("Ret without a return frame on top: {other:?}"),
                },
                Instruction::End => return Ok(Some(s)),
                Instruction::Choice(off) => {
                    self.push_choice(apply_offset(pc, off), s)?;
                    pc += 1;
                }
                Instruction::Jmp(off) => pc = apply_offset(pc, off),
                Instruction::Call(off) => {
                    self.push_return(pc + 1)?;
                    pc = apply_offset(pc, off);
                }
                Instruction::OpenCall(_) => {
                    panic!("OpenCall reached the VM: pattern was never resolved by grammar()")
                }
                Instruction::Commit(off) => {
                    match self.stack.pop() {
                        Some(Frame::Backtrack { .. }) => {}
                        other => panic!("Commit without a backtrack frame on top: {other:?}"),
                    }
                    pc = apply_offset(pc, off);
                }
                Instruction::PartialCommit(off) => {
                    match self.stack.last_mut() {
                        Some(Frame::Backtrack { addr: _, s: fs, captop }) => {
                            *fs = s;
                            *captop = self.captures.len();
                        }
                        other => panic!("PartialCommit without a backtrack frame: {other:?}"),
                    }
                    pc = apply_offset(pc, off);
                }
                Instruction::BackCommit(off) => {
                    match self.stack.pop() {
                        Some(Frame::Backtrack { s: fs, .. }) => s = fs,
                        other => panic!("BackCommit without a backtrack frame: {other:?}"),
                    }
                    pc = apply_offset(pc, off);
                }
                Instruction::FailTwice => {
                    self.stack.pop();
                    match self.hard_fail(&mut s) {
                        Some(addr) => pc = addr,
                        None => return Ok(None),
                    }
                }
                Instruction::Fail => match self.hard_fail(&mut s) {
                    Some(addr) => pc = addr,
                    None => return Ok(None),
                },
                Instruction::Giveup => return Ok(None),
                Instruction::FullCapture(kind, off, idx) => {
                    let len = off as usize;
                    self.captures.push(CaptureEntry::Full {
                        kind,
                        idx,
                        pos: s - len,
                        len,
                    });
                    pc += 1;
                }
                Instruction::EmptyCapture(kind, idx) => {
                    self.captures.push(CaptureEntry::Full {
                        kind,
                        idx,
                        pos: s,
                        len: 0,
                    });
                    pc += 1;
                }
                Instruction::OpenCapture(kind, idx) => {
                    self.captures.push(CaptureEntry::Open { kind, idx, pos: s });
                    pc += 1;
                }
                Instruction::CloseCapture => {
                    self.captures.push(CaptureEntry::Close { pos: s });
                    pc += 1;
                }
                Instruction::CloseRunTime => match self.close_runtime(&mut s)? {
                    RuntimeStep::Fallthrough => pc += 1,
                    RuntimeStep::Jump(addr) => pc = addr,
                    RuntimeStep::GlobalFail => return Ok(None),
                },
                Instruction::Func(_, _) => pc += 1,
            }

            if self.captures.len() > self.limits.max_captures {
                return Err(PegError::TooManyCaptures);
            }
        }
    }

    fn close_runtime(&mut self, s: &mut usize) -> PegResult<RuntimeStep> {
        let open_idx = find_last_open(&self.captures);
        let idx = match &self.captures[open_idx] {
            CaptureEntry::Open { idx, .. } => *idx,
            _ => unreachable!(),
        };
        let inner = engine::collect_runtime_inner(
            &self.captures[open_idx + 1..],
            self.input,
            self.env,
            self.extras,
        )?;
        let callback = match self.env.get(idx) {
            Some(EnvValue::Runtime(f)) => f.clone(),
            _ => panic!("CloseRunTime without a Runtime environment value"),
        };
        let outcome = callback(self.input, *s, &inner)?;
        self.captures.truncate(open_idx);

        match outcome {
            RuntimeCaptureOutcome::Fail => Ok(match self.hard_fail(s) {
                Some(addr) => RuntimeStep::Jump(addr),
                None => RuntimeStep::GlobalFail,
            }),
            RuntimeCaptureOutcome::Accept => Ok(RuntimeStep::Fallthrough),
            RuntimeCaptureOutcome::Reposition(pos) => {
                if pos > self.input.len() {
                    return Err(PegError::BadRuntimePosition);
                }
                *s = pos;
                Ok(RuntimeStep::Fallthrough)
            }
            RuntimeCaptureOutcome::RepositionWithExtras(pos, extras) => {
                if pos > self.input.len() {
                    return Err(PegError::BadRuntimePosition);
                }
                *s = pos;
                for v in extras {
                    self.captures.push(CaptureEntry::Value(v));
                }
                Ok(RuntimeStep::Fallthrough)
            }
        }
    }
}

/// The three ways a `CloseRunTime` callback can steer the VM (spec §4.5).
enum RuntimeStep {
    Fallthrough,
    Jump(usize),
    GlobalFail,
}

fn find_last_open(captures: &[CaptureEntry]) -> usize {
    let mut depth = 0i32;
    for i in (0..captures.len()).rev() {
        match &captures[i] {
            CaptureEntry::Close { .. } => depth += 1,
            CaptureEntry::Open { .. } => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    panic!("CloseRunTime without a matching Open on the capture list")
}

/// Run a raw `(code, env)` program starting at `pc` against `input`,
/// discarding captures — used by the verifier (spec §4.6) to symbolically
/// probe whether a grammar rule's loop body can match the empty string,
/// without duplicating the VM's stepping logic.
pub(crate) fn run_from(
    code: &[Instruction],
    env: &Environment,
    pc: usize,
    input: &[u8],
    limits: Limits,
) -> PegResult<Option<usize>> {
    let mut vm = Vm {
        code,
        env,
        input,
        extras: &[],
        stack: FrameStack::new(),
        captures: Vec::new(),
        limits,
    };
    vm.run(pc, 0)
}

/// Run `pattern` against `input`, threading `extras` through to `Arg`
/// captures and runtime-capture callbacks, with default [`Limits`].
#[instrument(skip(pattern, input, extras), fields(pattern_len = pattern.len(), input_len = input.len()))]
pub fn pattern_match(
    pattern: &Pattern,
    input: &[u8],
    extras: &[CapturedValue],
) -> PegResult<MatchResult> {
    pattern_match_with_limits(pattern, input, extras, Limits::default())
}

/// As [`pattern_match`], with caller-supplied [`Limits`].
#[instrument(skip(pattern, input, extras, limits), fields(pattern_len = pattern.len(), input_len = input.len()))]
pub fn pattern_match_with_limits(
    pattern: &Pattern,
    input: &[u8],
    extras: &[CapturedValue],
    limits: Limits,
) -> PegResult<MatchResult> {
    debug_assert!(
        !pattern
            .code()
            .iter()
            .any(|i| matches!(i, Instruction::OpenCall(_))),
        "pattern has an unresolved OpenCall; build it through grammar() first"
    );
    let mut vm = Vm {
        code: pattern.code(),
        env: pattern.env(),
        input,
        extras,
        stack: FrameStack::new(),
        captures: Vec::new(),
        limits,
    };
    match vm.run(0, 0)? {
        Some(end) => {
            let captures = engine::collect(&vm.captures, input, pattern.env(), extras)?;
            tracing::debug!(end, n_captures = captures.len(), "match succeeded");
            Ok(MatchResult {
                end: Some(end),
                captures,
            })
        }
        None => {
            tracing::debug!("match failed");
            Ok(MatchResult {
                end: None,
                captures: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::match_bytes;

    #[test]
    fn literal_match_advances_to_end() {
        let p = match_bytes(b"abc");
        let r = pattern_match(&p, b"abcxyz", &[]).unwrap();
        assert_eq!(r.end(), Some(3));
    }

    #[test]
    fn literal_mismatch_fails() {
        let p = match_bytes(b"abc");
        let r = pattern_match(&p, b"abx", &[]).unwrap();
        assert!(!r.is_match());
    }

    #[test]
    fn capture_simple_yields_matched_text() {
        use crate::capture::cap;
        let p = cap(&match_bytes(b"ab"));
        let r = pattern_match(&p, b"abcd", &[]).unwrap();
        assert_eq!(r.end(), Some(2));
        assert_eq!(r.captures().len(), 1);
    }
}
