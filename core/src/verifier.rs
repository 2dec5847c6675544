//! Static verifier (spec §4.6): bounded symbolic execution to catch left
//! recursion and empty-loop repetition bodies before a grammar (or a
//! standalone `pow`) is allowed to run.
//!
//! Grounded in `spec.md` §4.6 directly. Two checks with different scopes:
//! [`accepts_empty`] answers "can this already-resolved pattern match the
//! empty string" by literally running it against `b""` (spec §4.6's
//! "empty-input model" collapses to exactly this when the pattern has no
//! unresolved grammar reference); [`check_left_recursion`] and
//! [`check_empty_loop_in_rule`] perform the bounded structural walk spec
//! §4.6 describes for a fully assembled grammar, where rule bodies reference
//! each other through resolved `Call`s.

use hashbrown::{HashMap, HashSet};

use crate::env::Environment;
use crate::error::{PegError, PegResult};
use crate::instruction::{apply_offset, Instruction};
use crate::limits::Limits;
use crate::pattern::Pattern;

/// Does `p` match the empty string? Used by `pow`'s general at-least-`n`
/// case (spec §4.2: "verify that `A` does not accept the empty string").
///
/// A pattern built from `var()` and not yet resolved by [`crate::grammar`]
/// cannot be executed; such patterns defer this check to
/// [`check_empty_loop_in_rule`], which runs after grammar assembly resolves
/// every `OpenCall`.
pub fn accepts_empty(p: &Pattern) -> PegResult<bool> {
    if p.code().iter().any(|i| matches!(i, Instruction::OpenCall(_))) {
        return Ok(false);
    }
    Ok(crate::vm::pattern_match(p, b"", &[])?.is_match())
}

/// Bounded symbolic walk from `rule_start` looking for any control-flow
/// edge — `Call`, or a bare `Jmp`/`Commit`/`PartialCommit`/`BackCommit`
/// left behind by tail-call elimination — back to a program counter
/// already on the current path, i.e. a cycle reachable again before
/// anything is consumed (spec §4.6). `visiting` is path-local: a pc is
/// only forbidden while it's an ancestor of the current walk, not forever,
/// so ordinary (non-cyclic) sharing of code between branches is fine.
pub fn check_left_recursion(
    code: &[Instruction],
    rule_start: usize,
    rule_names: &HashMap<usize, String>,
) -> PegResult<()> {
    let mut visiting = HashSet::new();
    let mut steps = 0usize;
    let start_name = rule_names.get(&rule_start).cloned().unwrap_or_default();
    explore(
        code,
        rule_start,
        &mut visiting,
        rule_names,
        &start_name,
        &mut steps,
        20_000,
    )
}

#[allow(clippy::too_many_arguments)]
fn explore(
    code: &[Instruction],
    pc: usize,
    visiting: &mut HashSet<usize>,
    rule_names: &HashMap<usize, String>,
    start_name: &str,
    steps: &mut usize,
    max_steps: usize,
) -> PegResult<()> {
    *steps += 1;
    if *steps > max_steps || pc >= code.len() {
        return Ok(());
    }
    if !visiting.insert(pc) {
        let name = rule_names
            .get(&pc)
            .cloned()
            .unwrap_or_else(|| start_name.to_string());
        return Err(PegError::LeftRecursion(name));
    }
    let result = explore_step(code, pc, visiting, rule_names, start_name, steps, max_steps);
    visiting.remove(&pc);
    result
}

#[allow(clippy::too_many_arguments)]
fn explore_step(
    code: &[Instruction],
    pc: usize,
    visiting: &mut HashSet<usize>,
    rule_names: &HashMap<usize, String>,
    start_name: &str,
    steps: &mut usize,
    max_steps: usize,
) -> PegResult<()> {
    match &code[pc] {
        Instruction::Char(..) | Instruction::Any(..) | Instruction::Set(..) => Ok(()),
        Instruction::Choice(off) => {
            let target = apply_offset(pc, *off);
            explore(code, pc + 1, visiting, rule_names, start_name, steps, max_steps)?;
            explore(code, target, visiting, rule_names, start_name, steps, max_steps)
        }
        Instruction::Jmp(off) | Instruction::Commit(off) | Instruction::PartialCommit(off)
        | Instruction::BackCommit(off) => explore(
            code,
            apply_offset(pc, *off),
            visiting,
            rule_names,
            start_name,
            steps,
            max_steps,
        ),
        Instruction::Call(off) => {
            let target = apply_offset(pc, *off);
            explore(code, target, visiting, rule_names, start_name, steps, max_steps)?;
            explore(code, pc + 1, visiting, rule_names, start_name, steps, max_steps)
        }
        Instruction::Ret | Instruction::End | Instruction::Fail | Instruction::FailTwice
        | Instruction::Giveup | Instruction::OpenCall(_) => Ok(()),
        Instruction::Span(_)
        | Instruction::FullCapture(..)
        | Instruction::EmptyCapture(..)
        | Instruction::OpenCapture(..)
        | Instruction::CloseCapture
        | Instruction::CloseRunTime
        | Instruction::Func(..) => {
            explore(code, pc + 1, visiting, rule_names, start_name, steps, max_steps)
        }
    }
}

/// Scan `[rule_start, rule_end)` for a backward `PartialCommit` (a
/// repetition back-edge) whose body calls another rule; if one iteration of
/// that body can succeed on empty input, it's an infinite loop (spec §4.6).
pub fn check_empty_loop_in_rule(
    code: &[Instruction],
    rule_start: usize,
    rule_end: usize,
    name: &str,
    env: &Environment,
    limits: Limits,
) -> PegResult<()> {
    for idx in rule_start..rule_end {
        if let Instruction::PartialCommit(off) = code[idx].clone() {
            if off < 0 {
                let loop_start = apply_offset(idx, off);
                if loop_start >= rule_start
                    && loop_start < idx
                    && code[loop_start..idx]
                        .iter()
                        .any(|i| matches!(i, Instruction::Call(_)))
                {
                    let mut patched = code.to_vec();
                    patched[idx] = Instruction::End;
                    if let Some(end) = crate::vm::run_from(&patched, env, loop_start, b"", limits)? {
                        if end == 0 {
                            return Err(PegError::EmptyLoopBody(name.to_string()));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::match_bytes;

    #[test]
    fn literal_does_not_accept_empty() {
        assert!(!accepts_empty(&match_bytes(b"a")).unwrap());
    }

    #[test]
    fn truth_accepts_empty() {
        assert!(accepts_empty(&Pattern::truth()).unwrap());
    }

    #[test]
    fn left_recursion_detects_immediate_self_call() {
        // rule body: Call(0) (calls itself); Ret
        let code = vec![Instruction::Call(-1), Instruction::Ret];
        // Call(-1) from pc 0 targets apply_offset(0,-1) == 0, itself.
        let mut names = HashMap::new();
        names.insert(0usize, "R".to_string());
        let err = check_left_recursion(&code, 0, &names).unwrap_err();
        assert_eq!(err, PegError::LeftRecursion("R".to_string()));
    }
}
