//! Grammar assembly (spec §4.3): bundles named rules into one `Pattern`,
//! resolving every `var()` reference and running the verifier over each
//! rule.
//!
//! Grounded in `spec.md` §4.3's literal program layout and steps, and on
//! `examples/original_source/_ppeg.c`'s bundled `Dummy` grammar, reproduced
//! here as [`dummy`] — a supplemented feature (spec §4 callout in
//! `SPEC_FULL.md`).

use hashbrown::HashMap;

use crate::env::{label_str, Environment};
use crate::error::{PegError, PegResult};
use crate::instruction::{rel_offset, Instruction};
use crate::limits::Limits;
use crate::pattern::{rebase_instruction, Pattern};

/// Assemble `rules` (name, pattern) into one callable grammar `Pattern`.
/// `start` defaults to the first rule's name.
///
/// Layout (spec §4.3):
/// ```text
/// 0: Call  -> S
/// 1: Jmp   -> End
/// 2..:     rule0 body; Ret; rule1 body; Ret; ...
///          End
/// ```
pub fn grammar(rules: &[(String, Pattern)], start: Option<&str>) -> PegResult<Pattern> {
    if rules.is_empty() {
        return Err(PegError::EmptyGrammar);
    }

    let mut combined_env = Environment::new();
    let mut shifts = Vec::with_capacity(rules.len());
    for (_, p) in rules {
        let (merged, shift) = combined_env.concat(p.env());
        combined_env = merged;
        shifts.push(shift);
    }

    let mut code = vec![Instruction::Call(0), Instruction::Jmp(0)];
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut spans: Vec<(String, usize, usize)> = Vec::with_capacity(rules.len());

    for (i, (name, p)) in rules.iter().enumerate() {
        let start_off = code.len();
        positions.insert(name.clone(), start_off);
        let shift = shifts[i];
        for (j, instr) in p.body().iter().enumerate() {
            let new_idx = start_off + j;
            code.push(rebase_instruction(instr, new_idx, start_off, shift));
        }
        code.push(Instruction::Ret);
        spans.push((name.clone(), start_off, code.len() - 1));
    }

    for i in 2..code.len() {
        if let Instruction::OpenCall(idx) = &code[i] {
            let idx = *idx;
            let name = label_str(&combined_env, idx)?.to_string();
            let target = *positions
                .get(&name)
                .ok_or_else(|| PegError::UndefinedStartRule(name.clone()))?;
            code[i] = if matches!(code.get(i + 1), Some(Instruction::Ret)) {
                Instruction::Jmp(rel_offset(i, target)?)
            } else {
                Instruction::Call(rel_offset(i, target)?)
            };
        }
    }

    let limits = Limits::default();
    for (name, start_off, ret_off) in &spans {
        crate::verifier::check_left_recursion(&code, *start_off, &positions_by_offset(&positions))?;
        crate::verifier::check_empty_loop_in_rule(
            &code,
            *start_off,
            *ret_off,
            name,
            &combined_env,
            limits,
        )?;
    }

    let start_name = start
        .map(|s| s.to_string())
        .unwrap_or_else(|| rules[0].0.clone());
    let start_target = *positions
        .get(&start_name)
        .ok_or_else(|| PegError::UndefinedStartRule(start_name.clone()))?;
    code[0] = Instruction::Call(rel_offset(0, start_target)?);
    code[1] = Instruction::Jmp(rel_offset(1, code.len())?);

    Ok(crate::combinators::optimizejumps(Pattern::new_raw(
        code,
        combined_env,
    )))
}

fn positions_by_offset(positions: &HashMap<String, usize>) -> HashMap<usize, String> {
    positions.iter().map(|(k, v)| (*v, k.clone())).collect()
}

/// The `Dummy` grammar from `_ppeg.c`: matches anything containing the
/// literal `"Omega"`, by trying it at every position. Shipped as a worked
/// example (`SPEC_FULL.md` §4 supplement), exercised by testable property
/// E8.
pub fn dummy() -> PegResult<Pattern> {
    use crate::combinators::{choose, concat};
    use crate::constructors::{any, match_bytes, var};

    // S <- "Omega" / (. S) — try the literal here, else consume one byte
    // and recurse, so the grammar matches any input containing "Omega".
    let advance_then_recurse = concat(&any(1)?, &var("S"));
    let s_body = choose(&match_bytes(b"Omega"), &advance_then_recurse)?;
    let rules = [("S".to_string(), s_body)];
    grammar(&rules, Some("S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::pattern_match;

    #[test]
    fn empty_grammar_rejected() {
        assert_eq!(grammar(&[], None).unwrap_err(), PegError::EmptyGrammar);
    }

    #[test]
    fn undefined_start_rule_rejected() {
        let rules = [("A".to_string(), Pattern::truth())];
        let err = grammar(&rules, Some("B")).unwrap_err();
        assert_eq!(err, PegError::UndefinedStartRule("B".to_string()));
    }

    #[test]
    fn left_recursive_grammar_rejected() {
        use crate::constructors::var;
        let rules = [("R".to_string(), var("R"))];
        let err = grammar(&rules, None).unwrap_err();
        assert_eq!(err, PegError::LeftRecursion("R".to_string()));
    }

    #[test]
    fn dummy_grammar_finds_omega_anywhere() {
        let g = dummy().unwrap();
        assert!(pattern_match(&g, b"xxxOmegayyy", &[]).unwrap().is_match());
        assert!(!pattern_match(&g, b"no match here", &[]).unwrap().is_match());
    }

    #[test]
    fn parenthesis_grammar_matches_balanced_input() {
        use crate::combinators::{choose, concat, diff, pow};
        use crate::constructors::{any, match_bytes, set, var};

        let sigma = diff(&any(1).unwrap(), &set(b"()")).unwrap();
        let s_body = concat(
            &match_bytes(b"("),
            &concat(
                &pow(&choose(&var("S"), &sigma).unwrap(), 0).unwrap(),
                &match_bytes(b")"),
            ),
        );
        let rules = [("S".to_string(), s_body)];
        let g = grammar(&rules, Some("S")).unwrap();
        let r = pattern_match(&g, b"(a(b)c)", &[]).unwrap();
        assert_eq!(r.end(), Some(7));
    }
}
