//! Capture constructors (spec §4.4): each wraps a pattern `P` with a
//! capture-kind tag, choosing between the bounded `FullCapture` fast path
//! and the general `OpenCapture … CloseCapture` envelope.
//!
//! Grounded on `spec.md` §4.4's `skipchecks`/`MaxOff` rule directly, and on
//! the teacher's pattern of small typed wrapper constructors around a shared
//! internal builder (`parser/ast.rs`'s `Expr::wrap_*` helpers).

use std::sync::Arc;

use crate::combinators::optimizecaptures;
use crate::env::{
    BoxedFn, BoxedFold, BoxedMapping, CapturedValue, ConstValue, EnvIdx, EnvValue,
    RuntimeCaptureFn, RuntimeCaptureOutcome,
};
use crate::error::{PegError, PegResult};
use crate::instruction::{Instruction, MAX_OFF};
use crate::opcode::CapKind;
use crate::pattern::Pattern;

/// Sum of bytes matched by a pure check sequence (`Any`/`Char`/`Set`, all
/// unconverted), or `None` if `body` contains anything else (spec's
/// `skipchecks` returning less than the whole body).
pub(crate) fn static_len(body: &[Instruction]) -> Option<usize> {
    let mut total = 0usize;
    for instr in body {
        match instr {
            Instruction::Any(n, None) => total += *n as usize,
            Instruction::Char(_, None) => total += 1,
            Instruction::Set(_, None) => total += 1,
            _ => return None,
        }
    }
    Some(total)
}

fn wrap(p: &Pattern, kind: CapKind, env: crate::env::Environment, idx: EnvIdx) -> Pattern {
    if let Some(len) = static_len(p.body()) {
        if len <= MAX_OFF {
            let mut body = p.body().to_vec();
            body.push(Instruction::FullCapture(kind, len as u8, idx));
            return Pattern::new_raw(body, env);
        }
    }
    let mut body = vec![Instruction::OpenCapture(kind, idx)];
    body.extend(p.body().iter().cloned());
    body.push(Instruction::CloseCapture);
    optimizecaptures(Pattern::new_raw(body, env))
}

/// `cap(P)`: the matched substring, or — if `P` itself contains nested
/// captures — the whole match prepended to those inner values.
pub fn cap(p: &Pattern) -> Pattern {
    wrap(p, CapKind::Simple, p.env().clone(), None)
}

/// `cap_t(P)`: collect `P`'s inner values into a single `Group`.
pub fn cap_t(p: &Pattern) -> Pattern {
    wrap(p, CapKind::Table, p.env().clone(), None)
}

/// `cap_s(P)`: the matched text with every inner capture's text substituted
/// for its original span.
pub fn cap_s(p: &Pattern) -> Pattern {
    wrap(p, CapKind::Subst, p.env().clone(), None)
}

/// `cap_p()`: the current byte position, consuming nothing.
pub fn cap_p() -> Pattern {
    Pattern::from_body(
        vec![Instruction::EmptyCapture(CapKind::Position, None)],
        crate::env::Environment::new(),
    )
}

/// `cap_c(v)`: a literal constant value, consuming nothing.
pub fn cap_c(v: ConstValue) -> Pattern {
    let mut env = crate::env::Environment::new();
    let idx = env.push(EnvValue::Const(v));
    Pattern::from_body(vec![Instruction::EmptyCapture(CapKind::Constant, idx)], env)
}

/// `cap_a(i)`: the `i`-th (1-based) extra argument passed to the match call.
pub fn cap_a(i: i64) -> PegResult<Pattern> {
    if i <= 0 || i > i16::MAX as i64 {
        return Err(PegError::ArgOutOfRange(i));
    }
    let mut env = crate::env::Environment::new();
    let idx = env.push(EnvValue::ArgIndex(i as u32));
    Ok(Pattern::from_body(
        vec![Instruction::EmptyCapture(CapKind::Argument, idx)],
        env,
    ))
}

/// `cap_b(name)`: the value(s) of the nearest enclosing `Group(name)`.
pub fn cap_b(name: &str) -> Pattern {
    let mut env = crate::env::Environment::new();
    let idx = env.push(EnvValue::Label(name.to_string()));
    Pattern::from_body(vec![Instruction::EmptyCapture(CapKind::Backref, idx)], env)
}

/// `cap_g(P, name)`: a group; if named, its inner values are registered for
/// `cap_b` lookups instead of being yielded directly.
pub fn cap_g(p: &Pattern, name: Option<&str>) -> Pattern {
    let mut env = p.env().clone();
    let idx = match name {
        Some(n) => env.push(EnvValue::Label(n.to_string())),
        None => None,
    };
    wrap(p, CapKind::Group, env, idx)
}

/// `cap_f(P, f)`: `f` is applied to `P`'s inner captured values.
pub fn cap_f<F>(p: &Pattern, f: F) -> Pattern
where
    F: Fn(&[CapturedValue]) -> PegResult<CapturedValue> + Send + Sync + 'static,
{
    let mut env = p.env().clone();
    let boxed: BoxedFn = Arc::new(f);
    let idx = env.push(EnvValue::Function(boxed));
    wrap(p, CapKind::Function, env, idx)
}

/// `cap_q(P, m)`: looks `P`'s first inner value up in `m`.
pub fn cap_q<F>(p: &Pattern, m: F) -> Pattern
where
    F: Fn(&CapturedValue) -> Option<CapturedValue> + Send + Sync + 'static,
{
    let mut env = p.env().clone();
    let boxed: BoxedMapping = Arc::new(m);
    let idx = env.push(EnvValue::Mapping(boxed));
    wrap(p, CapKind::Query, env, idx)
}

/// `cap_fold(P, f)`: left fold `f(acc, v)` over `P`'s inner values; the
/// first inner value seeds the accumulator.
pub fn cap_fold<F>(p: &Pattern, f: F) -> Pattern
where
    F: Fn(CapturedValue, &CapturedValue) -> PegResult<CapturedValue> + Send + Sync + 'static,
{
    let mut env = p.env().clone();
    let boxed: BoxedFold = Arc::new(f);
    let idx = env.push(EnvValue::Fold(boxed));
    wrap(p, CapKind::Fold, env, idx)
}

/// `cap_str(P, fmt)`: `%d` substitution over `P`'s inner string fragments.
pub fn cap_str(p: &Pattern, fmt: &[u8]) -> Pattern {
    let mut env = p.env().clone();
    let idx = env.push(EnvValue::Format(fmt.to_vec()));
    wrap(p, CapKind::String, env, idx)
}

/// `cap_rt(P, f)`: `f` is invoked live during matching and may veto, shift,
/// or inject captures (spec §4.5). Always uses the open/close envelope —
/// `CloseRunTime`, not `CloseCapture` — since its effect can only be
/// determined at match time.
pub fn cap_rt<F>(p: &Pattern, f: F) -> Pattern
where
    F: Fn(&[u8], usize, &[CapturedValue]) -> PegResult<RuntimeCaptureOutcome> + Send + Sync + 'static,
{
    let mut env = p.env().clone();
    let boxed: RuntimeCaptureFn = Arc::new(f);
    let idx = env.push(EnvValue::Runtime(boxed));
    let mut body = vec![Instruction::OpenCapture(CapKind::Runtime, idx)];
    body.extend(p.body().iter().cloned());
    body.push(Instruction::CloseRunTime);
    Pattern::new_raw(body, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructors::match_bytes;
    use crate::vm::pattern_match;

    #[test]
    fn simple_capture_on_short_literal_uses_full_capture_fast_path() {
        let p = cap(&match_bytes(b"ab"));
        assert!(matches!(
            p.body().last(),
            Some(Instruction::FullCapture(CapKind::Simple, 2, None))
        ));
    }

    #[test]
    fn position_capture_consumes_nothing() {
        let p = cap_p();
        let r = pattern_match(&p, b"abc", &[]).unwrap();
        assert_eq!(r.end(), Some(0));
        assert_eq!(r.captures().len(), 1);
    }

    #[test]
    fn arg_capture_rejects_nonpositive_index() {
        assert_eq!(cap_a(0).unwrap_err(), PegError::ArgOutOfRange(0));
    }

    #[test]
    fn backref_round_trips_through_group() {
        use crate::combinators::concat;
        let g = cap_g(&match_bytes(b"x"), Some("g"));
        let p = concat(&g, &cap_b("g"));
        let r = pattern_match(&p, b"x", &[]).unwrap();
        assert!(r.is_match());
        assert_eq!(r.captures().len(), 1);
    }
}
