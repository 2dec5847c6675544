//! Primitive pattern constructors (spec §4.1): `any`, `match_bytes`, `set`,
//! `range`, `fail`, `truth`, `var`.
//!
//! Grounded on `examples/original_source/_ppeg.c`'s `any()`/`getset()`/
//! `getrange()` C functions for the exact block-decomposition and
//! range-pair semantics.

use crate::charset::Charset;
use crate::env::{Environment, EnvValue};
use crate::error::{PegError, PegResult};
use crate::instruction::Instruction;
use crate::pattern::Pattern;

/// `UCHAR_MAX`, the largest count a single `Any` instruction can address.
pub const UCHAR_MAX: i32 = 255;

/// `Any(n)`. `n == 0` is `True`. For `n > 0`, one `Any(255)` per full block
/// plus a trailing `Any(n % 255)`. For `-UCHAR_MAX <= n < 0`, the
/// "not-at-least-|n|" idiom (`Any(-n)` with its failure branch redirected
/// past a trailing `Fail`). For `n < -UCHAR_MAX`, the guarded multi-block
/// form: a single `Choice` wraps the whole unconditional `Any` block
/// sequence for `|n|` bytes, followed by `FailTwice` (spec §4.1, same
/// `Choice … body … FailTwice` shape `diff` uses, generalized so that
/// however many blocks the body consumes on the way to discovering there
/// isn't enough input, backtracking reverts to the position recorded
/// before any of them ran).
pub fn any(n: i32) -> PegResult<Pattern> {
    if n == 0 {
        return Ok(Pattern::truth());
    }
    if n > 0 {
        let n = n as u32;
        let mut body = Vec::new();
        let full_blocks = n / UCHAR_MAX as u32;
        let remainder = n % UCHAR_MAX as u32;
        for _ in 0..full_blocks {
            body.push(Instruction::Any(UCHAR_MAX as u8, None));
        }
        if remainder > 0 {
            body.push(Instruction::Any(remainder as u8, None));
        }
        return Ok(Pattern::from_body(body, Environment::new()));
    }

    // n < 0: "match only if fewer than |n| bytes remain".
    let neg = -n;
    if neg <= UCHAR_MAX {
        // Any(-n); Fail, with Any's failure branch redirected to land just
        // past the Fail (i.e. success, consuming nothing).
        let mut body = vec![Instruction::Any(neg as u8, Some(0)), Instruction::Fail];
        // The Any is at index 0; its failure target must land at index 2
        // (just past the Fail at index 1, i.e. the position right after
        // this body — which for a standalone pattern is the trailing End).
        let target = crate::instruction::rel_offset(0, 2)?;
        body[0] = Instruction::Any(neg as u8, Some(target));
        Ok(Pattern::from_body(body, Environment::new()))
    } else {
        // Guarded multi-block form. A single Choice, pushed before any byte
        // is consumed, guards the whole unconditional Any sequence for |n|
        // bytes. If one of those blocks runs out of input, backtracking
        // unwinds straight to that Choice's saved position (consuming
        // nothing overall) and lands past FailTwice: success. If every
        // block succeeds, FailTwice discards the now-stale Choice frame and
        // fails for real — there was enough input, so "fewer than |n| bytes
        // remain" is false. Same Choice/body/FailTwice shape as `diff`.
        let neg = neg as u32;
        let full_blocks = neg / UCHAR_MAX as u32;
        let remainder = neg % UCHAR_MAX as u32;
        let mut body = vec![Instruction::Choice(0)];
        for _ in 0..full_blocks {
            body.push(Instruction::Any(UCHAR_MAX as u8, None));
        }
        if remainder > 0 {
            body.push(Instruction::Any(remainder as u8, None));
        }
        body.push(Instruction::FailTwice);
        let success_idx = body.len();
        body[0] = Instruction::Choice(crate::instruction::rel_offset(0, success_idx)?);
        Ok(Pattern::from_body(body, Environment::new()))
    }
}

/// `Match(bytes)`: a literal byte string, compiled to consecutive `Char`
/// instructions. The empty string is `True`.
pub fn match_bytes(bytes: &[u8]) -> Pattern {
    if bytes.is_empty() {
        return Pattern::truth();
    }
    let body = bytes
        .iter()
        .map(|&b| Instruction::Char(b, None))
        .collect();
    Pattern::from_body(body, Environment::new())
}

/// `Set(bytes)`: match any single byte from `bytes`. A single-byte set
/// compiles to a plain `Char`.
pub fn set(bytes: &[u8]) -> Pattern {
    if bytes.len() == 1 {
        return match_bytes(bytes);
    }
    let cs = Charset::from_bytes(bytes);
    Pattern::from_body(vec![Instruction::Set(cs, None)], Environment::new())
}

/// `Range(pairs)`: `pairs` must have even length, read as `(lo, hi)` pairs;
/// the charset is the union of the closed byte ranges.
pub fn range(pairs: &[u8]) -> PegResult<Pattern> {
    if pairs.len() % 2 != 0 {
        return Err(PegError::InvalidRangeLength);
    }
    let ranges: Vec<(u8, u8)> = pairs.chunks_exact(2).map(|c| (c[0], c[1])).collect();
    let cs = Charset::from_ranges(&ranges);
    Ok(Pattern::from_body(
        vec![Instruction::Set(cs, None)],
        Environment::new(),
    ))
}

/// `Fail`: never matches.
pub fn fail() -> Pattern {
    Pattern::fail()
}

/// The empty pattern, `True`: always matches, consumes nothing.
pub fn truth() -> Pattern {
    Pattern::truth()
}

/// `Var(name)`: an unresolved reference to a grammar rule, resolved later
/// by [`crate::grammar::grammar`].
pub fn var(name: &str) -> Pattern {
    let mut env = Environment::new();
    let idx = env.push(EnvValue::Label(name.to_string()));
    Pattern::from_body(vec![Instruction::OpenCall(idx)], env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::pattern_match;

    #[test]
    fn any_zero_is_true() {
        let p = any(0).unwrap();
        assert!(p.is_true());
    }

    #[test]
    fn any_positive_decomposes_into_blocks() {
        let p = any(300).unwrap();
        assert_eq!(
            p.body(),
            &[
                Instruction::Any(255, None),
                Instruction::Any(45, None),
            ]
        );
    }

    #[test]
    fn any_exact_multiple_has_no_trailing_block() {
        let p = any(510).unwrap();
        assert_eq!(p.body().len(), 2);
    }

    #[test]
    fn any_negative_small_matches_short_input() {
        let p = any(-3).unwrap();
        assert!(pattern_match(&p, b"ab", &[]).unwrap().is_match());
        assert!(!pattern_match(&p, b"abc", &[]).unwrap().is_match());
    }

    #[test]
    fn any_negative_large_guarded_form() {
        let p = any(-300).unwrap();
        assert!(pattern_match(&p, b"short", &[]).unwrap().is_match());
        let long_input = vec![b'x'; 300];
        assert!(!pattern_match(&p, &long_input, &[]).unwrap().is_match());
    }

    #[test]
    fn any_negative_large_guarded_form_matches_between_block_boundaries() {
        // Regression: inputs long enough to clear the first 255-byte block
        // but still short of the full 300 must still succeed, consuming
        // nothing, not hard-fail partway through the second block.
        let p = any(-300).unwrap();
        for len in [255usize, 256, 280, 299] {
            let input = vec![b'x'; len];
            let r = pattern_match(&p, &input, &[]).unwrap();
            assert!(r.is_match(), "expected match for input length {len}");
            assert_eq!(r.end(), Some(0), "expected zero consumption for length {len}");
        }
    }

    #[test]
    fn match_bytes_literal() {
        let p = match_bytes(b"abc");
        let r = pattern_match(&p, b"abcd", &[]).unwrap();
        assert_eq!(r.end().unwrap(), 3);
    }

    #[test]
    fn set_single_byte_is_char() {
        let p = set(b"a");
        assert_eq!(p.body(), &[Instruction::Char(b'a', None)]);
    }

    #[test]
    fn range_rejects_odd_length() {
        assert_eq!(range(b"09a").unwrap_err(), PegError::InvalidRangeLength);
    }

    #[test]
    fn range_matches_inclusive_bounds() {
        let p = range(b"09").unwrap();
        assert!(pattern_match(&p, b"5", &[]).unwrap().is_match());
        assert!(!pattern_match(&p, b":", &[]).unwrap().is_match());
    }
}
