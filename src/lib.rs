//! `bytepeg`: a parsing-expression-grammar matching library built around a
//! backtracking parsing virtual machine, modeled on LPeg.
//!
//! Patterns are built by calling combinator functions (or their operator
//! sugar) directly — there is no textual grammar syntax to parse. The
//! heavy lifting (instruction model, compiler, static verifier, VM, capture
//! engine) lives in `bytepeg-core`; this crate re-exports its public surface
//! and adds the operator-overloaded `Pattern` API.
//!
//! # Quick start
//!
//! ```
//! use bytepeg::{cap, choose, match_bytes, pattern_match, pow, set};
//!
//! // digit+
//! let digit = set(b"0123456789");
//! let digits = pow(&digit, 1).unwrap();
//! let number = cap(&digits);
//!
//! let r = pattern_match(&number, b"1234abc", &[]).unwrap();
//! assert_eq!(r.end(), Some(4));
//!
//! // "foo" / "bar"
//! let alt = choose(&match_bytes(b"foo"), &match_bytes(b"bar")).unwrap();
//! assert!(pattern_match(&alt, b"bar", &[]).unwrap().is_match());
//!
//! // with operator sugar: ("foo" / "bar") followed by "!"
//! let greeting = &alt * &match_bytes(b"!");
//! assert!(pattern_match(&greeting, b"foo!", &[]).unwrap().is_match());
//! ```

pub use bytepeg_core::capture::{
    cap, cap_a, cap_b, cap_c, cap_f, cap_fold, cap_g, cap_p, cap_q, cap_rt, cap_s, cap_str, cap_t,
};
pub use bytepeg_core::combinators::{choose, concat, diff, lookahead, negate, pow};
pub use bytepeg_core::constructors::{any, fail, match_bytes, range, set, truth, var};
pub use bytepeg_core::dump::{disassemble, dump, from_bytes, to_bytes, Dump, EnvSnapshot};
pub use bytepeg_core::env::{CapturedValue, ConstValue, RuntimeCaptureOutcome};
pub use bytepeg_core::error::{PegError, PegResult};
pub use bytepeg_core::grammar::{dummy, grammar};
pub use bytepeg_core::limits::Limits;
pub use bytepeg_core::vm::{pattern_match, pattern_match_with_limits, MatchResult};
pub use bytepeg_core::Pattern;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_sugar_matches_concat() {
        let a = match_bytes(b"a");
        let b = match_bytes(b"b");
        let via_op = &a * &b;
        let via_fn = concat(&a, &b);
        assert_eq!(via_op.body(), via_fn.body());
    }

    #[test]
    fn bitor_sugar_matches_choose() {
        let a = match_bytes(b"a");
        let b = match_bytes(b"b");
        let via_op = (&a | &b).unwrap();
        assert!(pattern_match(&via_op, b"b", &[]).unwrap().is_match());
    }

    #[test]
    fn not_sugar_never_consumes() {
        let a = match_bytes(b"a");
        let negated = (!&a).unwrap();
        let r = pattern_match(&negated, b"b", &[]).unwrap();
        assert_eq!(r.end(), Some(0));
    }

    #[test]
    fn pow_sugar_matches_repetition() {
        let a = match_bytes(b"a");
        let repeated = (&a ^ 2).unwrap();
        assert!(!pattern_match(&repeated, b"a", &[]).unwrap().is_match());
        assert!(pattern_match(&repeated, b"aa", &[]).unwrap().is_match());
    }
}
