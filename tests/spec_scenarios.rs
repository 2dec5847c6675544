//! Literal end-to-end scenarios and algebraic/boundary properties not
//! already exercised by the unit tests colocated with each module
//! (`spec.md` §8).

use bytepeg::{
    any, cap, cap_b, cap_g, cap_s, choose, concat, diff, dummy, grammar, lookahead, match_bytes,
    negate, pattern_match, pow, range, set, truth, var, CapturedValue,
};

fn text(v: &CapturedValue) -> Vec<u8> {
    v.as_text()
}

#[test]
fn e1_ordered_choice_of_literals() {
    let p = choose(&match_bytes(b"abc"), &match_bytes(b"abd")).unwrap();
    let r = pattern_match(&p, b"abd", &[]).unwrap();
    assert_eq!(r.end(), Some(3));
    assert!(r.captures().is_empty());
    assert!(!pattern_match(&p, b"abe", &[]).unwrap().is_match());
}

#[test]
fn e2_at_least_one_vowel() {
    let p = pow(&set(b"aeiou"), 1).unwrap();
    let r = pattern_match(&p, b"eeeexyz", &[]).unwrap();
    assert_eq!(r.end(), Some(4));
}

#[test]
fn e3_captured_digit_run() {
    let p = cap(&pow(&range(b"09").unwrap(), 1).unwrap());
    let r = pattern_match(&p, b"12345abc", &[]).unwrap();
    assert_eq!(r.end(), Some(5));
    assert_eq!(r.captures().len(), 1);
    assert_eq!(text(&r.captures()[0]), b"12345");
}

#[test]
fn e4_substitution_over_identity_alternatives() {
    let alt = choose(
        &match_bytes(b"a"),
        &choose(&cap(&any(1).unwrap()), &match_bytes(b"")).unwrap(),
    )
    .unwrap();
    let p = cap_s(&pow(&alt, 0).unwrap());
    let r = pattern_match(&p, b"abc", &[]).unwrap();
    assert_eq!(r.end(), Some(3));
    assert_eq!(r.captures().len(), 1);
    assert_eq!(text(&r.captures()[0]), b"abc");
}

#[test]
fn e5_balanced_parens_grammar() {
    let sigma = diff(&any(1).unwrap(), &set(b"()")).unwrap();
    let s_body = concat(
        &match_bytes(b"("),
        &concat(
            &pow(&choose(&var("S"), &sigma).unwrap(), 0).unwrap(),
            &match_bytes(b")"),
        ),
    );
    let g = grammar(&[("S".to_string(), s_body)], Some("S")).unwrap();
    let r = pattern_match(&g, b"(a(b)c)", &[]).unwrap();
    assert_eq!(r.end(), Some(7));
}

#[test]
fn e6_backreference_round_trip() {
    let p = concat(
        &concat(&cap_g(&match_bytes(b"x"), Some("g")), &any(1).unwrap()),
        &cap_b("g"),
    );
    let r = pattern_match(&p, b"xyz", &[]).unwrap();
    assert!(r.is_match());
    assert_eq!(r.captures().len(), 1);
    assert_eq!(text(&r.captures()[0]), b"x");
}

#[test]
fn e8_dummy_grammar_finds_literal_anywhere() {
    let g = dummy().unwrap();
    let r = pattern_match(&g, b"hello Omega world", &[]).unwrap();
    assert!(r.is_match());
}

#[test]
fn law1_true_is_concat_identity() {
    let a = match_bytes(b"xyz");
    assert_eq!(concat(&truth(), &a).body(), a.body());
    assert_eq!(concat(&a, &truth()).body(), a.body());
}

#[test]
fn law2_fail_absorbs_concat() {
    let a = match_bytes(b"xyz");
    let fail = bytepeg::fail();
    assert!(!pattern_match(&concat(&fail, &a), b"xyz", &[]).unwrap().is_match());
    assert!(!pattern_match(&concat(&a, &fail), b"xyz", &[]).unwrap().is_match());
}

#[test]
fn law3_fail_and_true_are_choice_identities() {
    let a = match_bytes(b"xyz");
    let fail = bytepeg::fail();
    let via_fail = choose(&fail, &a).unwrap();
    assert_eq!(
        pattern_match(&via_fail, b"xyz", &[]).unwrap().end(),
        pattern_match(&a, b"xyz", &[]).unwrap().end()
    );
    let via_true = choose(&truth(), &a).unwrap();
    assert_eq!(pattern_match(&via_true, b"xyz", &[]).unwrap().end(), Some(0));
}

#[test]
fn law4_concat_is_associative() {
    let a = match_bytes(b"a");
    let b = match_bytes(b"b");
    let c = match_bytes(b"c");
    let left = concat(&concat(&a, &b), &c);
    let right = concat(&a, &concat(&b, &c));
    for input in [&b"abc"[..], &b"abx"[..], &b""[..]] {
        assert_eq!(
            pattern_match(&left, input, &[]).unwrap().end(),
            pattern_match(&right, input, &[]).unwrap().end()
        );
    }
}

#[test]
fn law6_position_capture_reports_byte_index() {
    let p = concat(&bytepeg::cap_p(), &any(3).unwrap());
    let r = pattern_match(&p, b"abcdef", &[]).unwrap();
    assert_eq!(r.end(), Some(3));
    assert_eq!(r.captures().len(), 1);
    assert!(matches!(r.captures()[0], CapturedValue::Position(0)));
}

#[test]
fn law15_negation_and_lookahead_never_consume() {
    let a = match_bytes(b"a");
    let la = lookahead(&a).unwrap();
    let na = negate(&a).unwrap();
    assert_eq!(pattern_match(&la, b"abc", &[]).unwrap().end(), Some(0));
    assert_eq!(pattern_match(&na, b"xyz", &[]).unwrap().end(), Some(0));
}

#[test]
fn boundary14_any_past_255_decomposes_and_fails_cleanly_at_eof() {
    let p = any(256).unwrap();
    let long_enough = vec![b'x'; 256];
    assert!(pattern_match(&p, &long_enough, &[]).unwrap().is_match());
    let one_short = vec![b'x'; 255];
    assert!(!pattern_match(&p, &one_short, &[]).unwrap().is_match());
}

#[test]
fn boundary16_pow_at_most_over_head_fail_never_fails() {
    let a = match_bytes(b"a");
    let p = pow(&a, -3).unwrap();
    for input in [&b""[..], &b"a"[..], &b"aa"[..], &b"aaa"[..], &b"aaaa"[..]] {
        assert!(pattern_match(&p, input, &[]).unwrap().is_match());
    }
    assert_eq!(pattern_match(&p, b"aaaa", &[]).unwrap().end(), Some(3));
}
