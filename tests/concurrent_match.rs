//! A `Pattern` is `Send + Sync`; two threads may run `pattern_match` on the
//! same pattern concurrently without synchronization (`SPEC_FULL.md` §5).

use bytepeg::{cap, match_bytes, pattern_match, pow, set};

#[test]
fn pattern_is_shared_safely_across_threads() {
    let digit = set(b"0123456789");
    let number = cap(&pow(&digit, 1).unwrap());

    std::thread::scope(|scope| {
        for i in 0..8 {
            let number = &number;
            scope.spawn(move || {
                let input = format!("{}{}", "1".repeat(i + 1), "x");
                let r = pattern_match(number, input.as_bytes(), &[]).unwrap();
                assert_eq!(r.end(), Some(i + 1));
            });
        }
    });
}

#[test]
fn literal_pattern_matches_from_multiple_threads_at_once() {
    let p = match_bytes(b"hello");
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let p = &p;
            scope.spawn(move || {
                assert!(pattern_match(p, b"hello world", &[]).unwrap().is_match());
            });
        }
    });
}
