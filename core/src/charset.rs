//! 256-bit byte-membership set, the `Charset` primitive from the instruction
//! model (spec §3). Membership is a bit lookup, mirroring the
//! `IN_CHARSET`/`SET_CHARSET` macros of the C original this crate's design is
//! grounded on (`examples/original_source/cpeg.c`), but expressed as a small
//! value type instead of a raw byte array + macros.

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;

/// A 256-bit vector of byte membership, one bit per possible input byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Charset([u64; 4]);

assert_eq_size!(Charset, [u64; 4]);

impl Charset {
    /// The empty set: matches no byte.
    pub const fn empty() -> Self {
        Charset([0; 4])
    }

    /// The full set: matches every byte.
    pub const fn full() -> Self {
        Charset([u64::MAX; 4])
    }

    #[inline]
    const fn word_bit(byte: u8) -> (usize, u64) {
        let b = byte as usize;
        (b / 64, 1u64 << (b % 64))
    }

    /// Add `byte` to the set.
    #[inline]
    pub fn insert(&mut self, byte: u8) {
        let (word, bit) = Self::word_bit(byte);
        self.0[word] |= bit;
    }

    /// Add every byte in an inclusive range.
    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        let mut b = lo as u16;
        while b <= hi as u16 {
            self.insert(b as u8);
            b += 1;
        }
    }

    /// Test whether `byte` is a member of the set.
    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        let (word, bit) = Self::word_bit(byte);
        self.0[word] & bit != 0
    }

    /// Build a set from an explicit list of member bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut cs = Self::empty();
        for &b in bytes {
            cs.insert(b);
        }
        cs
    }

    /// Build a set from `(lo, hi)` inclusive byte-range pairs.
    pub fn from_ranges(pairs: &[(u8, u8)]) -> Self {
        let mut cs = Self::empty();
        for &(lo, hi) in pairs {
            cs.insert_range(lo, hi);
        }
        cs
    }

    /// Union of two sets.
    pub fn union(&self, other: &Charset) -> Charset {
        let mut out = [0u64; 4];
        for i in 0..4 {
            out[i] = self.0[i] | other.0[i];
        }
        Charset(out)
    }

    /// Intersection of two sets.
    pub fn intersect(&self, other: &Charset) -> Charset {
        let mut out = [0u64; 4];
        for i in 0..4 {
            out[i] = self.0[i] & other.0[i];
        }
        Charset(out)
    }

    /// Complement of the set (every byte not in `self`).
    pub fn complement(&self) -> Charset {
        let mut out = [0u64; 4];
        for i in 0..4 {
            out[i] = !self.0[i];
        }
        Charset(out)
    }

    /// `self` with every byte in `other` removed.
    pub fn difference(&self, other: &Charset) -> Charset {
        self.intersect(&other.complement())
    }

    /// True if no byte is a member of both sets — used by the union
    /// combinator's "provably exclusive first-sets" optimization (spec
    /// §4.2).
    pub fn is_disjoint(&self, other: &Charset) -> bool {
        (0..4).all(|i| self.0[i] & other.0[i] == 0)
    }

    /// True if the set has no members at all.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// Number of member bytes.
    pub fn len(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }
}

impl core::fmt::Debug for Charset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Render as a compact list of ranges, e.g. Charset{'0'..'9', 'a'}
        write!(f, "Charset{{")?;
        let mut first = true;
        let mut b: u16 = 0;
        while b <= 255 {
            if self.contains(b as u8) {
                let start = b;
                while b <= 255 && self.contains(b as u8) {
                    b += 1;
                }
                let end = b - 1;
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                if start == end {
                    write!(f, "{:#04x}", start)?;
                } else {
                    write!(f, "{:#04x}..={:#04x}", start, end)?;
                }
            } else {
                b += 1;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_round_trips() {
        let cs = Charset::from_bytes(b"aeiou");
        for b in b"aeiou" {
            assert!(cs.contains(*b));
        }
        assert!(!cs.contains(b'x'));
    }

    #[test]
    fn ranges_are_inclusive() {
        let cs = Charset::from_ranges(&[(b'0', b'9')]);
        assert!(cs.contains(b'0'));
        assert!(cs.contains(b'9'));
        assert!(!cs.contains(b':'));
        assert!(!cs.contains(b'/'));
    }

    #[test]
    fn union_and_difference() {
        let digits = Charset::from_ranges(&[(b'0', b'9')]);
        let vowels = Charset::from_bytes(b"aeiou");
        let both = digits.union(&vowels);
        assert!(both.contains(b'5'));
        assert!(both.contains(b'a'));

        let not_digits = Charset::full().difference(&digits);
        assert!(!not_digits.contains(b'5'));
        assert!(not_digits.contains(b'a'));
    }

    #[test]
    fn disjointness() {
        let digits = Charset::from_ranges(&[(b'0', b'9')]);
        let vowels = Charset::from_bytes(b"aeiou");
        assert!(digits.is_disjoint(&vowels));
        assert!(!digits.is_disjoint(&Charset::from_bytes(b"5")));
    }
}
