//! Digital RNA alphabet and 1-indexed digitized sequences.
//!
//! Residues are stored as small integer codes: `0..K` are the canonical
//! nucleotides (A, C, G, U), codes `K..` are degenerate symbols (N, R, Y, ...)
//! carrying a membership set over the canonical residues. Emission lookups
//! for degenerate codes average over the member residues.

/// Number of canonical RNA residues.
pub const K: usize = 4;

const CANONICAL: [char; K] = ['A', 'C', 'G', 'U'];

/// Degenerate symbols and their canonical membership sets (IUPAC).
const DEGENERATE: [(char, [bool; K]); 11] = [
    ('R', [true, false, true, false]),  // A/G
    ('Y', [false, true, false, true]),  // C/U
    ('M', [true, true, false, false]),  // A/C
    ('K', [false, false, true, true]),  // G/U
    ('S', [false, true, true, false]),  // C/G
    ('W', [true, false, false, true]),  // A/U
    ('H', [true, true, false, true]),   // not G
    ('B', [false, true, true, true]),   // not A
    ('V', [true, true, true, false]),   // not U
    ('D', [true, false, true, true]),   // not C
    ('N', [true, true, true, true]),
];

/// The digital RNA alphabet.
///
/// Cheap to clone; models own one. `kp()` is the total number of codes
/// (canonical plus degenerate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    degen: Vec<[bool; K]>,
}

impl Alphabet {
    /// The standard RNA alphabet with IUPAC degeneracy codes.
    pub fn rna() -> Self {
        Self {
            degen: DEGENERATE.iter().map(|&(_, set)| set).collect(),
        }
    }

    /// Number of canonical residues.
    #[inline]
    pub fn k(&self) -> usize {
        K
    }

    /// Total number of residue codes, canonical and degenerate.
    #[inline]
    pub fn kp(&self) -> usize {
        K + self.degen.len()
    }

    /// True if `code` is a canonical residue.
    #[inline]
    pub fn is_canonical(&self, code: u8) -> bool {
        (code as usize) < K
    }

    /// Map a residue character to its code. `T` is accepted as `U`.
    pub fn code_of(&self, ch: char) -> Option<u8> {
        let ch = ch.to_ascii_uppercase();
        let ch = if ch == 'T' { 'U' } else { ch };
        if let Some(i) = CANONICAL.iter().position(|&c| c == ch) {
            return Some(i as u8);
        }
        DEGENERATE
            .iter()
            .position(|&(c, _)| c == ch)
            .map(|i| (K + i) as u8)
    }

    /// Canonical residues a (possibly degenerate) code may stand for.
    pub fn members(&self, code: u8) -> impl Iterator<Item = u8> + '_ {
        let set: [bool; K] = if (code as usize) < K {
            let mut s = [false; K];
            s[code as usize] = true;
            s
        } else {
            self.degen[code as usize - K]
        };
        (0..K as u8).filter(move |&r| set[r as usize])
    }

    /// Number of canonical residues in a code's membership set.
    pub fn ndegen(&self, code: u8) -> usize {
        self.members(code).count()
    }

    /// Digitize a text sequence. Returns `None` on the first unknown symbol.
    pub fn digitize(&self, text: &str) -> Option<Dsq> {
        let mut codes = Vec::with_capacity(text.len() + 1);
        codes.push(u8::MAX); // position 0 is a sentinel
        for ch in text.chars() {
            codes.push(self.code_of(ch)?);
        }
        Some(Dsq { codes })
    }
}

/// A digitized sequence, indexed 1..=L to match the DP recursions.
///
/// Position 0 holds a sentinel and must never be read as a residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsq {
    codes: Vec<u8>,
}

impl Dsq {
    /// Build from raw codes (1-indexed content; the sentinel is added here).
    pub fn from_codes(codes: &[u8]) -> Self {
        let mut v = Vec::with_capacity(codes.len() + 1);
        v.push(u8::MAX);
        v.extend_from_slice(codes);
        Self { codes: v }
    }

    /// Sequence length L.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len() - 1
    }

    /// True if the sequence has no residues.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Residue code at 1-based position `i`.
    ///
    /// # Panics
    /// Panics if `i` is outside `1..=L`; the recursions only ever form
    /// in-range positions, so an out-of-range read is a caller bug.
    #[inline]
    pub fn code(&self, i: isize) -> u8 {
        assert!(
            i >= 1 && (i as usize) < self.codes.len(),
            "sequence position {i} out of range 1..={}",
            self.len()
        );
        self.codes[i as usize]
    }
}
