//! Score semirings shared by the CYK, Inside and Outside recursions.
//!
//! The recursions have one shape and two combination rules: max-plus for the
//! single best derivation (CYK) and log-sum-exp for the total probability
//! mass (Inside/Outside). [`Semiring`] abstracts the combine operator, the
//! unreachable-cell identity, and the score tables used (a model carries
//! both float bit scores and fixed-point integer log-odds).
//!
//! Max-plus updates use a strict greater-than comparison, so on an exact tie
//! the first child encountered is retained. That is an implementation choice
//! kept for bit-for-bit traceback parity with reference scores, not a
//! semantic guarantee of the grammar.

use std::sync::OnceLock;

use crate::alphabet::K;
use crate::model::Cm;

/// Float sentinel for an unreachable DP cell.
pub const IMPOSSIBLE: f32 = -1.0e36;

/// A float score above this is considered possible.
#[inline]
pub fn not_impossible(sc: f32) -> bool {
    sc > -9.999e35
}

/// Integer sentinel for an unreachable DP cell (fixed-point scores).
pub const NEG_INFTY_I: i32 = -987_654_321;

/// Fixed-point scale: integer score units per bit.
pub const INTSCALE: f32 = 1000.0;

/// Entries in the log-sum-exp lookup table; differences at or beyond this
/// many integer units contribute nothing to the sum.
const LOGSUM_TBL: usize = 20_000;

fn logsum_table() -> &'static [i32; LOGSUM_TBL] {
    static TABLE: OnceLock<Box<[i32; LOGSUM_TBL]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = Box::new([0i32; LOGSUM_TBL]);
        for (i, slot) in t.iter_mut().enumerate() {
            // table[i] = INTSCALE * log2(1 + 2^(-i/INTSCALE))
            let x = 1.0 + f64::exp2(-(i as f64) / INTSCALE as f64);
            *slot = (INTSCALE as f64 * x.log2()).round() as i32;
        }
        t
    })
}

/// Table-driven log-sum-exp over scaled integer log-odds scores.
#[inline]
pub fn ilogsum(s1: i32, s2: i32) -> i32 {
    let (hi, lo) = if s1 >= s2 { (s1, s2) } else { (s2, s1) };
    if lo <= NEG_INFTY_I {
        return hi;
    }
    let diff = (hi - lo) as usize;
    if diff >= LOGSUM_TBL {
        hi
    } else {
        hi + logsum_table()[diff]
    }
}

/// Convert a fixed-point integer score to bits.
#[inline]
pub fn scorify(isc: i32) -> f32 {
    isc as f32 / INTSCALE
}

/// Quantize a float bit score to the fixed-point integer scale.
#[inline]
pub fn quantize(sc: f32) -> i32 {
    if not_impossible(sc) {
        (sc * INTSCALE).round() as i32
    } else {
        NEG_INFTY_I
    }
}

/// A combination rule plus the score tables it reads from the model.
///
/// One generic recursion body serves both instantiations; only
/// [`accumulate`](Semiring::accumulate) and the table accessors differ.
pub trait Semiring {
    /// Cell/score type: `f32` for max-plus, `i32` for log-sum-exp.
    type Score: Copy + PartialOrd + std::fmt::Debug;

    /// The unreachable-cell sentinel (the identity of `accumulate`).
    fn identity() -> Self::Score;

    /// The "no cost" score (empty derivation suffix).
    fn zero() -> Self::Score;

    /// Fold `cand` into `cell`. Returns true iff `cand` strictly replaced
    /// the old value; only max-plus ever answers true, where it drives
    /// shadow (arg-max) updates. Log-sum-exp accumulates and always
    /// returns false.
    fn accumulate(cell: &mut Self::Score, cand: Self::Score) -> bool;

    /// Score addition (sequential composition along a derivation).
    fn add(a: Self::Score, b: Self::Score) -> Self::Score;

    /// Clamp a score from below at the sentinel.
    fn floor(sc: Self::Score) -> Self::Score;

    /// `sc` accumulated `len` times (the EL self-loop over `len` residues).
    fn scale(sc: Self::Score, len: usize) -> Self::Score;

    /// Convert to bits for reporting.
    fn bits(sc: Self::Score) -> f32;

    fn tsc(cm: &Cm, v: usize, yoffset: usize) -> Self::Score;
    fn begin_sc(cm: &Cm, v: usize) -> Self::Score;
    fn end_sc(cm: &Cm, v: usize) -> Self::Score;
    fn el_self_sc(cm: &Cm) -> Self::Score;
    fn esc_single(cm: &Cm, v: usize, code: u8) -> Self::Score;
    fn esc_pair(cm: &Cm, v: usize, left: u8, right: u8) -> Self::Score;
}

/// Max-plus over float bit scores: best single derivation (CYK).
pub struct MaxPlus;

impl Semiring for MaxPlus {
    type Score = f32;

    #[inline]
    fn identity() -> f32 {
        IMPOSSIBLE
    }
    #[inline]
    fn zero() -> f32 {
        0.0
    }
    #[inline]
    fn accumulate(cell: &mut f32, cand: f32) -> bool {
        if cand > *cell {
            *cell = cand;
            true
        } else {
            false
        }
    }
    #[inline]
    fn add(a: f32, b: f32) -> f32 {
        a + b
    }
    #[inline]
    fn floor(sc: f32) -> f32 {
        sc.max(IMPOSSIBLE)
    }
    #[inline]
    fn scale(sc: f32, len: usize) -> f32 {
        sc * len as f32
    }
    #[inline]
    fn bits(sc: f32) -> f32 {
        sc
    }

    #[inline]
    fn tsc(cm: &Cm, v: usize, yoffset: usize) -> f32 {
        cm.tsc(v, yoffset)
    }
    #[inline]
    fn begin_sc(cm: &Cm, v: usize) -> f32 {
        cm.begin_sc(v)
    }
    #[inline]
    fn end_sc(cm: &Cm, v: usize) -> f32 {
        cm.end_sc(v)
    }
    #[inline]
    fn el_self_sc(cm: &Cm) -> f32 {
        cm.el_selfsc
    }
    #[inline]
    fn esc_single(cm: &Cm, v: usize, code: u8) -> f32 {
        cm.esc_single(v, code)
    }
    #[inline]
    fn esc_pair(cm: &Cm, v: usize, left: u8, right: u8) -> f32 {
        cm.esc_pair(v, left, right)
    }
}

/// Log-sum-exp over fixed-point integer log-odds: total derivation mass
/// (Inside/Outside). No arg-max exists, so no shadow is ever produced.
pub struct LogSum;

impl Semiring for LogSum {
    type Score = i32;

    #[inline]
    fn identity() -> i32 {
        NEG_INFTY_I
    }
    #[inline]
    fn zero() -> i32 {
        0
    }
    #[inline]
    fn accumulate(cell: &mut i32, cand: i32) -> bool {
        *cell = ilogsum(*cell, cand);
        false
    }
    #[inline]
    fn add(a: i32, b: i32) -> i32 {
        // Both operands are bounded below by NEG_INFTY_I, so the sum cannot
        // wrap; the floor pass restores the sentinel afterwards.
        a + b
    }
    #[inline]
    fn floor(sc: i32) -> i32 {
        sc.max(NEG_INFTY_I)
    }
    #[inline]
    fn scale(sc: i32, len: usize) -> i32 {
        if sc <= NEG_INFTY_I {
            NEG_INFTY_I
        } else {
            sc * len as i32
        }
    }
    #[inline]
    fn bits(sc: i32) -> f32 {
        scorify(sc)
    }

    #[inline]
    fn tsc(cm: &Cm, v: usize, yoffset: usize) -> i32 {
        cm.itsc(v, yoffset)
    }
    #[inline]
    fn begin_sc(cm: &Cm, v: usize) -> i32 {
        cm.ibegin_sc(v)
    }
    #[inline]
    fn end_sc(cm: &Cm, v: usize) -> i32 {
        cm.iend_sc(v)
    }
    #[inline]
    fn el_self_sc(cm: &Cm) -> i32 {
        cm.iel_selfsc
    }
    #[inline]
    fn esc_single(cm: &Cm, v: usize, code: u8) -> i32 {
        cm.iesc_single(v, code)
    }
    #[inline]
    fn esc_pair(cm: &Cm, v: usize, left: u8, right: u8) -> i32 {
        cm.iesc_pair(v, left, right)
    }
}

/// Average a set of scores; used for degenerate-residue emission lookups.
pub(crate) fn avg_f(scores: impl Iterator<Item = f32>) -> f32 {
    let (mut sum, mut n) = (0.0f32, 0usize);
    for s in scores {
        sum += s;
        n += 1;
    }
    if n == 0 {
        IMPOSSIBLE
    } else {
        (sum / n as f32).max(IMPOSSIBLE)
    }
}

/// Integer counterpart of [`avg_f`].
pub(crate) fn avg_i(scores: impl Iterator<Item = i32>) -> i32 {
    let (mut sum, mut n) = (0.0f64, 0usize);
    for s in scores {
        if s <= NEG_INFTY_I {
            return NEG_INFTY_I;
        }
        sum += s as f64;
        n += 1;
    }
    if n == 0 {
        NEG_INFTY_I
    } else {
        (sum / n as f64).round() as i32
    }
}

/// Pair emission index for canonical codes: `left * K + right`.
#[inline]
pub fn pair_idx(left: u8, right: u8) -> usize {
    left as usize * K + right as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilogsum_identity_absorbed() {
        assert_eq!(ilogsum(NEG_INFTY_I, -1500), -1500);
        assert_eq!(ilogsum(-1500, NEG_INFTY_I), -1500);
    }

    #[test]
    fn ilogsum_equal_args_gains_one_bit() {
        // log2(2^x + 2^x) = x + 1, i.e. +INTSCALE integer units.
        let x = -2000;
        assert_eq!(ilogsum(x, x), x + INTSCALE as i32);
    }

    #[test]
    fn ilogsum_matches_float_reference() {
        let cases = [(-1000, -2000), (0, -3500), (-12, -17), (-5000, -5001)];
        for &(a, b) in &cases {
            let exact = (f64::exp2(a as f64 / 1000.0) + f64::exp2(b as f64 / 1000.0)).log2() * 1000.0;
            let got = ilogsum(a, b) as f64;
            assert!(
                (got - exact).abs() <= 1.0,
                "ilogsum({a},{b}) = {got}, want ~{exact}"
            );
        }
    }

    #[test]
    fn ilogsum_large_gap_returns_max() {
        assert_eq!(ilogsum(0, -(LOGSUM_TBL as i32)), 0);
    }

    #[test]
    fn max_plus_first_max_wins_on_tie() {
        let mut cell = IMPOSSIBLE;
        assert!(MaxPlus::accumulate(&mut cell, 1.5));
        // exact tie: strict > comparison keeps the first value
        assert!(!MaxPlus::accumulate(&mut cell, 1.5));
        assert!(MaxPlus::accumulate(&mut cell, 1.6));
    }

    #[test]
    fn quantize_round_trip() {
        assert_eq!(quantize(1.234), 1234);
        assert_eq!(quantize(IMPOSSIBLE), NEG_INFTY_I);
        assert!((scorify(quantize(-3.141)) + 3.141).abs() < 1e-3);
    }
}
