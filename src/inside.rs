//! Inside alignment: total log-probability mass over all derivations.
//!
//! Scores are fixed-point integer log-odds combined with the table-driven
//! [`ilogsum`](crate::semiring::ilogsum); the reported score is converted
//! back to bits. There is no arg-max under this semiring, so no shadow
//! matrix and no traceback exist; the filled matrix is what the Outside
//! recursion consumes.

use crate::alphabet::Dsq;
use crate::band::Bands;
use crate::matrix::BandedMatrix;
use crate::model::Cm;
use crate::recursion::fill;
use crate::semiring::{scorify, LogSum};

/// Fixed-point score matrix for log-sum-exp fills.
pub type InsideMatrix = BandedMatrix<i32>;

/// Total alignment bit score. On return `mx` holds the complete Inside
/// matrix, with any local-begin mass already folded into the root cell.
pub fn score(cm: &Cm, dsq: &Dsq, bands: &Bands, mx: &mut InsideMatrix) -> f32 {
    assert!(!dsq.is_empty(), "cannot align an empty sequence");
    let j0 = dsq.len() as isize;
    scorify(fill::<LogSum>(cm, dsq, bands, 0, cm.m() - 1, 1, j0, mx, None).score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{Alphabet, K};
    use crate::model::{CmBuilder, StateType};

    #[test]
    fn two_derivations_sum_to_more_than_either() {
        // S may reach E through ML or through D + IL, both emitting one
        // residue; Inside must exceed either single path's score.
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let ml = b.state(StateType::ML, 1);
        let d = b.state(StateType::D, 1);
        let il = b.state(StateType::IL, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, ml, &[-1.0, -1.0]);
        b.transitions(ml, il, &[-1.0, 0.0]);
        b.transitions(d, il, &[-1.0, -2.0]);
        b.transitions(il, il, &[-4.0, -1.0]);
        b.emissions(ml, &[0.0; K]);
        b.emissions(il, &[0.0; K]);
        let cm = b.build();

        let dsq = cm.abc().digitize("A").unwrap();
        let bands = Bands::full(cm.m(), 1);
        let mut mx = InsideMatrix::new();
        let total = score(&cm, &dsq, &bands, &mut mx);
        // paths: S->ML->E (-1.0) and S->D->IL->E (-1 + -1 + -1 = wait)
        let path_a = -1.0 + 0.0; // S->ML, ML->E
        let path_b = -1.0 + -1.0 + -1.0; // S->D, D->IL, IL->E
        let exact = f32::log2(f32::exp2(path_a) + f32::exp2(path_b));
        assert!((total - exact).abs() < 0.01, "got {total}, want {exact}");
        assert!(total > path_a);
    }
}
