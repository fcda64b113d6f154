//! CYK alignment: the single best derivation of a sequence.

use crate::alphabet::Dsq;
use crate::band::Bands;
use crate::matrix::BandedMatrix;
use crate::model::Cm;
use crate::parsetree::ParseTree;
use crate::recursion::fill;
use crate::semiring::{not_impossible, MaxPlus};
use crate::trace::{traceback, ShadowMatrix};
use crate::AlignError;

/// Float score matrix for max-plus fills.
pub type CykMatrix = BandedMatrix<f32>;

fn span_of(dsq: &Dsq) -> (isize, isize) {
    assert!(!dsq.is_empty(), "cannot align an empty sequence");
    (1, dsq.len() as isize)
}

/// Optimal alignment bit score. No shadow matrix is kept, so no traceback
/// is possible afterwards; use [`align`] for that.
pub fn score(cm: &Cm, dsq: &Dsq, bands: &Bands, mx: &mut CykMatrix) -> f32 {
    score_with_begin(cm, dsq, bands, mx).0
}

/// Optimal score plus the best local-begin entry, `(state, score through
/// that entry)`. Divide-and-conquer callers compare the pair against the
/// root's own score to decide where to split; `None` when local begins are
/// off or no entry state's full-span cell is reachable.
pub fn score_with_begin(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    mx: &mut CykMatrix,
) -> (f32, Option<(usize, f32)>) {
    let (i0, j0) = span_of(dsq);
    let res = fill::<MaxPlus>(cm, dsq, bands, 0, cm.m() - 1, i0, j0, mx, None);
    (res.score, res.begin)
}

/// Optimal alignment score plus its derivation tree.
///
/// The matrices are reshaped for the band and fully overwritten; passing
/// the same ones across calls reuses their allocations.
pub fn align(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    mx: &mut CykMatrix,
    shadow: &mut ShadowMatrix,
) -> Result<(f32, ParseTree), AlignError> {
    let (i0, j0) = span_of(dsq);
    let res = fill::<MaxPlus>(cm, dsq, bands, 0, cm.m() - 1, i0, j0, mx, Some(shadow));
    if !not_impossible(res.score) {
        return Err(AlignError::Infeasible);
    }
    let tr = traceback(cm, bands, shadow, res.begin.map(|(y, _)| y), 0, i0, j0);
    Ok((res.score, tr))
}

/// Align against the subtree rooted at `r` only, entered through a local
/// begin whose transition score is charged to the result. The tree is
/// seeded root -> `r` so it re-scores to the returned value.
///
/// # Panics
/// Panics if `r` is not a legal local entry state.
pub fn align_subtree(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    r: usize,
    mx: &mut CykMatrix,
    shadow: &mut ShadowMatrix,
) -> Result<(f32, ParseTree), AlignError> {
    let (i0, j0) = span_of(dsq);
    if r == 0 {
        return align(cm, dsq, bands, mx, shadow);
    }
    assert!(
        not_impossible(cm.begin_sc(r)),
        "state {r} is not a legal local entry"
    );
    let res = fill::<MaxPlus>(cm, dsq, bands, r, cm.subtree_end(r), i0, j0, mx, Some(shadow));
    if !not_impossible(res.score) {
        return Err(AlignError::Infeasible);
    }
    let tr = traceback(cm, bands, shadow, None, r, i0, j0);
    Ok((res.score + cm.begin_sc(r), tr))
}
