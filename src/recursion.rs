//! The banded CYK/Inside fill, generic over the score semiring.
//!
//! One recursion body serves both algorithms: instantiated at
//! [`MaxPlus`](crate::semiring::MaxPlus) it computes the single best
//! derivation (CYK, optionally recording a shadow matrix for traceback), at
//! [`LogSum`](crate::semiring::LogSum) it computes the total derivation mass
//! (Inside). States are processed in reverse index order, so every child
//! deck is complete before its parents read it; insert states additionally
//! need increasing `d` within a row so their self-transition reads the
//! already-finished shorter cell.
//!
//! Every child and split lookup goes through [`Bands::cell`], which takes
//! global signed coordinates and answers `None` for out-of-band cells; the
//! recursion simply skips those, which is what confines the fill to the
//! band.

use crate::alphabet::Dsq;
use crate::band::Bands;
use crate::matrix::BandedMatrix;
use crate::model::{Children, Cm, StateType};
use crate::semiring::{not_impossible, Semiring};
use crate::trace::{ShadowCell, ShadowMatrix};

/// Outcome of one fill.
pub(crate) struct FillResult<T> {
    /// Score of the root full-span cell after local-begin handling.
    pub score: T,
    /// Best local-begin entry state and its score, recorded by max-plus
    /// fills only.
    pub begin: Option<(usize, T)>,
}

/// Fill `mx` (and `shadow`, if given) for states `vroot..=vend` over the
/// subsequence `i0..=j0`, returning the root full-span score.
///
/// # Panics
/// Panics if the band excludes the root full-span cell or the band and
/// model disagree on the state count; both are caller bugs.
pub(crate) fn fill<S: Semiring>(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    vroot: usize,
    vend: usize,
    i0: isize,
    j0: isize,
    mx: &mut BandedMatrix<S::Score>,
    mut shadow: Option<&mut ShadowMatrix>,
) -> FillResult<S::Score> {
    assert!(vroot <= vend && vend < cm.m(), "bad state range {vroot}..={vend}");
    assert_eq!(bands.m(), cm.m(), "band covers a different state count");
    let w = j0 - i0 + 1;
    assert!(w >= 0 && j0 as usize <= dsq.len(), "bad span {i0}..={j0}");
    debug_assert!(
        (vroot..=vend).all(|v| bands.jmin(v) >= 0 && bands.jmax(v) <= j0),
        "band endpoints outside the aligned span"
    );

    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("dp_fill", vroot, vend, span = w).entered();

    mx.resize(bands, S::identity());
    if let Some(sh) = shadow.as_deref_mut() {
        sh.resize(bands, ShadowCell::UsedLocalEnd);
    }

    // EL self-loop score by number of residues the EL state accounts for.
    let el_sc: Vec<S::Score> = (0..=w as usize)
        .map(|d| S::scale(S::el_self_sc(cm), d))
        .collect();

    for v in (vroot..=vend).rev() {
        let ty = cm.ty(v);
        let sd = ty.delta() as isize;
        let sdr = ty.right_delta() as isize;

        // Cells that may exit into the EL self-loop start at that score
        // (the state's own emission is added in the main pass below).
        if cm.local_end && not_impossible(cm.end_sc(v)) {
            for j in bands.jmin(v)..=bands.jmax(v) {
                let (lo, hi) = bands.hd_range(v, j).unwrap();
                for d in lo.max(sd)..=hi {
                    let (jp, dp) = bands.cell(v, j, d).unwrap();
                    let sc = S::add(S::end_sc(cm, v), el_sc[(d - sd) as usize]);
                    mx.set(v, jp, dp, sc);
                }
            }
        }

        match *cm.children(v) {
            // End states close their subtree at zero length.
            Children::None => {
                for j in bands.jmin(v)..=bands.jmax(v) {
                    if let Some((jp, dp)) = bands.cell(v, j, 0) {
                        mx.set(v, jp, dp, S::zero());
                    }
                }
            }

            // Bifurcation: combine the left subtree over i..j-k with the
            // right subtree over j-k+1..j, for every split the bands allow.
            Children::Split { left, right } => {
                for j in bands.jmin(v)..=bands.jmax(v) {
                    let (lo, hi) = bands.hd_range(v, j).unwrap();
                    for d in lo..=hi {
                        let (jp, dp) = bands.cell(v, j, d).unwrap();
                        let mut cell = mx.get(v, jp, dp);
                        let mut split = None;
                        for k in 0..=d {
                            let Some((jp_y, dp_y)) = bands.cell(left, j - k, d - k) else {
                                continue;
                            };
                            let Some((jp_z, dp_z)) = bands.cell(right, j, k) else {
                                continue;
                            };
                            let cand =
                                S::add(mx.get(left, jp_y, dp_y), mx.get(right, jp_z, dp_z));
                            if S::accumulate(&mut cell, cand) {
                                split = Some(k);
                            }
                        }
                        mx.set(v, jp, dp, S::floor(cell));
                        if let (Some(sh), Some(k)) = (shadow.as_deref_mut(), split) {
                            sh.set(v, jp, dp, ShadowCell::Split(k as u32));
                        }
                    }
                }
            }

            // Ordinary states: fold each child's shorter cell through the
            // transition score, then add the state's own emission.
            Children::Range { first, n } => {
                for j in bands.jmin(v)..=bands.jmax(v) {
                    let (lo, hi) = bands.hd_range(v, j).unwrap();
                    for d in lo..=hi {
                        let (jp, dp) = bands.cell(v, j, d).unwrap();
                        let mut cell = mx.get(v, jp, dp);
                        let mut choice = None;
                        for yoffset in 0..n {
                            let y = first + yoffset;
                            let Some((jp_y, dp_y)) = bands.cell(y, j - sdr, d - sd) else {
                                continue;
                            };
                            let cand =
                                S::add(mx.get(y, jp_y, dp_y), S::tsc(cm, v, yoffset));
                            if S::accumulate(&mut cell, cand) {
                                choice = Some(yoffset);
                            }
                        }
                        if d >= sd {
                            let i = j - d + 1;
                            cell = match ty {
                                StateType::MP => S::add(
                                    cell,
                                    S::esc_pair(cm, v, dsq.code(i), dsq.code(j)),
                                ),
                                StateType::ML | StateType::IL => {
                                    S::add(cell, S::esc_single(cm, v, dsq.code(i)))
                                }
                                StateType::MR | StateType::IR => {
                                    S::add(cell, S::esc_single(cm, v, dsq.code(j)))
                                }
                                _ => cell,
                            };
                        }
                        mx.set(v, jp, dp, S::floor(cell));
                        if let (Some(sh), Some(off)) = (shadow.as_deref_mut(), choice) {
                            sh.set(v, jp, dp, ShadowCell::Child(off as u8));
                        }
                    }
                }
            }
        }
    }

    let (root_jp, root_dp) = bands.cell(vroot, j0, w).unwrap_or_else(|| {
        panic!("root state {vroot} band excludes the full span (j {j0}, d {w})")
    });

    // Local begins bypass the root's transitions: the best (max-plus) or
    // total (log-sum) entry mass competes with or folds into the root cell.
    let mut begin = None;
    if cm.local_begin && vroot == 0 {
        let mut bsc = S::identity();
        let mut entry = None;
        for y in 1..cm.m() {
            if !not_impossible(cm.begin_sc(y)) {
                continue;
            }
            let Some((jp_y, dp_y)) = bands.cell(y, j0, w) else { continue };
            let cand = S::add(mx.get(y, jp_y, dp_y), S::begin_sc(cm, y));
            if S::accumulate(&mut bsc, cand) {
                entry = Some(y);
            }
        }
        begin = entry.map(|y| (y, bsc));
        let mut cell = mx.get(vroot, root_jp, root_dp);
        if S::accumulate(&mut cell, bsc) {
            if let Some(sh) = shadow.as_deref_mut() {
                sh.set(vroot, root_jp, root_dp, ShadowCell::UsedLocalBegin);
            }
        }
        mx.set(vroot, root_jp, root_dp, cell);
    }

    FillResult {
        score: mx.get(vroot, root_jp, root_dp),
        begin,
    }
}
