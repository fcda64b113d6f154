//! Outside alignment: log-probability mass outside each state's subtree.
//!
//! Runs over the fixed-point log-sum-exp scores and consumes a completed
//! Inside matrix (bifurcation siblings and the optional consistency check
//! both need Inside values). States are processed in forward index order,
//! so every parent's deck is complete before its children read it.
//!
//! The virtual EL state has no band; its deck covers every `(j, d)` with
//! `d <= j` and is filled from each local-end-capable state as that state's
//! deck completes, then closed with the EL self-loop sweep.

use thiserror::Error;

use crate::alphabet::Dsq;
use crate::band::Bands;
use crate::inside::InsideMatrix;
use crate::matrix::BandedMatrix;
use crate::model::{BifSide, Cm, StateType};
use crate::semiring::{ilogsum, not_impossible, scorify, NEG_INFTY_I};

/// Fixed-point score matrix for the Outside recursion.
pub type OutsideMatrix = BandedMatrix<i32>;

/// The virtual EL state's Outside deck, kept outside the banded matrix
/// because EL has no band: row `j` holds `d` in `0..=j`. Downstream
/// posterior work combines it with the Inside EL contributions.
#[derive(Debug, Clone, Default)]
pub struct ElDeck {
    rows: Vec<Vec<i32>>,
}

impl ElDeck {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, j0: usize) {
        self.rows.clear();
        self.rows.extend((0..=j0).map(|j| vec![NEG_INFTY_I; j + 1]));
    }

    /// Fixed-point outside score of an EL visit ending at `j` with span
    /// length `d`.
    #[inline]
    pub fn get(&self, j: usize, d: usize) -> i32 {
        self.rows[j][d]
    }

    #[inline]
    fn set(&mut self, j: usize, d: usize, sc: i32) {
        self.rows[j][d] = sc;
    }

    /// [`get`](ElDeck::get), converted to bits.
    pub fn bits(&self, j: usize, d: usize) -> f32 {
        scorify(self.rows[j][d])
    }
}

/// One node where Outside and Inside disagree on the total mass.
#[derive(Debug, Clone, Copy)]
pub struct NodeDeviation {
    pub node: usize,
    /// Total mass through the node's split states, bits.
    pub node_sc: f32,
    /// The Inside total the node should reproduce, bits.
    pub inside_sc: f32,
    pub diff: f32,
}

/// The per-node consistency check failed; every deviating node is listed.
#[derive(Debug, Clone, Error)]
#[error("outside/inside totals disagree at {} of {nodes_checked} nodes", deviations.len())]
pub struct PosteriorCheckError {
    pub nodes_checked: usize,
    pub deviations: Vec<NodeDeviation>,
}

/// Total alignment bit score from the Outside direction. On return `mx`
/// holds the complete Outside matrix and `el` the EL deck (all sentinel
/// when local ends are off).
///
/// With local ends off the score is read from the final end state's empty
/// spans; with local ends on that column does not carry the EL mass, so
/// the Inside root cell's score is reported instead.
pub fn score(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    inside: &InsideMatrix,
    mx: &mut OutsideMatrix,
    el: &mut ElDeck,
) -> f32 {
    fill_outside(cm, dsq, bands, inside, mx, el)
}

/// [`score`], followed by the per-node consistency check: for every node,
/// the mass through its split states must reproduce the Inside root cell's
/// total within 0.01 bits. All nodes are scanned and every deviation is
/// reported.
///
/// # Panics
/// Panics if local ends are enabled; split states do not account for EL
/// mass, so the check is meaningless there.
pub fn score_checked(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    inside: &InsideMatrix,
    mx: &mut OutsideMatrix,
) -> Result<f32, PosteriorCheckError> {
    assert!(
        !cm.local_end,
        "the outside consistency check requires local ends to be disabled"
    );
    let mut el = ElDeck::new();
    let sc = fill_outside(cm, dsq, bands, inside, mx, &mut el);
    // The check's reference is the Inside total, not the Outside-derived
    // one; a defect that skews both directions alike must still show.
    let j0 = dsq.len() as isize;
    let (jp, dp) = bands
        .cell(0, j0, j0)
        .unwrap_or_else(|| panic!("root band excludes the full span (j {j0}, d {j0})"));
    let inside_sc = scorify(inside.get(0, jp, dp));
    check(cm, bands, inside, mx, inside_sc).map(|()| sc)
}

fn fill_outside(
    cm: &Cm,
    dsq: &Dsq,
    bands: &Bands,
    inside: &InsideMatrix,
    mx: &mut OutsideMatrix,
    el: &mut ElDeck,
) -> f32 {
    assert!(!dsq.is_empty(), "cannot align an empty sequence");
    assert_eq!(bands.m(), cm.m(), "band covers a different state count");
    assert_eq!(
        inside.ncells(),
        bands.ncells(),
        "inside matrix was filled under a different band"
    );
    let j0 = dsq.len() as isize;
    let w = j0;
    debug_assert!(
        (0..cm.m()).all(|v| bands.jmin(v) >= 0 && bands.jmax(v) <= j0),
        "band endpoints outside the aligned span"
    );

    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("outside_fill", m = cm.m(), span = w).entered();

    mx.resize(bands, NEG_INFTY_I);
    el.reset(j0 as usize);

    let (root_jp, root_dp) = bands
        .cell(0, j0, w)
        .unwrap_or_else(|| panic!("root band excludes the full span (j {j0}, d {w})"));
    mx.set(0, root_jp, root_dp, 0);

    // Local begins: entry states see the whole outside world at once.
    if cm.local_begin {
        for y in 1..cm.m() {
            if !not_impossible(cm.begin_sc(y)) {
                continue;
            }
            if let Some((jp, dp)) = bands.cell(y, j0, w) {
                mx.set(y, jp, dp, cm.ibegin_sc(y));
            }
        }
    }

    for v in 1..cm.m() {
        if let Some((y, side)) = cm.bif_parent(v) {
            let (left, right) = cm.bif_children(y);
            match side {
                // Left start: the right sibling's Inside mass covers the k
                // residues between this fragment and the parent's endpoint.
                BifSide::Left => {
                    for j in bands.jmin(v)..=bands.jmax(v) {
                        let (lo, hi) = bands.hd_range(v, j).unwrap();
                        for d in lo..=hi {
                            let (jp, dp) = bands.cell(v, j, d).unwrap();
                            let mut cell = mx.get(v, jp, dp);
                            for k in 0..=(j0 - j) {
                                let Some((pjp, pdp)) = bands.cell(y, j + k, d + k) else {
                                    continue;
                                };
                                let Some((sjp, sdp)) = bands.cell(right, j + k, k) else {
                                    continue;
                                };
                                cell = ilogsum(
                                    cell,
                                    mx.get(y, pjp, pdp) + inside.get(right, sjp, sdp),
                                );
                            }
                            mx.set(v, jp, dp, cell);
                        }
                    }
                }
                // Right start: the left sibling's Inside mass covers the k
                // residues ending just before this fragment.
                BifSide::Right => {
                    for j in bands.jmin(v)..=bands.jmax(v) {
                        let (lo, hi) = bands.hd_range(v, j).unwrap();
                        for d in lo..=hi {
                            let (jp, dp) = bands.cell(v, j, d).unwrap();
                            let i = j - d + 1;
                            let mut cell = mx.get(v, jp, dp);
                            for k in 0..i {
                                let Some((pjp, pdp)) = bands.cell(y, j, d + k) else {
                                    continue;
                                };
                                let Some((sjp, sdp)) = bands.cell(left, i - 1, k) else {
                                    continue;
                                };
                                cell = ilogsum(
                                    cell,
                                    mx.get(y, pjp, pdp) + inside.get(left, sjp, sdp),
                                );
                            }
                            mx.set(v, jp, dp, cell);
                        }
                    }
                }
            }
        } else {
            // Ordinary state: fold every range parent, widening the span by
            // whatever the parent itself emits. `j` and `d` both run
            // downward so that an insert's self-parent cell at `(j, d + 1)`
            // (IL) or `(j + 1, d + 1)` (IR) is final before it is read.
            for j in (bands.jmin(v)..=bands.jmax(v)).rev() {
                let (lo, hi) = bands.hd_range(v, j).unwrap();
                for d in (lo..=hi).rev() {
                    let (jp, dp) = bands.cell(v, j, d).unwrap();
                    let i = j - d + 1;
                    let mut cell = mx.get(v, jp, dp);
                    for &y in cm.parents(v) {
                        let voffset = cm.transition_offset(y, v);
                        let itsc = cm.itsc(y, voffset);
                        // Saturating adds: three sentinel operands would
                        // otherwise wrap an i32; ilogsum treats anything at
                        // or below the sentinel as no mass.
                        let cand = match cm.ty(y) {
                            StateType::MP => bands.cell(y, j + 1, d + 2).map(|(pjp, pdp)| {
                                mx.get(y, pjp, pdp).saturating_add(itsc).saturating_add(
                                    cm.iesc_pair(y, dsq.code(i - 1), dsq.code(j + 1)),
                                )
                            }),
                            StateType::ML | StateType::IL => {
                                bands.cell(y, j, d + 1).map(|(pjp, pdp)| {
                                    mx.get(y, pjp, pdp)
                                        .saturating_add(itsc)
                                        .saturating_add(cm.iesc_single(y, dsq.code(i - 1)))
                                })
                            }
                            StateType::MR | StateType::IR => {
                                bands.cell(y, j + 1, d + 1).map(|(pjp, pdp)| {
                                    mx.get(y, pjp, pdp)
                                        .saturating_add(itsc)
                                        .saturating_add(cm.iesc_single(y, dsq.code(j + 1)))
                                })
                            }
                            _ => bands
                                .cell(y, j, d)
                                .map(|(pjp, pdp)| mx.get(y, pjp, pdp).saturating_add(itsc)),
                        };
                        if let Some(cand) = cand {
                            cell = ilogsum(cell, cand);
                        }
                    }
                    mx.set(v, jp, dp, cell.max(NEG_INFTY_I));
                }
            }
        }

        // Local end: v's outside mass, plus its own emission and the end
        // transition, flows into the EL cell spanning what v leaves behind.
        if cm.local_end && not_impossible(cm.end_sc(v)) {
            let ty = cm.ty(v);
            let sd = ty.delta() as isize;
            let sdr = ty.right_delta() as isize;
            for j in bands.jmin(v)..=bands.jmax(v) {
                let (lo, hi) = bands.hd_range(v, j).unwrap();
                for d in lo.max(sd)..=hi {
                    let (jp, dp) = bands.cell(v, j, d).unwrap();
                    let beta_v = mx.get(v, jp, dp);
                    if beta_v <= NEG_INFTY_I {
                        continue;
                    }
                    let i = j - d + 1;
                    let esc = match ty {
                        StateType::MP => cm.iesc_pair(v, dsq.code(i), dsq.code(j)),
                        StateType::ML | StateType::IL => cm.iesc_single(v, dsq.code(i)),
                        StateType::MR | StateType::IR => cm.iesc_single(v, dsq.code(j)),
                        _ => 0,
                    };
                    let (elj, eld) = ((j - sdr) as usize, (d - sd) as usize);
                    el.set(elj, eld, ilogsum(el.get(elj, eld), beta_v + cm.iend_sc(v) + esc));
                }
            }
        }
    }

    // EL self-loop closure: shrinking an EL span by one residue costs one
    // self-transition, so sweep d downward.
    if cm.local_end {
        for j in 0..=j0 as usize {
            for d in (0..j).rev() {
                el.set(j, d, ilogsum(el.get(j, d), el.get(j, d + 1) + cm.iel_selfsc));
            }
        }
    }

    if cm.local_end {
        scorify(inside.get(0, root_jp, root_dp))
    } else {
        // Sum the final end state's empty spans: every complete derivation
        // passes through exactly one of them.
        let last = cm.m() - 1;
        assert!(
            cm.ty(last) == StateType::E,
            "the last model state must be an end state"
        );
        let mut total = NEG_INFTY_I;
        for j in bands.jmin(last)..=bands.jmax(last) {
            if let Some((jp, dp)) = bands.cell(last, j, 0) {
                total = ilogsum(total, mx.get(last, jp, dp));
            }
        }
        scorify(total)
    }
}

fn check(
    cm: &Cm,
    bands: &Bands,
    inside: &InsideMatrix,
    outside: &OutsideMatrix,
    total_sc: f32,
) -> Result<(), PosteriorCheckError> {
    let mut deviations = Vec::new();
    for n in 0..cm.node_count() {
        let mut sc = NEG_INFTY_I;
        for &v in cm.split_states(n) {
            for j in bands.jmin(v)..=bands.jmax(v) {
                let (lo, hi) = bands.hd_range(v, j).unwrap();
                for d in lo..=hi {
                    let (jp, dp) = bands.cell(v, j, d).unwrap();
                    sc = ilogsum(sc, inside.get(v, jp, dp) + outside.get(v, jp, dp));
                }
            }
        }
        let node_sc = scorify(sc);
        let diff = node_sc - total_sc;
        if diff.abs() > 0.01 {
            deviations.push(NodeDeviation {
                node: n,
                node_sc,
                inside_sc: total_sc,
                diff,
            });
        }
    }
    if deviations.is_empty() {
        Ok(())
    } else {
        Err(PosteriorCheckError {
            nodes_checked: cm.node_count(),
            deviations,
        })
    }
}
