//! Shadow matrix and traceback.
//!
//! During a max-plus fill, every cell records which choice produced its best
//! score as a [`ShadowCell`]. Traceback then replays those choices from the
//! root cell down to the end states, building a [`ParseTree`]. The walk is
//! iterative with an explicit stack: descending into a bifurcation's left
//! subtree pushes the right fragment, and reaching an E or EL state pops it.

use crate::band::Bands;
use crate::matrix::BandedMatrix;
use crate::model::{Cm, StateType};
use crate::parsetree::ParseTree;

/// The arg-max choice recorded for one DP cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowCell {
    /// Best child, as an offset into the state's transition table.
    Child(u8),
    /// Bifurcation split: the right fragment has this length `k`.
    Split(u32),
    /// The cell's best derivation exits into the EL self-loop.
    UsedLocalEnd,
    /// The root cell's best derivation enters the model below the root
    /// through the local-begin channel.
    UsedLocalBegin,
}

/// Shadow decks share the banded layout of the score matrix. Cells start as
/// [`ShadowCell::UsedLocalEnd`] and are overwritten wherever a real choice
/// wins; unreachable cells are never read back.
pub type ShadowMatrix = BandedMatrix<ShadowCell>;

fn in_band(bands: &Bands, v: usize, j: isize, d: isize) -> (usize, usize) {
    bands
        .cell(v, j, d)
        .unwrap_or_else(|| panic!("traceback left the band at state {v}, j {j}, d {d}"))
}

/// Rebuild the optimal derivation recorded in `shadow`.
///
/// `r` is the state the alignment entered at (the root, unless a subtree
/// fill was requested); `local_begin` is the entry state recorded by the
/// fill's local-begin channel, consulted only when the root cell says
/// [`ShadowCell::UsedLocalBegin`].
///
/// # Panics
/// Panics if the walk reaches a cell outside the band or a shadow cell
/// inconsistent with the state's type; both mean the shadow and band
/// disagree, which is a caller bug.
pub fn traceback(
    cm: &Cm,
    bands: &Bands,
    shadow: &ShadowMatrix,
    local_begin: Option<usize>,
    r: usize,
    i0: isize,
    j0: isize,
) -> ParseTree {
    let mut tr = ParseTree::new();
    let mut cur = tr.attach(None, 0, i0, j0);
    if r != 0 {
        // A subtree fill enters through a local begin whether or not r is
        // also a graph child of the root, so the edge is marked explicitly.
        cur = tr.attach(Some(cur), r, i0, j0);
        tr.mark_local_begin(cur);
    }
    let mut v = r;
    let mut i = i0;
    let mut j = j0;
    // Right fragments pending: (j, k, tree index of the bifurcation node).
    let mut pending: Vec<(isize, isize, usize)> = Vec::new();

    loop {
        if v == cm.el_state() || cm.ty(v) == StateType::E {
            let Some((pj, k, bif)) = pending.pop() else {
                break;
            };
            j = pj;
            i = j - k + 1;
            let (_, right) = cm.bif_children(tr.node(bif).state);
            cur = tr.attach(Some(bif), right, i, j);
            v = right;
            continue;
        }

        let d = j - i + 1;
        let (jp, dp) = in_band(bands, v, j, d);

        if cm.ty(v) == StateType::B {
            let k = match shadow.get(v, jp, dp) {
                ShadowCell::Split(k) => k as isize,
                other => panic!("bifurcation state {v} holds {other:?}"),
            };
            pending.push((j, k, cur));
            let (left, _) = cm.bif_children(v);
            j -= k;
            cur = tr.attach(Some(cur), left, i, j);
            v = left;
            continue;
        }

        let choice = shadow.get(v, jp, dp);
        i += cm.ty(v).left_delta() as isize;
        j -= cm.ty(v).right_delta() as isize;
        match choice {
            ShadowCell::Child(off) => {
                let (first, n) = cm
                    .child_range(v)
                    .unwrap_or_else(|| panic!("state {v} has no child range"));
                assert!((off as usize) < n, "child offset {off} out of range at state {v}");
                v = first + off as usize;
                cur = tr.attach(Some(cur), v, i, j);
            }
            ShadowCell::UsedLocalEnd => {
                v = cm.el_state();
                cur = tr.attach(Some(cur), v, i, j);
            }
            ShadowCell::UsedLocalBegin => {
                assert_eq!(v, 0, "local begin recorded away from the root");
                let b = local_begin
                    .expect("shadow says local begin but no entry state was recorded");
                cur = tr.attach(Some(cur), b, i, j);
                tr.mark_local_begin(cur);
                v = b;
            }
            ShadowCell::Split(_) => panic!("split choice at non-bifurcation state {v}"),
        }
    }
    tr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{Alphabet, K};
    use crate::model::CmBuilder;

    #[test]
    fn linear_walk_consumes_residues() {
        // S -> MP -> E over "GC"
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let mp = b.state(StateType::MP, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, mp, &[0.0]);
        b.transitions(mp, e, &[0.0]);
        b.emissions(mp, &[0.0; K * K]);
        let cm = b.build();

        let bands = Bands::full(cm.m(), 2);
        let mut shadow = ShadowMatrix::sized(&bands, ShadowCell::UsedLocalEnd);
        let (jp, dp) = bands.cell(s, 2, 2).unwrap();
        shadow.set(s, jp, dp, ShadowCell::Child(0));
        let (jp, dp) = bands.cell(mp, 2, 2).unwrap();
        shadow.set(mp, jp, dp, ShadowCell::Child(0));

        let tr = traceback(&cm, &bands, &shadow, None, 0, 1, 2);
        assert_eq!(tr.len(), 3);
        assert_eq!(tr.node(1).state, mp);
        assert_eq!((tr.node(1).i, tr.node(1).j), (1, 2));
        assert_eq!((tr.node(2).i, tr.node(2).j), (2, 1)); // E, empty span
        assert_eq!(tr.emitted_len(&cm), 2);
    }

    #[test]
    fn bifurcation_pops_right_fragment() {
        // S -> B -> (S ML E | S MR E) over a 2-mer split 1+1
        let mut bl = CmBuilder::new(Alphabet::rna());
        let s = bl.state(StateType::S, 0);
        let bi = bl.state(StateType::B, 1);
        let s1 = bl.state(StateType::S, 2);
        let ml = bl.state(StateType::ML, 3);
        let e1 = bl.state(StateType::E, 4);
        let s2 = bl.state(StateType::S, 5);
        let mr = bl.state(StateType::MR, 6);
        let e2 = bl.state(StateType::E, 7);
        bl.transitions(s, bi, &[0.0]);
        bl.bifurcation(bi, s1, s2);
        bl.transitions(s1, ml, &[0.0]);
        bl.transitions(ml, e1, &[0.0]);
        bl.emissions(ml, &[0.0; K]);
        bl.transitions(s2, mr, &[0.0]);
        bl.transitions(mr, e2, &[0.0]);
        bl.emissions(mr, &[0.0; K]);
        let cm = bl.build();

        let bands = Bands::full(cm.m(), 2);
        let mut shadow = ShadowMatrix::sized(&bands, ShadowCell::UsedLocalEnd);
        let mut set = |v: usize, j: isize, d: isize, c: ShadowCell| {
            let (jp, dp) = bands.cell(v, j, d).unwrap();
            shadow.set(v, jp, dp, c);
        };
        set(s, 2, 2, ShadowCell::Child(0));
        set(bi, 2, 2, ShadowCell::Split(1));
        set(s1, 1, 1, ShadowCell::Child(0));
        set(ml, 1, 1, ShadowCell::Child(0));
        set(s2, 2, 1, ShadowCell::Child(0));
        set(mr, 2, 1, ShadowCell::Child(0));

        let tr = traceback(&cm, &bands, &shadow, None, 0, 1, 2);
        let bif_node = tr
            .nodes()
            .iter()
            .position(|n| n.state == bi)
            .unwrap();
        let left = tr.node(bif_node).left.unwrap();
        let right = tr.node(bif_node).right.unwrap();
        assert_eq!(tr.node(left).state, s1);
        assert_eq!((tr.node(left).i, tr.node(left).j), (1, 1));
        assert_eq!(tr.node(right).state, s2);
        assert_eq!((tr.node(right).i, tr.node(right).j), (2, 2));
        assert_eq!(tr.emitted_len(&cm), 2);
    }

    #[test]
    fn local_end_inserts_el_node() {
        // S -> ML -> E with a local end taken after ML over "AG"
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let ml = b.state(StateType::ML, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, ml, &[0.0]);
        b.transitions(ml, e, &[0.0]);
        b.emissions(ml, &[0.0; K]);
        b.end_score(ml, -1.0);
        b.enable_local_end(-0.5);
        let cm = b.build();

        let bands = Bands::full(cm.m(), 2);
        let mut shadow = ShadowMatrix::sized(&bands, ShadowCell::UsedLocalEnd);
        let (jp, dp) = bands.cell(s, 2, 2).unwrap();
        shadow.set(s, jp, dp, ShadowCell::Child(0));
        // ML's cell keeps the UsedLocalEnd default: EL swallows position 2

        let tr = traceback(&cm, &bands, &shadow, None, 0, 1, 2);
        let el = tr.nodes().iter().find(|n| n.state == cm.el_state()).unwrap();
        assert_eq!((el.i, el.j), (2, 2));
        assert_eq!(tr.emitted_len(&cm), 2);
    }
}
