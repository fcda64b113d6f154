//! Derivation trees produced by traceback.
//!
//! A tree node records the model state used and the subsequence span
//! `i..=j` it accounts for (an empty span is written `j = i - 1`). Nodes are
//! stored in a flat arena with child indices; the root is node 0. The
//! virtual EL state appears with index `cm.el_state()` and accounts for all
//! residues of its span through the EL self-loop.
//!
//! [`ParseTree::score`] re-derives the bit score of the tree independently
//! of any DP matrix, which is what the traceback parity tests lean on.

use crate::alphabet::Dsq;
use crate::model::{Children, Cm, StateType};

/// One derivation step.
#[derive(Debug, Clone, Copy)]
pub struct TreeNode {
    /// Model state index, or `cm.el_state()` for an EL visit.
    pub state: usize,
    /// Leftmost sequence position of the span (1-based).
    pub i: isize,
    /// Rightmost sequence position of the span; `i - 1` for an empty span.
    pub j: isize,
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// A complete derivation of a subsequence.
#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    nodes: Vec<TreeNode>,
    /// Node entered through the local-begin channel, if any. The entry may
    /// also be a graph child of the root, so the edge is recorded rather
    /// than inferred from connectivity.
    begin: Option<usize>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    #[inline]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Append a node under `parent` (None for the root); returns its index.
    /// The first free child slot of the parent is used, left before right.
    pub fn attach(&mut self, parent: Option<usize>, state: usize, i: isize, j: isize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(TreeNode {
            state,
            i,
            j,
            parent,
            left: None,
            right: None,
        });
        if let Some(p) = parent {
            let slot = &mut self.nodes[p];
            if slot.left.is_none() {
                slot.left = Some(idx);
            } else {
                assert!(slot.right.is_none(), "tree node {p} already has two children");
                slot.right = Some(idx);
            }
        }
        idx
    }

    /// Mark `idx` as entered through a local begin; its incoming edge then
    /// re-scores with the begin score, even when the entry state is also a
    /// graph child of the root.
    pub fn mark_local_begin(&mut self, idx: usize) {
        self.begin = Some(idx);
    }

    /// The node entered through a local begin, if one was marked.
    #[inline]
    pub fn local_begin(&self) -> Option<usize> {
        self.begin
    }

    /// Residues the tree accounts for: one per single emitter visit, two per
    /// pair emitter, the whole span for an EL visit.
    pub fn emitted_len(&self, cm: &Cm) -> usize {
        self.nodes
            .iter()
            .map(|n| {
                if n.state == cm.el_state() {
                    (n.j - n.i + 1).max(0) as usize
                } else {
                    cm.ty(n.state).delta()
                }
            })
            .sum()
    }

    /// Re-score the tree against the model: transitions (the begin score
    /// for the marked local entry or any edge outside the parent's child
    /// range, end plus per-residue self-loop scores for EL edges) plus
    /// emissions. Bifurcation edges cost nothing.
    pub fn score(&self, cm: &Cm, dsq: &Dsq) -> f32 {
        let mut sc = 0.0f32;
        for n in &self.nodes {
            if n.state == cm.el_state() {
                continue;
            }
            let v = n.state;
            for child in [n.left, n.right].into_iter().flatten() {
                let y = self.nodes[child].state;
                if self.begin == Some(child) {
                    sc += cm.begin_sc(y);
                    continue;
                }
                if y == cm.el_state() {
                    let d = (self.nodes[child].j - self.nodes[child].i + 1).max(0);
                    sc += cm.end_sc(v) + cm.el_selfsc * d as f32;
                    continue;
                }
                match *cm.children(v) {
                    Children::Split { .. } => {} // probability one
                    Children::Range { first, n: cnum } if y >= first && y < first + cnum => {
                        sc += cm.tsc(v, y - first);
                    }
                    // Not a graph edge: a local begin jump out of the root.
                    _ => sc += cm.begin_sc(y),
                }
            }
            match cm.ty(v) {
                StateType::MP => sc += cm.esc_pair(v, dsq.code(n.i), dsq.code(n.j)),
                StateType::ML | StateType::IL => sc += cm.esc_single(v, dsq.code(n.i)),
                StateType::MR | StateType::IR => sc += cm.esc_single(v, dsq.code(n.j)),
                _ => {}
            }
        }
        sc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{Alphabet, K};
    use crate::model::{CmBuilder, StateType};
    use crate::semiring::pair_idx;

    fn pair_cm() -> Cm {
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let mp = b.state(StateType::MP, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, mp, &[-0.5]);
        b.transitions(mp, e, &[-0.25]);
        let mut esc = vec![-2.0; K * K];
        esc[pair_idx(2, 1)] = 3.0; // G:C
        b.emissions(mp, &esc);
        b.end_score(mp, -1.0);
        b.enable_local_end(-0.1);
        b.build()
    }

    #[test]
    fn score_sums_transitions_and_emissions() {
        let cm = pair_cm();
        let dsq = cm.abc().digitize("GC").unwrap();
        let mut tr = ParseTree::new();
        let root = tr.attach(None, 0, 1, 2);
        let mp = tr.attach(Some(root), 1, 1, 2);
        tr.attach(Some(mp), 2, 2, 1); // E, empty span
        let want = -0.5 + 3.0 + -0.25;
        assert!((tr.score(&cm, &dsq) - want).abs() < 1e-6);
        assert_eq!(tr.emitted_len(&cm), 2);
    }

    #[test]
    fn el_edge_scores_end_plus_self_loops() {
        let cm = pair_cm();
        let dsq = cm.abc().digitize("GAAC").unwrap();
        let mut tr = ParseTree::new();
        let root = tr.attach(None, 0, 1, 4);
        let mp = tr.attach(Some(root), 1, 1, 4);
        tr.attach(Some(mp), cm.el_state(), 2, 3); // EL swallows positions 2..3
        let want = -0.5 + 3.0 + (-1.0 + 2.0 * -0.1);
        assert!((tr.score(&cm, &dsq) - want).abs() < 1e-6);
        assert_eq!(tr.emitted_len(&cm), 4);
    }

    #[test]
    fn local_begin_edge_uses_begin_score() {
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let d = b.state(StateType::D, 1);
        let ml = b.state(StateType::ML, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, d, &[-0.3]);
        b.transitions(d, e, &[0.0]);
        b.transitions(ml, e, &[0.0]);
        b.emissions(ml, &[1.0; K]);
        b.begin_score(ml, -0.7);
        b.enable_local_begin();
        let cm = b.build();
        let dsq = cm.abc().digitize("A").unwrap();
        let mut tr = ParseTree::new();
        let root = tr.attach(None, s, 1, 1);
        let mln = tr.attach(Some(root), ml, 1, 1);
        tr.attach(Some(mln), e, 2, 1);
        // root -> ML is not a graph edge, so the begin score applies
        let want = -0.7 + 1.0;
        assert!((tr.score(&cm, &dsq) - want).abs() < 1e-6);
    }

    #[test]
    fn marked_begin_overrides_a_real_transition() {
        // ML is a direct child of the root; only the mark distinguishes a
        // begin entry from the ordinary transition.
        let mut b = CmBuilder::new(Alphabet::rna());
        let s = b.state(StateType::S, 0);
        let ml = b.state(StateType::ML, 1);
        let e = b.state(StateType::E, 2);
        b.transitions(s, ml, &[-0.3]);
        b.transitions(ml, e, &[0.0]);
        b.emissions(ml, &[1.0; K]);
        b.begin_score(ml, -0.7);
        b.enable_local_begin();
        let cm = b.build();
        let dsq = cm.abc().digitize("A").unwrap();

        let mut tr = ParseTree::new();
        let root = tr.attach(None, s, 1, 1);
        let mln = tr.attach(Some(root), ml, 1, 1);
        tr.attach(Some(mln), e, 2, 1);
        let direct = -0.3 + 1.0;
        assert!((tr.score(&cm, &dsq) - direct).abs() < 1e-6);

        tr.mark_local_begin(mln);
        let via_begin = -0.7 + 1.0;
        assert!((tr.score(&cm, &dsq) - via_begin).abs() < 1e-6);
    }
}
