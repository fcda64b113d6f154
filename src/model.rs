//! The covariance model: a state graph with transition and emission scores.
//!
//! States are numbered so that every child has a higher index than its
//! parent; the CYK/Inside recursion walks indices in reverse, Outside walks
//! them forward. Non-bifurcation states transit to a contiguous range of
//! children; a bifurcation has exactly two start-state children rooting
//! independent left and right subtrees.
//!
//! Every score exists in two forms: float bits (max-plus recursions) and
//! fixed-point integer log-odds (log-sum-exp recursions). The integer form
//! is derived from the float form at build time.

use crate::alphabet::{Alphabet, K};
use crate::semiring::{avg_f, avg_i, pair_idx, quantize, IMPOSSIBLE};

/// Grammar state types.
///
/// `S` and `B` are silent structural states, `E` terminates a subtree, and
/// the remainder emit 0, 1 or 2 residues per use. The virtual end-local (EL)
/// state is not in this enum: it lives at index `M` and is reachable only
/// through local-end transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    /// Start (silent).
    S,
    /// Bifurcation into two independent subtrees (silent).
    B,
    /// Pair match: emits one residue on each side.
    MP,
    /// Left match: emits one residue on the left.
    ML,
    /// Right match: emits one residue on the right.
    MR,
    /// Delete (silent).
    D,
    /// Left insert: emits left, may self-transit.
    IL,
    /// Right insert: emits right, may self-transit.
    IR,
    /// End (silent, terminates with span 0).
    E,
}

impl StateType {
    /// Total residues emitted per use of the state.
    #[inline]
    pub fn delta(self) -> usize {
        match self {
            StateType::MP => 2,
            StateType::ML | StateType::MR | StateType::IL | StateType::IR => 1,
            _ => 0,
        }
    }

    /// Residues emitted on the right (the j side).
    #[inline]
    pub fn right_delta(self) -> usize {
        match self {
            StateType::MP | StateType::MR | StateType::IR => 1,
            _ => 0,
        }
    }

    /// Residues emitted on the left (the i side).
    #[inline]
    pub fn left_delta(self) -> usize {
        match self {
            StateType::MP | StateType::ML | StateType::IL => 1,
            _ => 0,
        }
    }

    /// True for states in a node's split set (everything but inserts).
    #[inline]
    pub fn is_split(self) -> bool {
        !matches!(self, StateType::IL | StateType::IR)
    }

    /// True for insert states, which may self-transit.
    #[inline]
    pub fn is_insert(self) -> bool {
        matches!(self, StateType::IL | StateType::IR)
    }
}

/// Which side of a bifurcation a start state roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BifSide {
    Left,
    Right,
}

/// Outgoing connectivity of a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// End states: nothing below.
    None,
    /// Contiguous child range `first..first + n`, with per-child transition
    /// scores in the same order.
    Range { first: usize, n: usize },
    /// Bifurcation: two start states with probability-one transitions.
    Split { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct State {
    ty: StateType,
    node: usize,
    children: Children,
    /// Range-children parents, including the state itself for insert
    /// self-transitions; bifurcation parents are tracked via `bif_parent`
    /// on the two start states.
    parents: Vec<usize>,
    bif_parent: Option<(usize, BifSide)>,
    tsc: Vec<f32>,
    itsc: Vec<i32>,
    esc: Vec<f32>,
    iesc: Vec<i32>,
    begin_sc: f32,
    ibegin_sc: i32,
    end_sc: f32,
    iend_sc: i32,
    subtree_end: usize,
}

/// An immutable covariance model.
#[derive(Debug, Clone)]
pub struct Cm {
    abc: Alphabet,
    states: Vec<State>,
    /// Split-state indices per node, in state order.
    nodes: Vec<Vec<usize>>,
    /// Local entry below the root is permitted.
    pub local_begin: bool,
    /// Local exit into the EL self-loop deck is permitted.
    pub local_end: bool,
    /// Per-residue EL self-loop score, bits.
    pub el_selfsc: f32,
    /// Fixed-point form of `el_selfsc`.
    pub iel_selfsc: i32,
}

impl Cm {
    /// Number of states M.
    #[inline]
    pub fn m(&self) -> usize {
        self.states.len()
    }

    /// Index of the virtual EL state (one past the last real state).
    #[inline]
    pub fn el_state(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn abc(&self) -> &Alphabet {
        &self.abc
    }

    #[inline]
    pub fn ty(&self, v: usize) -> StateType {
        self.states[v].ty
    }

    #[inline]
    pub fn node_of(&self, v: usize) -> usize {
        self.states[v].node
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Split-set states of node `n` (all non-insert states of the node).
    #[inline]
    pub fn split_states(&self, n: usize) -> &[usize] {
        &self.nodes[n]
    }

    #[inline]
    pub fn children(&self, v: usize) -> &Children {
        &self.states[v].children
    }

    /// Contiguous child range of a non-bifurcation state, if any.
    #[inline]
    pub fn child_range(&self, v: usize) -> Option<(usize, usize)> {
        match self.states[v].children {
            Children::Range { first, n } => Some((first, n)),
            _ => None,
        }
    }

    /// The two subtree roots of a bifurcation.
    ///
    /// # Panics
    /// Panics if `v` is not a bifurcation.
    #[inline]
    pub fn bif_children(&self, v: usize) -> (usize, usize) {
        match self.states[v].children {
            Children::Split { left, right } => (left, right),
            _ => panic!("state {v} is not a bifurcation"),
        }
    }

    /// States that transit to `v` through a contiguous child range. An
    /// insert state that self-transits lists itself.
    #[inline]
    pub fn parents(&self, v: usize) -> &[usize] {
        &self.states[v].parents
    }

    /// The bifurcation above `v`, if `v` is one of its start-state children.
    #[inline]
    pub fn bif_parent(&self, v: usize) -> Option<(usize, BifSide)> {
        self.states[v].bif_parent
    }

    /// Highest state index in the subtree rooted at `v`.
    #[inline]
    pub fn subtree_end(&self, v: usize) -> usize {
        self.states[v].subtree_end
    }

    /// Index of `v` within parent `y`'s transition table.
    #[inline]
    pub fn transition_offset(&self, y: usize, v: usize) -> usize {
        match self.states[y].children {
            Children::Range { first, .. } => v - first,
            _ => panic!("state {y} has no transition table"),
        }
    }

    #[inline]
    pub fn tsc(&self, v: usize, yoffset: usize) -> f32 {
        self.states[v].tsc[yoffset]
    }
    #[inline]
    pub fn itsc(&self, v: usize, yoffset: usize) -> i32 {
        self.states[v].itsc[yoffset]
    }
    #[inline]
    pub fn begin_sc(&self, v: usize) -> f32 {
        self.states[v].begin_sc
    }
    #[inline]
    pub fn ibegin_sc(&self, v: usize) -> i32 {
        self.states[v].ibegin_sc
    }
    #[inline]
    pub fn end_sc(&self, v: usize) -> f32 {
        self.states[v].end_sc
    }
    #[inline]
    pub fn iend_sc(&self, v: usize) -> i32 {
        self.states[v].iend_sc
    }

    /// Single-residue emission score; degenerate codes average over their
    /// membership set.
    pub fn esc_single(&self, v: usize, code: u8) -> f32 {
        let esc = &self.states[v].esc;
        if self.abc.is_canonical(code) {
            esc[code as usize]
        } else {
            avg_f(self.abc.members(code).map(|r| esc[r as usize]))
        }
    }

    /// Integer counterpart of [`esc_single`](Self::esc_single).
    pub fn iesc_single(&self, v: usize, code: u8) -> i32 {
        let iesc = &self.states[v].iesc;
        if self.abc.is_canonical(code) {
            iesc[code as usize]
        } else {
            avg_i(self.abc.members(code).map(|r| iesc[r as usize]))
        }
    }

    /// Pair emission score; if either side is degenerate, average over all
    /// compatible canonical pairs.
    pub fn esc_pair(&self, v: usize, left: u8, right: u8) -> f32 {
        let esc = &self.states[v].esc;
        if self.abc.is_canonical(left) && self.abc.is_canonical(right) {
            esc[pair_idx(left, right)]
        } else {
            avg_f(self.abc.members(left).flat_map(|l| {
                self.abc.members(right).map(move |r| (l, r))
            })
            .map(|(l, r)| esc[pair_idx(l, r)]))
        }
    }

    /// Integer counterpart of [`esc_pair`](Self::esc_pair).
    pub fn iesc_pair(&self, v: usize, left: u8, right: u8) -> i32 {
        let iesc = &self.states[v].iesc;
        if self.abc.is_canonical(left) && self.abc.is_canonical(right) {
            iesc[pair_idx(left, right)]
        } else {
            avg_i(self.abc.members(left).flat_map(|l| {
                self.abc.members(right).map(move |r| (l, r))
            })
            .map(|(l, r)| iesc[pair_idx(l, r)]))
        }
    }
}

struct DraftState {
    ty: StateType,
    node: usize,
    children: Children,
    tsc: Vec<f32>,
    esc: Vec<f32>,
    begin_sc: f32,
    end_sc: f32,
}

/// Programmatic model construction.
///
/// States are pushed in index order (children after parents); connectivity
/// and scores are set afterwards, and [`build`](CmBuilder::build) validates
/// the graph and derives parent lists, subtree ends, node split sets and
/// fixed-point scores.
pub struct CmBuilder {
    abc: Alphabet,
    states: Vec<DraftState>,
    local_begin: bool,
    local_end: bool,
    el_selfsc: f32,
}

impl CmBuilder {
    pub fn new(abc: Alphabet) -> Self {
        Self {
            abc,
            states: Vec::new(),
            local_begin: false,
            local_end: false,
            el_selfsc: 0.0,
        }
    }

    /// Append a state of `ty` belonging to node `node`; returns its index.
    pub fn state(&mut self, ty: StateType, node: usize) -> usize {
        self.states.push(DraftState {
            ty,
            node,
            children: Children::None,
            tsc: Vec::new(),
            esc: Vec::new(),
            begin_sc: IMPOSSIBLE,
            end_sc: IMPOSSIBLE,
        });
        self.states.len() - 1
    }

    /// Wire `v` to the contiguous child range `first..first + scores.len()`.
    pub fn transitions(&mut self, v: usize, first: usize, scores: &[f32]) -> &mut Self {
        self.states[v].children = Children::Range {
            first,
            n: scores.len(),
        };
        self.states[v].tsc = scores.to_vec();
        self
    }

    /// Wire a bifurcation to its left and right subtree roots.
    pub fn bifurcation(&mut self, v: usize, left: usize, right: usize) -> &mut Self {
        self.states[v].children = Children::Split { left, right };
        self
    }

    /// Set emission scores: length K for single emitters, K*K for MP
    /// (row-major, left residue is the row).
    pub fn emissions(&mut self, v: usize, scores: &[f32]) -> &mut Self {
        self.states[v].esc = scores.to_vec();
        self
    }

    /// Allow local entry at `v` with the given begin transition score.
    pub fn begin_score(&mut self, v: usize, sc: f32) -> &mut Self {
        self.states[v].begin_sc = sc;
        self
    }

    /// Allow local exit from `v` into the EL deck with the given score.
    pub fn end_score(&mut self, v: usize, sc: f32) -> &mut Self {
        self.states[v].end_sc = sc;
        self
    }

    /// Enable local begins (entry below the root).
    pub fn enable_local_begin(&mut self) -> &mut Self {
        self.local_begin = true;
        self
    }

    /// Enable local ends with the per-residue EL self-loop score.
    pub fn enable_local_end(&mut self, el_selfsc: f32) -> &mut Self {
        self.local_end = true;
        self.el_selfsc = el_selfsc;
        self
    }

    /// Validate the draft and produce an immutable model.
    ///
    /// # Panics
    /// Panics on a malformed graph (wrong table sizes, children not after
    /// parents, bifurcations without two children); these are construction
    /// bugs, not runtime conditions.
    pub fn build(&mut self) -> Cm {
        let m = self.states.len();
        assert!(m > 0, "a model needs at least one state");

        let mut states: Vec<State> = Vec::with_capacity(m);
        for (v, d) in self.states.iter().enumerate() {
            let arity = d.ty.delta();
            let want_esc = match d.ty {
                StateType::MP => K * K,
                _ if arity == 1 => K,
                _ => 0,
            };
            assert_eq!(
                d.esc.len(),
                want_esc,
                "state {v}: expected {want_esc} emission scores, got {}",
                d.esc.len()
            );
            match d.children {
                Children::None => assert!(
                    matches!(d.ty, StateType::E),
                    "state {v}: only end states may lack children"
                ),
                Children::Range { first, n } => {
                    assert!(n > 0, "state {v}: empty child range");
                    assert_eq!(d.tsc.len(), n, "state {v}: transition table size");
                    // Self-transitions are legal for inserts only; every
                    // other child must lie strictly below.
                    let self_ok = usize::from(d.ty.is_insert());
                    assert!(
                        first + self_ok > v && first + n <= m,
                        "state {v}: child range {first}..{} breaks topological order",
                        first + n
                    );
                }
                Children::Split { left, right } => {
                    assert!(
                        matches!(d.ty, StateType::B),
                        "state {v}: only bifurcations split"
                    );
                    assert!(left > v && right > left && right < m);
                    assert!(
                        matches!(self.states[left].ty, StateType::S)
                            && matches!(self.states[right].ty, StateType::S),
                        "state {v}: bifurcation children must be start states"
                    );
                }
            }
            states.push(State {
                ty: d.ty,
                node: d.node,
                children: d.children.clone(),
                parents: Vec::new(),
                bif_parent: None,
                tsc: d.tsc.clone(),
                itsc: d.tsc.iter().map(|&s| quantize(s)).collect(),
                esc: d.esc.clone(),
                iesc: d.esc.iter().map(|&s| quantize(s)).collect(),
                begin_sc: d.begin_sc,
                ibegin_sc: quantize(d.begin_sc),
                end_sc: d.end_sc,
                iend_sc: quantize(d.end_sc),
                subtree_end: v,
            });
        }

        // Parent lists and bifurcation roles.
        for v in 0..m {
            match states[v].children {
                Children::Range { first, n } => {
                    for y in first..first + n {
                        states[y].parents.push(v);
                    }
                }
                Children::Split { left, right } => {
                    states[left].bif_parent = Some((v, BifSide::Left));
                    states[right].bif_parent = Some((v, BifSide::Right));
                }
                Children::None => {}
            }
        }

        // Subtree ends: children precede parents in reverse index order, so
        // one reverse sweep suffices.
        for v in (0..m).rev() {
            let end = match states[v].children {
                Children::None => v,
                Children::Range { first, n } => {
                    let mut e = v;
                    for y in first..first + n {
                        e = e.max(states[y].subtree_end);
                    }
                    e
                }
                Children::Split { left, right } => states[left]
                    .subtree_end
                    .max(states[right].subtree_end),
            };
            states[v].subtree_end = end;
        }

        let n_nodes = states.iter().map(|s| s.node + 1).max().unwrap();
        let mut nodes = vec![Vec::new(); n_nodes];
        for (v, s) in states.iter().enumerate() {
            if s.ty.is_split() {
                nodes[s.node].push(v);
            }
        }
        assert!(
            nodes.iter().all(|n| !n.is_empty()),
            "every node needs at least one split state"
        );

        Cm {
            abc: self.abc.clone(),
            states,
            nodes,
            local_begin: self.local_begin,
            local_end: self.local_end,
            el_selfsc: self.el_selfsc,
            iel_selfsc: quantize(self.el_selfsc),
        }
    }
}
