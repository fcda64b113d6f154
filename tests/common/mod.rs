//! Model builders and sequence helpers shared by the integration tests.
#![allow(dead_code)]

use cm_dp::{Alphabet, Cm, CmBuilder, StateType};
use rand::Rng;

/// A small but fully flexible model: a pair node and a left-match node,
/// each with delete and insert alternatives, so every sequence length has
/// at least one derivation. With `local` set, begins may enter the match
/// states and ends may leave them.
pub fn flex_cm(local: bool) -> Cm {
    let mut b = CmBuilder::new(Alphabet::rna());
    let s = b.state(StateType::S, 0);
    let il0 = b.state(StateType::IL, 0);
    let mp = b.state(StateType::MP, 1);
    let ml = b.state(StateType::ML, 1);
    let mr = b.state(StateType::MR, 1);
    let d1 = b.state(StateType::D, 1);
    let il1 = b.state(StateType::IL, 1);
    let ml2 = b.state(StateType::ML, 2);
    let d2 = b.state(StateType::D, 2);
    let e = b.state(StateType::E, 3);

    b.transitions(s, il0, &[-4.0, -0.6, -2.5, -2.5, -3.5]);
    b.transitions(il0, il0, &[-1.7, -1.2, -2.9, -2.9, -3.8]);
    b.transitions(mp, il1, &[-4.2, -0.3, -3.2]);
    b.transitions(ml, il1, &[-4.0, -0.5, -2.8]);
    b.transitions(mr, il1, &[-4.0, -0.5, -2.8]);
    b.transitions(d1, il1, &[-3.6, -0.8, -1.6]);
    b.transitions(il1, il1, &[-1.8, -0.9, -2.4]);
    b.transitions(ml2, e, &[0.0]);
    b.transitions(d2, e, &[0.0]);

    let mut pair = vec![-2.3f32; 16];
    for (l, r) in [(0, 3), (3, 0), (1, 2), (2, 1), (2, 3), (3, 2)] {
        pair[l * 4 + r] = 1.9;
    }
    b.emissions(mp, &pair);
    b.emissions(ml, &[0.6, -0.9, -0.4, -0.7]);
    b.emissions(mr, &[-0.7, 0.5, -0.9, -0.2]);
    b.emissions(ml2, &[-0.3, -0.3, 0.4, -0.6]);
    b.emissions(il0, &[0.0; 4]);
    b.emissions(il1, &[0.0; 4]);

    if local {
        b.begin_score(mp, -1.5);
        b.begin_score(ml2, -2.5);
        b.end_score(mp, -2.0);
        b.end_score(ml, -2.0);
        b.end_score(mr, -2.0);
        b.enable_local_begin();
        b.enable_local_end(-0.2);
    }
    b.build()
}

/// A bifurcating model whose two arms each hold one flexible match node, so
/// any split of any sequence length is derivable.
pub fn bif_cm() -> Cm {
    let mut b = CmBuilder::new(Alphabet::rna());
    let s = b.state(StateType::S, 0);
    let bi = b.state(StateType::B, 1);
    let sl = b.state(StateType::S, 2);
    let ml = b.state(StateType::ML, 3);
    let dl = b.state(StateType::D, 3);
    let ill = b.state(StateType::IL, 3);
    let el = b.state(StateType::E, 4);
    let sr = b.state(StateType::S, 5);
    let mr = b.state(StateType::ML, 6);
    let dr = b.state(StateType::D, 6);
    let ilr = b.state(StateType::IL, 6);
    let er = b.state(StateType::E, 7);

    b.transitions(s, bi, &[-0.1]);
    b.bifurcation(bi, sl, sr);
    b.transitions(sl, ml, &[-0.4, -2.2]);
    b.transitions(ml, ill, &[-3.5, -0.2]);
    b.transitions(dl, ill, &[-2.8, -0.6]);
    b.transitions(ill, ill, &[-1.6, -0.8]);
    b.transitions(sr, mr, &[-0.5, -2.0]);
    b.transitions(mr, ilr, &[-3.3, -0.3]);
    b.transitions(dr, ilr, &[-2.9, -0.5]);
    b.transitions(ilr, ilr, &[-1.5, -0.9]);

    b.emissions(ml, &[0.7, -0.8, -0.5, -0.6]);
    b.emissions(ill, &[0.0; 4]);
    b.emissions(mr, &[-0.6, -0.4, 0.6, -0.8]);
    b.emissions(ilr, &[0.0; 4]);
    b.build()
}

pub fn random_rna(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| ['A', 'C', 'G', 'U'][rng.gen_range(0..4)])
        .collect()
}
