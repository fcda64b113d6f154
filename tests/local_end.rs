//! Local ends: the EL state absorbs residues the model proper cannot
//! account for, at the end transition plus a per-residue self-loop cost.

use cm_dp::semiring::pair_idx;
use cm_dp::{cyk, AlignError, Alphabet, Bands, Cm, CmBuilder, ShadowMatrix, StateType};

fn pair_cm(local_end: bool) -> Cm {
    let mut b = CmBuilder::new(Alphabet::rna());
    let s = b.state(StateType::S, 0);
    let mp = b.state(StateType::MP, 1);
    let e = b.state(StateType::E, 2);
    b.transitions(s, mp, &[-0.4]);
    b.transitions(mp, e, &[-0.2]);
    let mut esc = vec![-3.0f32; 16];
    esc[pair_idx(2, 1)] = 2.5; // G:C
    b.emissions(mp, &esc);
    if local_end {
        b.end_score(mp, -1.0);
        b.enable_local_end(-0.25);
    }
    b.build()
}

#[test]
fn el_absorbs_the_loop() {
    // "GAAC": MP pairs the outer G:C, EL must swallow the two middle As.
    let cm = pair_cm(true);
    let dsq = cm.abc().digitize("GAAC").unwrap();
    let bands = Bands::full(cm.m(), 4);
    let mut mx = cyk::CykMatrix::new();
    let mut shadow = ShadowMatrix::new();
    let (sc, tree) = cyk::align(&cm, &dsq, &bands, &mut mx, &mut shadow).unwrap();

    let want = -0.4 + 2.5 + (-1.0 + 2.0 * -0.25);
    assert!((sc - want).abs() < 1e-5, "got {sc}, want {want}");

    let el = tree
        .nodes()
        .iter()
        .find(|n| n.state == cm.el_state())
        .expect("no EL node in the trace");
    assert_eq!((el.i, el.j), (2, 3));
    assert_eq!(tree.emitted_len(&cm), 4);
    assert!((tree.score(&cm, &dsq) - sc).abs() < 1e-5);
}

#[test]
fn without_local_ends_the_same_sequence_is_infeasible() {
    let cm = pair_cm(false);
    let dsq = cm.abc().digitize("GAAC").unwrap();
    let bands = Bands::full(cm.m(), 4);
    let mut mx = cyk::CykMatrix::new();
    let mut shadow = ShadowMatrix::new();
    assert!(matches!(
        cyk::align(&cm, &dsq, &bands, &mut mx, &mut shadow),
        Err(AlignError::Infeasible)
    ));
}

#[test]
fn zero_length_el_visit_costs_only_the_end_transition() {
    // "GC" with local ends on: taking MP -> E directly (-0.2) beats
    // MP -> EL over zero residues (-1.0), so the E path must win.
    let cm = pair_cm(true);
    let dsq = cm.abc().digitize("GC").unwrap();
    let bands = Bands::full(cm.m(), 2);
    let mut mx = cyk::CykMatrix::new();
    let mut shadow = ShadowMatrix::new();
    let (sc, tree) = cyk::align(&cm, &dsq, &bands, &mut mx, &mut shadow).unwrap();
    let want = -0.4 + 2.5 + -0.2;
    assert!((sc - want).abs() < 1e-5);
    assert!(tree.nodes().iter().all(|n| n.state != cm.el_state()));
}
