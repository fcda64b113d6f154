//! Inside sums every derivation, so it can never score below the single
//! best one. The fixed-point scale rounds each transition and emission to
//! a thousandth of a bit, so a small slack is allowed.

mod common;

use cm_dp::{cyk, inside, Bands, Cm};
use proptest::prelude::*;

const ROUNDING_SLACK: f32 = 0.05;

fn check_dominance(cm: &Cm, seq: &str) -> Result<(), TestCaseError> {
    let dsq = cm.abc().digitize(seq).unwrap();
    let bands = Bands::full(cm.m(), dsq.len());
    let mut cmx = cyk::CykMatrix::new();
    let best = cyk::score(cm, &dsq, &bands, &mut cmx);
    let mut imx = inside::InsideMatrix::new();
    let total = inside::score(cm, &dsq, &bands, &mut imx);
    prop_assert!(
        total >= best - ROUNDING_SLACK,
        "seq {}: inside {} < cyk {}",
        seq,
        total,
        best
    );
    Ok(())
}

fn rna(max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::sample::select(vec!['A', 'C', 'G', 'U']), 1..=max_len)
        .prop_map(|v| v.into_iter().collect())
}

proptest! {
    #[test]
    fn inside_dominates_cyk_global(seq in rna(24)) {
        check_dominance(&common::flex_cm(false), &seq)?;
    }

    #[test]
    fn inside_dominates_cyk_local(seq in rna(24)) {
        check_dominance(&common::flex_cm(true), &seq)?;
    }

    #[test]
    fn inside_dominates_cyk_bifurcating(seq in rna(16)) {
        check_dominance(&common::bif_cm(), &seq)?;
    }
}
