//! Report how many DP cells a band saves on a demo hairpin model.
//!
//! Aligns a sequence unbanded first, derives a band of the given width
//! around the optimal parse, and re-aligns inside it:
//!
//! ```text
//! band_stats [SEQ] [WIDTH]
//! ```

use std::env;
use std::process;

use cm_dp::{cyk, inside, Alphabet, Bands, Cm, CmBuilder, ParseTree, ShadowMatrix, StateType};

/// Two-pair stem with a three-residue loop.
fn hairpin_cm() -> Cm {
    let mut b = CmBuilder::new(Alphabet::rna());
    let s = b.state(StateType::S, 0);
    let mp1 = b.state(StateType::MP, 1);
    let mp2 = b.state(StateType::MP, 2);
    let ml1 = b.state(StateType::ML, 3);
    let ml2 = b.state(StateType::ML, 4);
    let ml3 = b.state(StateType::ML, 5);
    let e = b.state(StateType::E, 6);
    b.transitions(s, mp1, &[-0.05]);
    b.transitions(mp1, mp2, &[-0.05]);
    b.transitions(mp2, ml1, &[-0.05]);
    b.transitions(ml1, ml2, &[-0.05]);
    b.transitions(ml2, ml3, &[-0.05]);
    b.transitions(ml3, e, &[-0.05]);
    let mut pair = vec![-2.0f32; 16];
    for (l, r) in [(0, 3), (3, 0), (1, 2), (2, 1), (2, 3), (3, 2)] {
        pair[l * 4 + r] = 2.0; // Watson-Crick and G:U
    }
    b.emissions(mp1, &pair);
    b.emissions(mp2, &pair);
    for v in [ml1, ml2, ml3] {
        b.emissions(v, &[0.5, -0.5, -0.5, -0.5]);
    }
    b.build()
}

/// Band every state to `width` around where the parse placed it; states the
/// parse never used get a one-cell stub at the origin.
fn bands_around(cm: &Cm, tree: &ParseTree, l: usize, width: isize) -> Bands {
    let l = l as isize;
    let mut jmin = vec![0isize; cm.m()];
    let mut jmax = vec![0isize; cm.m()];
    let mut hdmin = vec![vec![0isize]; cm.m()];
    let mut hdmax = vec![vec![0isize]; cm.m()];
    for n in tree.nodes() {
        if n.state == cm.el_state() {
            continue;
        }
        let d = (n.j - n.i + 1).max(0);
        let (jlo, jhi) = ((n.j - width).max(0), (n.j + width).min(l));
        jmin[n.state] = jlo;
        jmax[n.state] = jhi;
        hdmin[n.state] = (jlo..=jhi).map(|j| (d - width).max(0).min(j)).collect();
        hdmax[n.state] = (jlo..=jhi).map(|j| (d + width).min(j)).collect();
    }
    Bands::new(jmin, jmax, hdmin, hdmax)
}

fn main() {
    let mut args = env::args().skip(1);
    let seq = args.next().unwrap_or_else(|| "GGAAACC".to_string());
    let width: isize = args
        .next()
        .map(|w| w.parse().expect("WIDTH must be an integer"))
        .unwrap_or(2);

    let cm = hairpin_cm();
    let dsq = match cm.abc().digitize(&seq) {
        Some(d) => d,
        None => {
            eprintln!("band_stats: '{seq}' is not an RNA sequence");
            process::exit(1);
        }
    };
    let l = dsq.len();

    let full = Bands::full(cm.m(), l);
    let mut mx = cyk::CykMatrix::new();
    let mut shadow = ShadowMatrix::new();
    let (full_sc, tree) = match cyk::align(&cm, &dsq, &full, &mut mx, &mut shadow) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("band_stats: {e}");
            process::exit(1);
        }
    };
    let mut imx = inside::InsideMatrix::new();
    let full_isc = inside::score(&cm, &dsq, &full, &mut imx);

    let banded = bands_around(&cm, &tree, l, width);
    let banded_sc = match cyk::align(&cm, &dsq, &banded, &mut mx, &mut shadow) {
        Ok((sc, _)) => sc,
        Err(e) => {
            eprintln!("band_stats: banded alignment failed: {e}");
            process::exit(1);
        }
    };
    let banded_isc = inside::score(&cm, &dsq, &banded, &mut imx);

    let (nf, nb) = (full.ncells(), banded.ncells());
    println!("model: {} states, sequence: {} residues", cm.m(), l);
    println!("full matrix:   {nf} cells, CYK {full_sc:.3} bits, Inside {full_isc:.3} bits");
    println!("banded (w={width}): {nb} cells, CYK {banded_sc:.3} bits, Inside {banded_isc:.3} bits");
    println!(
        "saved: {} cells ({:.1}%)",
        nf - nb,
        100.0 * (nf - nb) as f64 / nf as f64
    );
}
