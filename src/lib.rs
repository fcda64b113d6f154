//! Banded dynamic programming over covariance models.
//!
//! A covariance model ([`Cm`]) is a profile stochastic context-free grammar
//! describing an RNA family's sequence and secondary structure. This crate
//! aligns digitized RNA sequences ([`Dsq`]) against such a model inside
//! per-state bands ([`Bands`]) that confine each state to a window of
//! sequence endpoints and subsequence lengths:
//!
//! - [`cyk`] finds the single best derivation (max-plus scores) and can
//!   trace it back into a [`ParseTree`];
//! - [`inside`] sums the mass of all derivations (fixed-point log-sum-exp);
//! - [`outside`] computes the complementary outside mass and can check it
//!   against the Inside matrix node by node.
//!
//! Matrices are owned by the caller and reused across sequences; they only
//! reallocate when a band needs more cells than any earlier one. All
//! routines are single-threaded; align different sequences on different
//! threads with separate matrices if you need parallelism.
//!
//! ```
//! use cm_dp::{cyk, Alphabet, Bands, CmBuilder, StateType};
//!
//! let mut b = CmBuilder::new(Alphabet::rna());
//! let s = b.state(StateType::S, 0);
//! let mp = b.state(StateType::MP, 1);
//! let e = b.state(StateType::E, 2);
//! b.transitions(s, mp, &[-0.1]);
//! b.transitions(mp, e, &[-0.1]);
//! let mut esc = vec![-2.0; 16];
//! esc[2 * 4 + 1] = 2.0; // G:C
//! b.emissions(mp, &esc);
//! let cm = b.build();
//!
//! let dsq = cm.abc().digitize("GC").unwrap();
//! let bands = Bands::full(cm.m(), dsq.len());
//! let mut mx = cyk::CykMatrix::new();
//! let mut shadow = cm_dp::ShadowMatrix::new();
//! let (sc, tree) = cyk::align(&cm, &dsq, &bands, &mut mx, &mut shadow).unwrap();
//! assert!((tree.score(&cm, &dsq) - sc).abs() < 1e-5);
//! ```

pub mod alphabet;
pub mod band;
pub mod cyk;
pub mod inside;
pub mod matrix;
pub mod model;
pub mod outside;
pub mod parsetree;
mod recursion;
pub mod semiring;
pub mod trace;

pub use alphabet::{Alphabet, Dsq};
pub use band::Bands;
pub use model::{Children, Cm, CmBuilder, StateType};
pub use parsetree::{ParseTree, TreeNode};
pub use trace::{ShadowCell, ShadowMatrix};

use thiserror::Error;

/// Alignment failed for a reason the caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignError {
    /// No derivation of the sequence lies inside the band; widen the band
    /// or enable local ends.
    #[error("no derivation of the sequence lies inside the band")]
    Infeasible,
}
