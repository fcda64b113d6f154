//! Per-state alignment bands in (j, d) coordinates.
//!
//! A band confines state `v` to sequence endpoints `jmin(v)..=jmax(v)` and,
//! within each endpoint `j`, to subsequence lengths
//! `hdmin(v, j)..=hdmax(v, j)`. Matrix decks are allocated over exactly
//! these cells, and the recursions intersect every child/parent loop range
//! against the band.
//!
//! All public lookups take global signed coordinates and return `Option`:
//! a `None` means the cell is outside the band and the caller skips it.
//! Signed inputs let the recursions form `j - 1` or `d - 2` freely near the
//! origin without underflow gymnastics at every call site.

/// Band table for a model with M states.
///
/// Row `hdmin[v]` / `hdmax[v]` is indexed by the row offset
/// `jp = j - jmin[v]` and has `jmax[v] - jmin[v] + 1` entries.
#[derive(Debug, Clone)]
pub struct Bands {
    jmin: Vec<isize>,
    jmax: Vec<isize>,
    hdmin: Vec<Vec<isize>>,
    hdmax: Vec<Vec<isize>>,
}

impl Bands {
    /// Build from explicit per-state tables.
    ///
    /// # Panics
    /// Panics if the table shapes disagree; the shapes are part of the
    /// construction contract.
    pub fn new(
        jmin: Vec<isize>,
        jmax: Vec<isize>,
        hdmin: Vec<Vec<isize>>,
        hdmax: Vec<Vec<isize>>,
    ) -> Self {
        let m = jmin.len();
        assert!(
            jmax.len() == m && hdmin.len() == m && hdmax.len() == m,
            "band tables must cover the same number of states"
        );
        for v in 0..m {
            assert!(jmin[v] <= jmax[v], "state {v}: jmin > jmax");
            let w = (jmax[v] - jmin[v] + 1) as usize;
            assert!(
                hdmin[v].len() == w && hdmax[v].len() == w,
                "state {v}: hd rows must span jmin..=jmax"
            );
        }
        let b = Self {
            jmin,
            jmax,
            hdmin,
            hdmax,
        };
        b.debug_validate();
        b
    }

    /// The unconstrained band: every state may align any `0..=j` suffix of
    /// every endpoint `0..=l`. Banded fills over this reproduce the full
    /// triangular DP.
    pub fn full(m: usize, l: usize) -> Self {
        let l = l as isize;
        let hdmin = vec![vec![0; l as usize + 1]; m];
        let hdmax: Vec<Vec<isize>> = (0..m).map(|_| (0..=l).collect()).collect();
        Self {
            jmin: vec![0; m],
            jmax: vec![l; m],
            hdmin,
            hdmax,
        }
    }

    /// Number of states the band covers.
    #[inline]
    pub fn m(&self) -> usize {
        self.jmin.len()
    }

    #[inline]
    pub fn jmin(&self, v: usize) -> isize {
        self.jmin[v]
    }

    #[inline]
    pub fn jmax(&self, v: usize) -> isize {
        self.jmax[v]
    }

    /// Row offset of endpoint `j` in state `v`'s decks, if `j` is in band.
    #[inline]
    pub fn jp(&self, v: usize, j: isize) -> Option<usize> {
        if j >= self.jmin[v] && j <= self.jmax[v] {
            Some((j - self.jmin[v]) as usize)
        } else {
            None
        }
    }

    /// In-band length range `(hdmin, hdmax)` at endpoint `j`, if any.
    #[inline]
    pub fn hd_range(&self, v: usize, j: isize) -> Option<(isize, isize)> {
        let jp = self.jp(v, j)?;
        Some((self.hdmin[v][jp], self.hdmax[v][jp]))
    }

    /// Deck offsets `(jp, dp)` of global cell `(v, j, d)`, or `None` if the
    /// cell lies outside the band.
    #[inline]
    pub fn cell(&self, v: usize, j: isize, d: isize) -> Option<(usize, usize)> {
        let jp = self.jp(v, j)?;
        let (lo, hi) = (self.hdmin[v][jp], self.hdmax[v][jp]);
        if d >= lo && d <= hi {
            Some((jp, (d - lo) as usize))
        } else {
            None
        }
    }

    /// True if global cell `(v, j, d)` is inside the band.
    #[inline]
    pub fn has_cell(&self, v: usize, j: isize, d: isize) -> bool {
        self.cell(v, j, d).is_some()
    }

    /// Row widths per state, in row-offset order; the matrix layout is
    /// computed from these.
    pub(crate) fn row_widths(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.hdmin[v]
            .iter()
            .zip(&self.hdmax[v])
            .map(|(&lo, &hi)| (hi - lo + 1) as usize)
    }

    /// Total cells inside the band.
    pub fn ncells(&self) -> usize {
        (0..self.m()).map(|v| self.row_widths(v).sum::<usize>()).sum()
    }

    /// Cells a full (unbanded) matrix would hold for sequence length `l`.
    pub fn ncells_full(m: usize, l: usize) -> usize {
        m * (l + 1) * (l + 2) / 2
    }

    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        for v in 0..self.m() {
            for jp in 0..self.hdmin[v].len() {
                let j = self.jmin[v] + jp as isize;
                let (lo, hi) = (self.hdmin[v][jp], self.hdmax[v][jp]);
                debug_assert!(
                    lo >= 0 && lo <= hi && hi <= j,
                    "state {v}, j {j}: bad hd range {lo}..={hi}"
                );
            }
        }
    }
}
