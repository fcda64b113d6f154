//! Banded DP matrix storage.
//!
//! One flat cell buffer holds every in-band cell of every state deck; a
//! per-state layout maps `(jp, dp)` row/column offsets (as produced by
//! [`Bands`](crate::band::Bands)) to buffer positions. The buffer only
//! reallocates when a new shape needs more cells than any previous one, so a
//! caller scanning many sequences reuses one allocation; every resize
//! overwrites all cells with the fill value.

use crate::band::Bands;

#[derive(Debug, Clone, Default)]
struct Deck {
    /// (buffer offset, width) per band row.
    rows: Vec<(usize, usize)>,
}

/// A banded three-dimensional matrix `[state][jp][dp]` over copyable cells.
#[derive(Debug, Clone)]
pub struct BandedMatrix<T> {
    cells: Vec<T>,
    decks: Vec<Deck>,
    len: usize,
}

impl<T: Copy> BandedMatrix<T> {
    /// An empty matrix; call [`resize`](Self::resize) before use.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            decks: Vec::new(),
            len: 0,
        }
    }

    /// A matrix shaped for `bands`, every cell set to `fill`.
    pub fn sized(bands: &Bands, fill: T) -> Self {
        let mut mx = Self::new();
        mx.resize(bands, fill);
        mx
    }

    /// Reshape for `bands` and set every cell to `fill`. Grows the backing
    /// buffer only when the new shape exceeds its capacity.
    pub fn resize(&mut self, bands: &Bands, fill: T) {
        let m = bands.m();
        self.decks.clear();
        self.decks.reserve(m);
        let mut offset = 0;
        for v in 0..m {
            let rows = bands
                .row_widths(v)
                .map(|w| {
                    let r = (offset, w);
                    offset += w;
                    r
                })
                .collect();
            self.decks.push(Deck { rows });
        }
        self.len = offset;
        if self.cells.len() < offset {
            self.cells.resize(offset, fill);
        }
        self.cells[..offset].fill(fill);
    }

    /// Cells in the current shape.
    #[inline]
    pub fn ncells(&self) -> usize {
        self.len
    }

    #[inline]
    fn idx(&self, v: usize, jp: usize, dp: usize) -> usize {
        let (offset, width) = self.decks[v].rows[jp];
        debug_assert!(dp < width, "dp {dp} outside row width {width}");
        offset + dp
    }

    /// Read cell `(v, jp, dp)` (band-relative offsets).
    #[inline]
    pub fn get(&self, v: usize, jp: usize, dp: usize) -> T {
        self.cells[self.idx(v, jp, dp)]
    }

    /// Write cell `(v, jp, dp)` (band-relative offsets).
    #[inline]
    pub fn set(&mut self, v: usize, jp: usize, dp: usize, value: T) {
        let i = self.idx(v, jp, dp);
        self.cells[i] = value;
    }

    /// Mutable access for in-place accumulation.
    #[inline]
    pub fn get_mut(&mut self, v: usize, jp: usize, dp: usize) -> &mut T {
        let i = self.idx(v, jp, dp);
        &mut self.cells[i]
    }
}

impl<T: Copy> Default for BandedMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_matches_band() {
        let b = Bands::new(
            vec![0, 1],
            vec![2, 2],
            vec![vec![0, 0, 1], vec![0, 0]],
            vec![vec![0, 1, 2], vec![1, 2]],
        );
        let mx = BandedMatrix::sized(&b, -1.0f32);
        assert_eq!(mx.ncells(), (1 + 2 + 2) + (2 + 3));
        assert_eq!(mx.get(1, 1, 2), -1.0);
    }

    #[test]
    fn cells_are_independent() {
        let b = Bands::full(2, 2);
        let mut mx = BandedMatrix::sized(&b, 0i32);
        mx.set(0, 2, 1, 7);
        mx.set(1, 2, 1, 9);
        assert_eq!(mx.get(0, 2, 1), 7);
        assert_eq!(mx.get(1, 2, 1), 9);
        assert_eq!(mx.get(0, 2, 0), 0);
    }

    #[test]
    fn resize_reuses_and_clears() {
        let big = Bands::full(2, 8);
        let small = Bands::full(2, 2);
        let mut mx = BandedMatrix::sized(&big, 1u8);
        mx.set(0, 0, 0, 42);
        mx.resize(&small, 3);
        assert_eq!(mx.ncells(), Bands::ncells_full(2, 2));
        assert_eq!(mx.get(0, 0, 0), 3);
    }
}
