//! DOF coupling graph and sparsity patterns.
//!
//! The DOF→DOF adjacency is built without lists of lists: the unit→DOF
//! incidence is stored in CSR form, its transpose (DOF→unit) is produced by a
//! counting pass, and the product of the two is walked with a marker array.

use itertools::Itertools;
use nalgebra_sparse::CsrMatrix;
use nalgebra_sparse::pattern::SparsityPattern;

use crate::dof::DofHandle;
use crate::fem_error::FemError;

/// Compressed incidence between assembly units (elements, facets) and DOFs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Incidence {
    offsets: Vec<usize>,
    entries: Vec<usize>,
}

impl Incidence {
    /// Rows are the given lists, in order.
    pub fn from_lists<'a, I>(lists: I) -> Self
    where
        I: IntoIterator<Item = &'a [usize]>,
    {
        let mut offsets = vec![0];
        let mut entries = Vec::new();
        for l in lists {
            entries.extend_from_slice(l);
            offsets.push(entries.len());
        }
        Self { offsets, entries }
    }

    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.entries[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Transpose with `n_cols` columns, by counting sort.
    pub fn transpose(&self, n_cols: usize) -> Self {
        let mut counts = vec![0usize; n_cols + 1];
        for &c in &self.entries {
            counts[c + 1] += 1;
        }
        for i in 0..n_cols {
            counts[i + 1] += counts[i];
        }
        let offsets = counts.clone();
        let mut fill = counts;
        let mut entries = vec![0; self.entries.len()];
        for r in 0..self.num_rows() {
            for &c in self.row(r) {
                entries[fill[c]] = r;
                fill[c] += 1;
            }
        }
        Self { offsets, entries }
    }
}

/// Neighbors of each of `n_dofs` DOFs: two DOFs are adjacent iff some unit
/// contains both. A DOF is not its own neighbor. Lists are sorted.
pub fn dof_adjacency(n_dofs: usize, units: &Incidence) -> Vec<Vec<DofHandle>> {
    let dof_units = units.transpose(n_dofs);
    let mut marker = vec![usize::MAX; n_dofs];
    let mut adj = Vec::with_capacity(n_dofs);
    for h in 0..n_dofs {
        marker[h] = h;
        let mut list = Vec::new();
        for &u in dof_units.row(h) {
            for &g in units.row(u) {
                if marker[g] != h {
                    marker[g] = h;
                    list.push(g);
                }
            }
        }
        list.sort_unstable();
        adj.push(list);
    }
    adj
}

/// Sparsity pattern of the given coordinates, which need not be sorted or
/// unique.
pub fn pattern_from_coords(
    nrows: usize,
    ncols: usize,
    coords: Vec<(usize, usize)>,
) -> Result<SparsityPattern, FemError> {
    let mut offsets = Vec::with_capacity(nrows + 1);
    let mut cols = Vec::with_capacity(coords.len());
    offsets.push(0);
    for (i, j) in coords.into_iter().sorted_unstable().dedup() {
        if i >= nrows || j >= ncols {
            return Err(FemError::DofIndexOutOfBounds {
                index: if i >= nrows { i } else { j },
                len: if i >= nrows { nrows } else { ncols },
            });
        }
        while offsets.len() <= i {
            offsets.push(cols.len());
        }
        cols.push(j);
    }
    while offsets.len() < nrows + 1 {
        offsets.push(cols.len());
    }
    SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, cols)
        .map_err(|e| FemError::PatternMismatch(e.to_string()))
}

/// Coordinates of the stored entries in storage order.
pub fn pattern_coords(p: &SparsityPattern) -> Vec<(usize, usize)> {
    (0..p.major_dim())
        .flat_map(|i| p.lane(i).iter().map(move |&j| (i, j)))
        .collect()
}

/// Storage position of entry `(i, j)`.
pub fn position(p: &SparsityPattern, i: usize, j: usize) -> Option<usize> {
    position_in(p.major_offsets(), p.minor_indices(), i, j)
}

/// [`position`] on raw CSR arrays.
pub fn position_in(offsets: &[usize], indices: &[usize], i: usize, j: usize) -> Option<usize> {
    let start = *offsets.get(i)?;
    let end = *offsets.get(i + 1)?;
    indices[start..end].binary_search(&j).ok().map(|k| start + k)
}

/// A zero matrix with pattern `p`.
pub fn zero_matrix(p: SparsityPattern) -> Result<CsrMatrix<f64>, FemError> {
    let nnz = p.nnz();
    CsrMatrix::try_from_pattern_and_values(p, vec![0.0; nnz])
        .map_err(|e| FemError::PatternMismatch(e.to_string()))
}
