//! Functionality for sparse linear algebra on top of `nalgebra-sparse`.
use core::fmt;
use nalgebra::{DVector, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use serde::{Deserialize, Serialize};

/// What to place on the diagonal of an eliminated (essential) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagonalPolicy {
    /// Leave the assembled diagonal entry untouched.
    Keep,
    /// Set the diagonal entry to one.
    One,
    /// Set the diagonal entry to zero, removing the row and column entirely.
    Zero,
}

impl fmt::Display for DiagonalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "keep"),
            Self::One => write!(f, "one"),
            Self::Zero => write!(f, "zero"),
        }
    }
}

/// Eliminates the given essential degrees of freedom from a structurally symmetric matrix.
///
/// Rows and columns corresponding to `dofs` are zeroed, and the diagonal entry of each
/// such row is set according to `policy`. The sparsity pattern is left unchanged, so
/// `DiagonalPolicy::One` requires the diagonal entries of essential rows to be present
/// in the pattern.
///
/// # Panics
///
/// Panics if the matrix is not square, if a dof is out of bounds, or if the policy requires
/// a diagonal entry that is missing from the pattern.
pub fn eliminate_essential_dofs_csr<T>(matrix: &mut CsrMatrix<T>, dofs: &[usize], policy: DiagonalPolicy)
where
    T: RealField,
{
    assert_eq!(matrix.nrows(), matrix.ncols(), "Elimination requires a square matrix");
    let n = matrix.nrows();

    // We need to do the following:
    //  - zero all rows corresponding to essential dofs
    //  - zero all columns corresponding to essential dofs
    //  - set diagonal entries of essential rows according to the policy
    // Zeroing columns naively means visiting every entry of the matrix. Instead we exploit
    // structural symmetry: if (r, c) is visited with r essential, then row c must be visited
    // later to zero out (c, r).
    let mut essential_membership = vec![false; n];
    let mut rows_to_visit = vec![false; n];

    for &dof in dofs {
        assert!(dof < n, "Essential dof {} out of bounds for matrix of size {}", dof, n);
        essential_membership[dof] = true;
        let mut row = matrix.row_mut(dof);
        let (cols, values) = row.cols_and_values_mut();

        let mut found_diagonal = false;
        for (&col_idx, val) in cols.iter().zip(values) {
            if col_idx == dof {
                found_diagonal = true;
                match policy {
                    DiagonalPolicy::Keep => {}
                    DiagonalPolicy::One => *val = T::one(),
                    DiagonalPolicy::Zero => *val = T::zero(),
                }
            } else {
                *val = T::zero();
                rows_to_visit[col_idx] = true;
            }
        }
        assert!(
            found_diagonal || policy == DiagonalPolicy::Zero,
            "Diagonal entry of essential row {} is missing from the sparsity pattern",
            dof
        );
    }

    let row_visit_iter = rows_to_visit
        .iter()
        .enumerate()
        .filter_map(|(index, &should_visit)| if should_visit { Some(index) } else { None });
    for row_index in row_visit_iter {
        if !essential_membership[row_index] {
            let mut row = matrix.row_mut(row_index);
            let (cols, values) = row.cols_and_values_mut();
            for (local_idx, &global_idx) in cols.iter().enumerate() {
                if essential_membership[global_idx] {
                    values[local_idx] = T::zero();
                }
            }
        }
    }
}

/// Sets the listed entries of `vector` to zero.
pub fn zero_entries<'a, T>(vector: impl Into<DVectorViewMut<'a, T>>, indices: &[usize])
where
    T: Scalar + Zero,
{
    let mut vector = vector.into();
    for &idx in indices {
        vector[idx] = T::zero();
    }
}

/// Extracts the diagonal of a square CSR matrix. Missing entries are zero.
pub fn csr_diagonal<T>(matrix: &CsrMatrix<T>) -> DVector<T>
where
    T: Scalar + Zero,
{
    assert_eq!(matrix.nrows(), matrix.ncols(), "Diagonal requires a square matrix");
    DVector::from_iterator(
        matrix.nrows(),
        (0..matrix.nrows()).map(|i| {
            let row = matrix.row(i);
            row.col_indices()
                .iter()
                .position(|&j| j == i)
                .map(|local| row.values()[local].clone())
                .unwrap_or_else(T::zero)
        }),
    )
}
