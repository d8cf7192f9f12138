//! Point smoothers for the edge space.
use crate::assembly::AssembleDiagonal;
use crate::error::{check_vector_size, AmsError};
use fenris_sparse::{LinearOperator, Operator};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use std::error::Error;

/// Scaled Jacobi smoothing `y = scale D^-1 x`.
///
/// The diagonal is taken from the form and treated as one on essential dofs, matching the
/// unit diagonal of the eliminated system.
#[derive(Debug, Clone)]
pub struct JacobiSmoother {
    scaled_inverse_diagonal: DVector<f64>,
}

impl JacobiSmoother {
    /// Fails if a non-essential dof has a zero diagonal entry.
    ///
    /// # Panics
    ///
    /// Panics if an essential dof is out of bounds.
    pub fn new(form: &impl AssembleDiagonal, essential_dofs: &[usize], scale: f64) -> Result<Self, AmsError> {
        let mut diagonal = form.assemble_diagonal();
        for &dof in essential_dofs {
            assert!(dof < diagonal.len(), "Essential dof {} out of bounds", dof);
            diagonal[dof] = 1.0;
        }
        if let Some(dof) = diagonal.iter().position(|&d| d == 0.0) {
            return Err(AmsError::ZeroSmootherDiagonal { dof });
        }
        Ok(Self {
            scaled_inverse_diagonal: diagonal.map(|d| scale / d),
        })
    }

    pub fn scaled_inverse_diagonal(&self) -> &DVector<f64> {
        &self.scaled_inverse_diagonal
    }
}

impl LinearOperator<f64> for JacobiSmoother {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let n = self.scaled_inverse_diagonal.len();
        check_vector_size("Jacobi smoother input", n, x.len())?;
        check_vector_size("Jacobi smoother output", n, y.len())?;
        y.as_mut_slice()
            .par_iter_mut()
            .zip(x.as_slice().par_iter())
            .zip(self.scaled_inverse_diagonal.as_slice().par_iter())
            .for_each(|((y_i, x_i), d_i)| *y_i = d_i * x_i);
        Ok(())
    }
}

impl Operator<f64> for JacobiSmoother {
    fn nrows(&self) -> usize {
        self.scaled_inverse_diagonal.len()
    }

    fn ncols(&self) -> usize {
        self.scaled_inverse_diagonal.len()
    }

    fn apply_transpose(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        self.apply(y, x)
    }
}
