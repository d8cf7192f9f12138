//! Matrix-free maps from the nodal auxiliary spaces into the edge space.
//!
//! Both interpolators act directly on the mesh connectivity and never store a matrix.
//! [`GradientInterpolator::to_csr`] and [`IdentityInterpolator::to_csr`] assemble the
//! equivalent sparse matrices, mostly for inspection and testing.
use crate::mesh::UniformQuadMesh;
use crate::space::{FiniteElementSpace, H1Space, NedelecSpace};
use fenris_sparse::operator::{check_apply_dims, check_apply_transpose_dims};
use fenris_sparse::{LinearOperator, Operator};
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::error::Error;

/// The discrete gradient `G`, mapping nodal values to edge line integrals.
///
/// `(G u)_e = u(end) - u(start)`.
#[derive(Debug, Clone)]
pub struct GradientInterpolator {
    mesh: UniformQuadMesh,
}

impl GradientInterpolator {
    /// # Panics
    ///
    /// Panics if the spaces are not defined on the same mesh, or the nodal space is not scalar.
    pub fn new(nodal_space: &H1Space, edge_space: &NedelecSpace) -> Self {
        assert_eq!(nodal_space.mesh(), edge_space.mesh(), "Spaces must share a mesh");
        assert_eq!(nodal_space.vdim(), 1, "Gradient interpolation requires a scalar nodal space");
        Self {
            mesh: *edge_space.mesh(),
        }
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.mesh.num_edges(), self.mesh.num_nodes());
        for edge in 0..self.mesh.num_edges() {
            let [start, end] = self.mesh.edge_endpoints(edge);
            coo.push(edge, start, -1.0);
            coo.push(edge, end, 1.0);
        }
        CsrMatrix::from(&coo)
    }
}

impl LinearOperator<f64> for GradientInterpolator {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        check_apply_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        for edge in 0..self.mesh.num_edges() {
            let [start, end] = self.mesh.edge_endpoints(edge);
            y[edge] = x[end] - x[start];
        }
        Ok(())
    }
}

impl Operator<f64> for GradientInterpolator {
    fn nrows(&self) -> usize {
        self.mesh.num_edges()
    }

    fn ncols(&self) -> usize {
        self.mesh.num_nodes()
    }

    fn apply_transpose(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        check_apply_transpose_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        y.fill(0.0);
        for edge in 0..self.mesh.num_edges() {
            let [start, end] = self.mesh.edge_endpoints(edge);
            y[start] -= x[edge];
            y[end] += x[edge];
        }
        Ok(())
    }
}

/// Nodal interpolation `Pi` of vector fields from the two-component nodal space into the
/// edge space.
///
/// The line integral of a bilinear field along an edge of length `h` is
/// `h / 2 (v_start + v_end) . t_e`, where `t_e` is the unit tangent of the edge.
#[derive(Debug, Clone)]
pub struct IdentityInterpolator {
    mesh: UniformQuadMesh,
}

impl IdentityInterpolator {
    /// # Panics
    ///
    /// Panics if the spaces are not defined on the same mesh, or the nodal space does not
    /// have two components.
    pub fn new(nodal_space: &H1Space, edge_space: &NedelecSpace) -> Self {
        assert_eq!(nodal_space.mesh(), edge_space.mesh(), "Spaces must share a mesh");
        assert_eq!(nodal_space.vdim(), 2, "Identity interpolation requires a vector nodal space");
        Self {
            mesh: *edge_space.mesh(),
        }
    }

    /// The two nodal dofs contributing to an edge, and the weight of each.
    fn edge_stencil(&self, edge: usize) -> ([usize; 2], f64) {
        let [start, end] = self.mesh.edge_endpoints(edge);
        let c = self.mesh.edge_direction(edge).component();
        ([2 * start + c, 2 * end + c], 0.5 * self.mesh.cell_size())
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.nrows(), self.ncols());
        for edge in 0..self.mesh.num_edges() {
            let (dofs, weight) = self.edge_stencil(edge);
            for dof in dofs {
                coo.push(edge, dof, weight);
            }
        }
        CsrMatrix::from(&coo)
    }
}

impl LinearOperator<f64> for IdentityInterpolator {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        check_apply_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        for edge in 0..self.mesh.num_edges() {
            let ([a, b], weight) = self.edge_stencil(edge);
            y[edge] = weight * (x[a] + x[b]);
        }
        Ok(())
    }
}

impl Operator<f64> for IdentityInterpolator {
    fn nrows(&self) -> usize {
        self.mesh.num_edges()
    }

    fn ncols(&self) -> usize {
        2 * self.mesh.num_nodes()
    }

    fn apply_transpose(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        check_apply_transpose_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        y.fill(0.0);
        for edge in 0..self.mesh.num_edges() {
            let ([a, b], weight) = self.edge_stencil(edge);
            y[a] += weight * x[edge];
            y[b] += weight * x[edge];
        }
        Ok(())
    }
}
