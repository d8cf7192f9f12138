//! Assembly of the bilinear forms on uniform quadrilateral meshes.
//!
//! All cells of a [`UniformQuadMesh`] are congruent squares, so the element matrices are
//! known in closed form. Coefficients are sampled at the cell centroid.
use crate::coefficient::{AmsCoefficients, Coefficient, VectorCoefficient};
use crate::error::{AmsError, FormTerm};
use crate::space::{FiniteElementSpace, H1Space, NedelecSpace};
use fenris_sparse::{csr_diagonal, eliminate_essential_dofs_csr, DiagonalPolicy};
use itertools::izip;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, Matrix4};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::cell::RefCell;

/// Curl-curl matrix of a lowest-order edge element on a square cell of side `h`.
///
/// Edges are ordered bottom, top, left, right and oriented along the positive axes, so
/// the (constant) curl of edge basis function `i` is `s_i / h^2` with `s = [1, -1, -1, 1]`.
pub fn edge_curl_curl_element_matrix(h: f64) -> Matrix4<f64> {
    let s = nalgebra::Vector4::new(1.0, -1.0, -1.0, 1.0);
    s * s.transpose() / (h * h)
}

/// Mass matrix of a lowest-order edge element on a square cell. Independent of the cell size.
#[rustfmt::skip]
pub fn edge_mass_element_matrix() -> Matrix4<f64> {
    let (d, o) = (1.0 / 3.0, 1.0 / 6.0);
    Matrix4::new(
        d,   o,   0.0, 0.0,
        o,   d,   0.0, 0.0,
        0.0, 0.0, d,   o,
        0.0, 0.0, o,   d)
}

/// Stiffness (Laplacian) matrix of a bilinear element on a square cell. Independent of the
/// cell size in two dimensions.
#[rustfmt::skip]
pub fn nodal_stiffness_element_matrix() -> Matrix4<f64> {
    Matrix4::new(
         4.0, -1.0, -2.0, -1.0,
        -1.0,  4.0, -1.0, -2.0,
        -2.0, -1.0,  4.0, -1.0,
        -1.0, -2.0, -1.0,  4.0) / 6.0
}

/// Mass matrix of a bilinear element on a square cell of side `h`.
#[rustfmt::skip]
pub fn nodal_mass_element_matrix(h: f64) -> Matrix4<f64> {
    Matrix4::new(
        4.0, 2.0, 1.0, 2.0,
        2.0, 4.0, 2.0, 1.0,
        1.0, 2.0, 4.0, 2.0,
        2.0, 1.0, 2.0, 4.0) * (h * h / 36.0)
}

/// Cell-wise contributions of a bilinear form.
pub trait CellMatrixAssembler {
    /// The number of global degrees of freedom.
    fn num_dofs(&self) -> usize;

    fn num_cells(&self) -> usize;

    fn cell_dof_count(&self) -> usize;

    fn populate_cell_dofs(&self, dofs: &mut [usize], cell: usize);

    /// Writes the cell matrix into `output`, which is zero on entry.
    fn assemble_cell_matrix_into(&self, cell: usize, output: DMatrixViewMut<f64>);
}

/// An assembler for CSR matrices.
#[derive(Debug, Default)]
pub struct CsrAssembler {
    // Buffers reused across cells
    workspace: RefCell<CsrAssemblerWorkspace>,
}

#[derive(Debug)]
struct CsrAssemblerWorkspace {
    cell_dofs: Vec<usize>,
    cell_matrix: DMatrix<f64>,
}

impl Default for CsrAssemblerWorkspace {
    fn default() -> Self {
        Self {
            cell_dofs: Vec::new(),
            cell_matrix: DMatrix::zeros(0, 0),
        }
    }
}

impl CsrAssembler {
    fn for_each_cell(&self, assembler: &dyn CellMatrixAssembler, mut f: impl FnMut(&[usize], &DMatrix<f64>)) {
        let ws = &mut *self.workspace.borrow_mut();
        let n = assembler.cell_dof_count();
        ws.cell_dofs.resize(n, 0);
        ws.cell_matrix.resize_mut(n, n, 0.0);
        for cell in 0..assembler.num_cells() {
            ws.cell_matrix.fill(0.0);
            assembler.populate_cell_dofs(&mut ws.cell_dofs, cell);
            assembler.assemble_cell_matrix_into(cell, DMatrixViewMut::from(&mut ws.cell_matrix));
            f(&ws.cell_dofs, &ws.cell_matrix);
        }
    }

    /// Assembles the global matrix. Every pair of degrees of freedom sharing a cell is part of
    /// the sparsity pattern, including pairs whose value is zero.
    pub fn assemble(&self, assembler: &dyn CellMatrixAssembler) -> CsrMatrix<f64> {
        let n = assembler.num_dofs();
        let mut coo = CooMatrix::new(n, n);
        self.for_each_cell(assembler, |dofs, matrix| {
            for (a, &i) in dofs.iter().enumerate() {
                for (b, &j) in dofs.iter().enumerate() {
                    coo.push(i, j, matrix[(a, b)]);
                }
            }
        });
        CsrMatrix::from(&coo)
    }

    /// Assembles only the diagonal of the global matrix.
    pub fn assemble_diagonal(&self, assembler: &dyn CellMatrixAssembler) -> DVector<f64> {
        let mut diagonal = DVector::zeros(assembler.num_dofs());
        self.for_each_cell(assembler, |dofs, matrix| {
            for (&i, d) in izip!(dofs, matrix.diagonal().iter()) {
                diagonal[i] += *d;
            }
        });
        diagonal
    }
}

/// Forms whose diagonal can be computed without assembling the full matrix.
pub trait AssembleDiagonal {
    fn assemble_diagonal(&self) -> DVector<f64>;
}

impl<A: CellMatrixAssembler> AssembleDiagonal for A {
    fn assemble_diagonal(&self) -> DVector<f64> {
        CsrAssembler::default().assemble_diagonal(self)
    }
}

impl AssembleDiagonal for CsrMatrix<f64> {
    fn assemble_diagonal(&self) -> DVector<f64> {
        csr_diagonal(self)
    }
}

/// Assembles the form and eliminates the given essential degrees of freedom.
pub fn assemble_eliminated(
    assembler: &dyn CellMatrixAssembler,
    essential_dofs: &[usize],
    policy: DiagonalPolicy,
) -> CsrMatrix<f64> {
    let mut matrix = CsrAssembler::default().assemble(assembler);
    eliminate_essential_dofs_csr(&mut matrix, essential_dofs, policy);
    matrix
}

/// Picks the scalar coefficient of a term that only supports scalar coefficients.
pub(crate) fn require_scalar<'a>(
    term: FormTerm,
    scalar: Option<&'a dyn Coefficient>,
    vector: Option<&'a dyn VectorCoefficient>,
) -> Result<&'a dyn Coefficient, AmsError> {
    match (scalar, vector) {
        (Some(coefficient), _) => Ok(coefficient),
        (None, Some(_)) => Err(AmsError::UnimplementedCoefficient { term }),
        (None, None) => Err(AmsError::MissingCoefficient { term }),
    }
}

/// The system form `(alpha curl u, curl v) + (beta u, v)` on the edge space.
pub struct CurlCurlForm<'a> {
    space: NedelecSpace,
    alpha: &'a dyn Coefficient,
    beta: &'a dyn Coefficient,
}

impl<'a> CurlCurlForm<'a> {
    pub fn new(space: NedelecSpace, alpha: &'a dyn Coefficient, beta: &'a dyn Coefficient) -> Self {
        Self { space, alpha, beta }
    }

    pub fn from_coefficients(space: NedelecSpace, coefficients: &AmsCoefficients<'a>) -> Result<Self, AmsError> {
        let alpha = require_scalar(FormTerm::Diffusion, coefficients.alpha, coefficients.alpha_vector)?;
        let beta = require_scalar(FormTerm::Mass, coefficients.beta, coefficients.beta_vector)?;
        Ok(Self::new(space, alpha, beta))
    }

    pub fn space(&self) -> &NedelecSpace {
        &self.space
    }

    pub fn assemble(&self) -> CsrMatrix<f64> {
        CsrAssembler::default().assemble(self)
    }

    /// The system matrix with essential dofs eliminated and a unit diagonal in their rows.
    pub fn assemble_system(&self, essential_dofs: &[usize]) -> CsrMatrix<f64> {
        assemble_eliminated(self, essential_dofs, DiagonalPolicy::One)
    }
}

impl<'a> CellMatrixAssembler for CurlCurlForm<'a> {
    fn num_dofs(&self) -> usize {
        self.space.ndofs()
    }

    fn num_cells(&self) -> usize {
        self.space.mesh().num_cells()
    }

    fn cell_dof_count(&self) -> usize {
        4
    }

    fn populate_cell_dofs(&self, dofs: &mut [usize], cell: usize) {
        dofs.copy_from_slice(&self.space.mesh().cell_edges(cell));
    }

    fn assemble_cell_matrix_into(&self, cell: usize, mut output: DMatrixViewMut<f64>) {
        let mesh = self.space.mesh();
        let centroid = mesh.cell_centroid(cell);
        let alpha = self.alpha.evaluate(&centroid);
        let beta = self.beta.evaluate(&centroid);
        let local = edge_curl_curl_element_matrix(mesh.cell_size()) * alpha + edge_mass_element_matrix() * beta;
        output.copy_from(&local);
    }
}

/// The scalar diffusion form `(beta grad u, grad v)`.
pub struct DiffusionForm<'a> {
    space: H1Space,
    coefficient: &'a dyn Coefficient,
}

impl<'a> DiffusionForm<'a> {
    /// # Panics
    ///
    /// Panics if the space is not scalar.
    pub fn new(space: H1Space, coefficient: &'a dyn Coefficient) -> Self {
        assert_eq!(space.vdim(), 1, "Diffusion form requires a scalar space");
        Self { space, coefficient }
    }

    pub fn space(&self) -> &H1Space {
        &self.space
    }

    pub fn assemble(&self) -> CsrMatrix<f64> {
        CsrAssembler::default().assemble(self)
    }
}

impl<'a> CellMatrixAssembler for DiffusionForm<'a> {
    fn num_dofs(&self) -> usize {
        self.space.ndofs()
    }

    fn num_cells(&self) -> usize {
        self.space.mesh().num_cells()
    }

    fn cell_dof_count(&self) -> usize {
        4
    }

    fn populate_cell_dofs(&self, dofs: &mut [usize], cell: usize) {
        dofs.copy_from_slice(&self.space.mesh().cell_nodes(cell));
    }

    fn assemble_cell_matrix_into(&self, cell: usize, mut output: DMatrixViewMut<f64>) {
        let centroid = self.space.mesh().cell_centroid(cell);
        let coefficient = self.coefficient.evaluate(&centroid);
        output.copy_from(&(nodal_stiffness_element_matrix() * coefficient));
    }
}

/// Mass coefficient of [`VectorDiffusionMassForm`].
#[derive(Clone, Copy)]
pub enum MassCoefficient<'a> {
    /// The same coefficient for every component.
    Scalar(&'a dyn Coefficient),
    /// One coefficient per component.
    Vector(&'a dyn VectorCoefficient),
}

impl<'a> MassCoefficient<'a> {
    fn evaluate(&self, x: &nalgebra::Point2<f64>) -> nalgebra::Vector2<f64> {
        match self {
            Self::Scalar(coefficient) => nalgebra::Vector2::repeat(coefficient.evaluate(x)),
            Self::Vector(coefficient) => coefficient.evaluate(x),
        }
    }
}

/// The vector form `(alpha grad u, grad v) + (beta u, v)` on a vector nodal space,
/// with no coupling between components.
pub struct VectorDiffusionMassForm<'a> {
    space: H1Space,
    diffusion: &'a dyn Coefficient,
    mass: MassCoefficient<'a>,
}

impl<'a> VectorDiffusionMassForm<'a> {
    /// # Panics
    ///
    /// Panics if the space does not have two components.
    pub fn new(space: H1Space, diffusion: &'a dyn Coefficient, mass: MassCoefficient<'a>) -> Self {
        assert_eq!(space.vdim(), 2, "Vector diffusion-mass form requires a two-component space");
        Self { space, diffusion, mass }
    }

    /// Diffusion from the scalar `alpha`, mass from `beta` (scalar takes precedence) or `beta_vector`.
    pub fn from_coefficients(space: H1Space, coefficients: &AmsCoefficients<'a>) -> Result<Self, AmsError> {
        let diffusion = require_scalar(FormTerm::Diffusion, coefficients.alpha, coefficients.alpha_vector)?;
        let mass = match (coefficients.beta, coefficients.beta_vector) {
            (Some(beta), _) => MassCoefficient::Scalar(beta),
            (None, Some(beta)) => MassCoefficient::Vector(beta),
            (None, None) => return Err(AmsError::MissingCoefficient { term: FormTerm::Mass }),
        };
        Ok(Self::new(space, diffusion, mass))
    }

    pub fn space(&self) -> &H1Space {
        &self.space
    }

    pub fn assemble(&self) -> CsrMatrix<f64> {
        CsrAssembler::default().assemble(self)
    }
}

impl<'a> CellMatrixAssembler for VectorDiffusionMassForm<'a> {
    fn num_dofs(&self) -> usize {
        self.space.ndofs()
    }

    fn num_cells(&self) -> usize {
        self.space.mesh().num_cells()
    }

    fn cell_dof_count(&self) -> usize {
        8
    }

    fn populate_cell_dofs(&self, dofs: &mut [usize], cell: usize) {
        let nodes = self.space.mesh().cell_nodes(cell);
        for (local_dofs, &node) in dofs.chunks_exact_mut(2).zip(&nodes) {
            local_dofs[0] = self.space.dof(node, 0);
            local_dofs[1] = self.space.dof(node, 1);
        }
    }

    fn assemble_cell_matrix_into(&self, cell: usize, mut output: DMatrixViewMut<f64>) {
        let mesh = self.space.mesh();
        let centroid = mesh.cell_centroid(cell);
        let alpha = self.diffusion.evaluate(&centroid);
        let beta = self.mass.evaluate(&centroid);
        let stiffness = nodal_stiffness_element_matrix() * alpha;
        let mass = nodal_mass_element_matrix(mesh.cell_size());
        for c in 0..2 {
            let block = stiffness + mass * beta[c];
            for a in 0..4 {
                for b in 0..4 {
                    output[(2 * a + c, 2 * b + c)] = block[(a, b)];
                }
            }
        }
    }
}
