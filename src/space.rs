//! Finite element spaces on a [`UniformQuadMesh`].
use crate::error::AmsError;
use crate::mesh::UniformQuadMesh;

pub trait FiniteElementSpace {
    fn mesh(&self) -> &UniformQuadMesh;

    /// The number of (true) degrees of freedom.
    fn ndofs(&self) -> usize;

    /// Sorted degrees of freedom on the boundary sides selected by `marker`.
    fn essential_dofs(&self, marker: &[bool]) -> Result<Vec<usize>, AmsError>;
}

/// The lowest-order Nédélec (edge) space. One degree of freedom per edge, the tangential
/// line integral along the edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NedelecSpace {
    mesh: UniformQuadMesh,
}

impl NedelecSpace {
    pub fn new(mesh: UniformQuadMesh) -> Self {
        Self { mesh }
    }

    /// The polynomial order of the space.
    pub fn order(&self) -> usize {
        1
    }
}

impl FiniteElementSpace for NedelecSpace {
    fn mesh(&self) -> &UniformQuadMesh {
        &self.mesh
    }

    fn ndofs(&self) -> usize {
        self.mesh.num_edges()
    }

    fn essential_dofs(&self, marker: &[bool]) -> Result<Vec<usize>, AmsError> {
        self.mesh.boundary_edges(marker)
    }
}

/// The bilinear nodal (Q1) space with `vdim` components per node.
///
/// Components are interleaved, so component `c` of node `n` is the degree of freedom
/// `vdim * n + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct H1Space {
    mesh: UniformQuadMesh,
    vdim: usize,
}

impl H1Space {
    pub fn scalar(mesh: UniformQuadMesh) -> Self {
        Self { mesh, vdim: 1 }
    }

    /// One component per spatial dimension.
    pub fn vector(mesh: UniformQuadMesh) -> Self {
        Self { mesh, vdim: 2 }
    }

    pub fn vdim(&self) -> usize {
        self.vdim
    }

    pub fn dof(&self, node: usize, component: usize) -> usize {
        debug_assert!(component < self.vdim);
        self.vdim * node + component
    }
}

impl FiniteElementSpace for H1Space {
    fn mesh(&self) -> &UniformQuadMesh {
        &self.mesh
    }

    fn ndofs(&self) -> usize {
        self.vdim * self.mesh.num_nodes()
    }

    fn essential_dofs(&self, marker: &[bool]) -> Result<Vec<usize>, AmsError> {
        let nodes = self.mesh.boundary_nodes(marker)?;
        Ok(nodes
            .iter()
            .flat_map(|&node| (0..self.vdim).map(move |c| self.dof(node, c)))
            .collect())
    }
}
