//! Strategies for property-based testing.
use crate::mesh::UniformQuadMesh;
use ::proptest::prelude::*;
use nalgebra::{DVector, Point2};

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Keep coordinates small so that meshes built from them stay well-scaled
    let range = -10.0..10.0;
    [range.clone(), range].prop_map(|[x, y]| Point2::new(x, y))
}

/// Small meshes with between one and `max_cells` cells in each direction.
pub fn uniform_quad_mesh(max_cells: usize) -> impl Strategy<Value = UniformQuadMesh> {
    (1..=max_cells, 1..=max_cells, 0.1..2.0, point2())
        .prop_map(|(cells_x, cells_y, h, origin)| UniformQuadMesh::with_origin(cells_x, cells_y, h, origin))
}

/// Vectors of the given length with entries in `[-1, 1]`.
pub fn vector(len: usize) -> impl Strategy<Value = DVector<f64>> {
    ::proptest::collection::vec(-1.0..1.0, len).prop_map(DVector::from_vec)
}

/// Boundary markers for the four sides of a [`UniformQuadMesh`].
pub fn boundary_marker() -> impl Strategy<Value = Vec<bool>> {
    ::proptest::collection::vec(any::<bool>(), 4)
}
