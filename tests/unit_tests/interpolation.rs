use fenris_ams::interpolation::{GradientInterpolator, IdentityInterpolator};
use fenris_ams::mesh::UniformQuadMesh;
use fenris_ams::proptest::{uniform_quad_mesh, vector};
use fenris_ams::space::{H1Space, NedelecSpace};
use fenris_sparse::{LinearOperator, Operator, OperatorError};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DVector, Vector2};
use proptest::prelude::*;

fn gradient(mesh: UniformQuadMesh) -> GradientInterpolator {
    GradientInterpolator::new(&H1Space::scalar(mesh), &NedelecSpace::new(mesh))
}

fn identity(mesh: UniformQuadMesh) -> IdentityInterpolator {
    IdentityInterpolator::new(&H1Space::vector(mesh), &NedelecSpace::new(mesh))
}

fn apply(op: &dyn Operator<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::<f64>::zeros(op.nrows());
    op.apply((&mut y).into(), x.into()).unwrap();
    y
}

fn apply_transpose(op: &dyn Operator<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::<f64>::repeat(op.ncols(), f64::NAN);
    op.apply_transpose((&mut y).into(), x.into()).unwrap();
    y
}

#[test]
fn gradient_dimensions_and_stencil() {
    let mesh = UniformQuadMesh::new(2, 3, 0.5);
    let g = gradient(mesh);
    assert_eq!((g.nrows(), g.ncols()), (17, 12));

    let csr = g.to_csr();
    assert_eq!(csr.nnz(), 2 * 17);
    // Edge 0 runs from node 0 to node 1
    let row = csr.row(0);
    assert_eq!(row.col_indices(), &[0, 1]);
    assert_eq!(row.values(), &[-1.0, 1.0]);
}

#[test]
fn gradient_of_linear_function_is_edge_length_times_slope() {
    let mesh = UniformQuadMesh::new(3, 2, 0.25);
    let u = DVector::from_fn(mesh.num_nodes(), |node, _| {
        let x = mesh.node_position(node);
        2.0 * x.x - 3.0 * x.y + 1.0
    });
    let y = apply(&gradient(mesh), &u);
    let expected = DVector::from_fn(mesh.num_edges(), |edge, _| {
        if edge < mesh.num_horizontal_edges() {
            2.0 * 0.25
        } else {
            -3.0 * 0.25
        }
    });
    assert_matrix_eq!(y, expected, comp = abs, tol = 1e-14);
}

#[test]
fn identity_reproduces_constant_fields() {
    let mesh = UniformQuadMesh::new(2, 2, 0.5);
    let field = Vector2::new(3.0, -1.0);
    let v = DVector::from_fn(2 * mesh.num_nodes(), |dof, _| field[dof % 2]);
    let y = apply(&identity(mesh), &v);
    let expected = DVector::from_fn(mesh.num_edges(), |edge, _| {
        field[mesh.edge_direction(edge).component()] * mesh.cell_size()
    });
    assert_matrix_eq!(y, expected, comp = abs, tol = 1e-14);
}

#[test]
fn identity_matrix_has_half_edge_weights() {
    let mesh = UniformQuadMesh::new(1, 1, 2.0);
    let csr = identity(mesh).to_csr();
    assert_eq!((csr.nrows(), csr.ncols()), (4, 8));
    // Vertical edge 2 connects nodes 0 and 2, so it picks the y components, dofs 1 and 5
    let row = csr.row(2);
    assert_eq!(row.col_indices(), &[1, 5]);
    assert_eq!(row.values(), &[1.0, 1.0]);
}

#[test]
fn apply_rejects_mismatched_vectors() {
    let g = gradient(UniformQuadMesh::unit_square(2));
    let x = DVector::<f64>::zeros(8);
    let mut y = DVector::<f64>::zeros(12);
    let err = g.apply((&mut y).into(), (&x).into()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OperatorError>(),
        Some(OperatorError::DimensionMismatch { .. })
    ));
    let err = g.apply_transpose((&mut y).into(), (&x).into()).unwrap_err();
    assert!(err.downcast_ref::<OperatorError>().is_some());
}

#[test]
fn interpolators_require_matching_spaces() {
    let mesh = UniformQuadMesh::unit_square(2);
    let other = UniformQuadMesh::unit_square(3);
    util::assert_panics!(GradientInterpolator::new(&H1Space::scalar(other), &NedelecSpace::new(mesh)));
    util::assert_panics!(GradientInterpolator::new(&H1Space::vector(mesh), &NedelecSpace::new(mesh)));
    util::assert_panics!(IdentityInterpolator::new(&H1Space::scalar(mesh), &NedelecSpace::new(mesh)));
}

proptest! {
    #[test]
    fn gradient_annihilates_constants(mesh in uniform_quad_mesh(5), c in -5.0..5.0) {
        let y = apply(&gradient(mesh), &DVector::repeat(mesh.num_nodes(), c));
        prop_assert_eq!(y.amax(), 0.0);
    }

    #[test]
    fn matrix_free_application_matches_assembled_matrix(
        (mesh, x, z) in uniform_quad_mesh(4).prop_flat_map(|mesh| {
            (Just(mesh), vector(2 * mesh.num_nodes()), vector(mesh.num_edges()))
        })
    ) {
        let g = gradient(mesh);
        let g_csr = g.to_csr();
        let x_scalar = x.rows(0, mesh.num_nodes()).into_owned();
        prop_assert!((apply(&g, &x_scalar) - &g_csr * &x_scalar).amax() <= 1e-12);
        prop_assert!((apply_transpose(&g, &z) - &g_csr.transpose() * &z).amax() <= 1e-12);

        let pi = identity(mesh);
        let pi_csr = pi.to_csr();
        prop_assert!((apply(&pi, &x) - &pi_csr * &x).amax() <= 1e-12);
        prop_assert!((apply_transpose(&pi, &z) - &pi_csr.transpose() * &z).amax() <= 1e-12);
    }
}
