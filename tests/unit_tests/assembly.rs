use crate::unit_tests::ONE;
use fenris_ams::assembly::{
    edge_curl_curl_element_matrix, edge_mass_element_matrix, nodal_mass_element_matrix,
    nodal_stiffness_element_matrix, AssembleDiagonal, CurlCurlForm, DiffusionForm, VectorDiffusionMassForm,
};
use fenris_ams::coefficient::{AmsCoefficients, ConstantCoefficient, ConstantVectorCoefficient};
use fenris_ams::error::{AmsError, FormTerm};
use fenris_ams::interpolation::GradientInterpolator;
use fenris_ams::mesh::UniformQuadMesh;
use fenris_ams::proptest::uniform_quad_mesh;
use fenris_ams::space::{FiniteElementSpace, H1Space, NedelecSpace};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, Matrix4, Point2, Vector2, Vector4};
use proptest::prelude::*;

static ZERO: ConstantCoefficient = ConstantCoefficient(0.0);

#[test]
fn element_matrices_are_symmetric() {
    for matrix in [
        edge_curl_curl_element_matrix(0.3),
        edge_mass_element_matrix(),
        nodal_stiffness_element_matrix(),
        nodal_mass_element_matrix(0.3),
    ] {
        assert_matrix_eq!(matrix, matrix.transpose(), comp = abs, tol = 1e-15);
    }
}

#[test]
fn nodal_stiffness_annihilates_constants() {
    let k = nodal_stiffness_element_matrix();
    assert_matrix_eq!(k * Vector4::repeat(1.0), Vector4::zeros(), comp = abs, tol = 1e-15);
}

#[test]
fn nodal_mass_integrates_to_cell_area() {
    let h = 0.25;
    let m = nodal_mass_element_matrix(h);
    assert_scalar_eq!(m.sum(), h * h, comp = abs, tol = 1e-15);
}

#[test]
fn local_gradient_is_curl_free_and_maps_edge_mass_to_stiffness() {
    // Rows: bottom, top, left, right edges, columns: counter-clockwise cell nodes
    #[rustfmt::skip]
    let g = Matrix4::new(
        -1.0,  1.0, 0.0,  0.0,
         0.0,  0.0, 1.0, -1.0,
        -1.0,  0.0, 0.0,  1.0,
         0.0, -1.0, 1.0,  0.0);
    let h = 0.5;
    let curl = edge_curl_curl_element_matrix(h) * g;
    assert_matrix_eq!(curl, Matrix4::zeros(), comp = abs, tol = 1e-14);
    let stiffness = g.transpose() * edge_mass_element_matrix() * g;
    assert_matrix_eq!(stiffness, nodal_stiffness_element_matrix(), comp = abs, tol = 1e-14);
}

#[test]
fn curl_curl_of_gradients_vanishes() {
    let mesh = UniformQuadMesh::new(3, 2, 0.5);
    let space = NedelecSpace::new(mesh);
    let curl_curl = CurlCurlForm::new(space, &ONE, &ZERO).assemble();
    let g = GradientInterpolator::new(&H1Space::scalar(mesh), &space).to_csr();
    let product = DMatrix::from(&(&curl_curl * &g));
    assert_matrix_eq!(product, DMatrix::zeros(mesh.num_edges(), mesh.num_nodes()), comp = abs, tol = 1e-12);
}

#[test]
fn edge_mass_restricted_to_gradients_is_nodal_stiffness() {
    let mesh = UniformQuadMesh::new(2, 3, 0.25);
    let space = NedelecSpace::new(mesh);
    let nodal_space = H1Space::scalar(mesh);
    let mass = CurlCurlForm::new(space, &ZERO, &ONE).assemble();
    let g = GradientInterpolator::new(&nodal_space, &space).to_csr();
    let galerkin = DMatrix::from(&(&g.transpose() * &(&mass * &g)));
    let stiffness = DMatrix::from(&DiffusionForm::new(nodal_space, &ONE).assemble());
    assert_matrix_eq!(galerkin, stiffness, comp = abs, tol = 1e-12);
}

#[test]
fn coefficients_are_sampled_at_cell_centroids() {
    let mesh = UniformQuadMesh::new(2, 1, 1.0);
    let space = H1Space::scalar(mesh);
    // One on the left cell, three on the right cell
    let coefficient = |x: &Point2<f64>| if x.x < 1.0 { 1.0 } else { 3.0 };
    let matrix = DMatrix::from(&DiffusionForm::new(space, &coefficient).assemble());
    let k = nodal_stiffness_element_matrix();
    // Node 1 (bottom middle) is shared by both cells
    assert_scalar_eq!(matrix[(1, 1)], 4.0 * k[(0, 0)], comp = abs, tol = 1e-14);
    assert_scalar_eq!(matrix[(0, 0)], k[(0, 0)], comp = abs, tol = 1e-14);
    assert_scalar_eq!(matrix[(2, 2)], 3.0 * k[(0, 0)], comp = abs, tol = 1e-14);
}

#[test]
fn system_has_unit_diagonal_on_essential_dofs() {
    let space = NedelecSpace::new(UniformQuadMesh::unit_square(3));
    let essential_dofs = space.essential_dofs(&[true, true, false, false]).unwrap();
    let system = DMatrix::from(&CurlCurlForm::new(space, &ONE, &ONE).assemble_system(&essential_dofs));
    for &dof in &essential_dofs {
        for other in 0..space.ndofs() {
            let expected = if other == dof { 1.0 } else { 0.0 };
            assert_eq!(system[(dof, other)], expected);
            assert_eq!(system[(other, dof)], expected);
        }
    }
    assert_matrix_eq!(system, system.transpose(), comp = abs, tol = 1e-14);
}

#[test]
fn vector_form_decouples_components() {
    let mesh = UniformQuadMesh::new(2, 2, 0.5);
    let beta = ConstantVectorCoefficient(Vector2::new(1.0, 2.0));
    let coefficients = AmsCoefficients::default()
        .with_alpha(&ONE)
        .with_beta_vector(&beta);
    let form = VectorDiffusionMassForm::from_coefficients(H1Space::vector(mesh), &coefficients).unwrap();
    let matrix = DMatrix::from(&form.assemble());

    let scalar_space = H1Space::scalar(mesh);
    let stiffness = DMatrix::from(&DiffusionForm::new(scalar_space, &ONE).assemble());
    let unit_mass = {
        let mass_only = AmsCoefficients::scalar(&ZERO, &ONE);
        let form = VectorDiffusionMassForm::from_coefficients(H1Space::vector(mesh), &mass_only).unwrap();
        DMatrix::from(&form.assemble())
    };

    let n = mesh.num_nodes();
    for i in 0..n {
        for j in 0..n {
            assert_eq!(matrix[(2 * i, 2 * j + 1)], 0.0);
            assert_eq!(matrix[(2 * i + 1, 2 * j)], 0.0);
            let mass = unit_mass[(2 * i, 2 * j)];
            assert_scalar_eq!(matrix[(2 * i, 2 * j)], stiffness[(i, j)] + mass, comp = abs, tol = 1e-14);
            assert_scalar_eq!(matrix[(2 * i + 1, 2 * j + 1)], stiffness[(i, j)] + 2.0 * mass, comp = abs, tol = 1e-14);
        }
    }
    // The mass of each component integrates to the area of the mesh
    assert_scalar_eq!(unit_mass.sum(), 2.0 * 1.0, comp = abs, tol = 1e-13);
}

#[test]
fn scalar_beta_takes_precedence_over_vector_beta() {
    let mesh = UniformQuadMesh::new(1, 1, 1.0);
    let beta_vector = ConstantVectorCoefficient(Vector2::new(5.0, 7.0));
    let both = AmsCoefficients::scalar(&ZERO, &ONE).with_beta_vector(&beta_vector);
    let scalar_only = AmsCoefficients::scalar(&ZERO, &ONE);
    fn assemble(mesh: UniformQuadMesh, coefficients: &AmsCoefficients) -> DMatrix<f64> {
        let form = VectorDiffusionMassForm::from_coefficients(H1Space::vector(mesh), coefficients).unwrap();
        DMatrix::from(&form.assemble())
    }
    assert_matrix_eq!(assemble(mesh, &both), assemble(mesh, &scalar_only), comp = abs, tol = 0.0);
}

#[test]
fn coefficient_kinds_are_validated() {
    let space = NedelecSpace::new(UniformQuadMesh::unit_square(1));
    let vector = ConstantVectorCoefficient(Vector2::new(1.0, 1.0));

    let vector_alpha = AmsCoefficients::default().with_alpha_vector(&vector).with_beta(&ONE);
    let err = CurlCurlForm::from_coefficients(space, &vector_alpha).err().unwrap();
    assert!(matches!(err, AmsError::UnimplementedCoefficient { term: FormTerm::Diffusion }));

    let no_beta = AmsCoefficients::default().with_alpha(&ONE);
    let err = CurlCurlForm::from_coefficients(space, &no_beta).err().unwrap();
    assert!(matches!(err, AmsError::MissingCoefficient { term: FormTerm::Mass }));

    let h1 = H1Space::vector(*space.mesh());
    let err = VectorDiffusionMassForm::from_coefficients(h1, &no_beta).err().unwrap();
    assert!(matches!(err, AmsError::MissingCoefficient { term: FormTerm::Mass }));
    let err = VectorDiffusionMassForm::from_coefficients(h1, &AmsCoefficients::default().with_beta(&ONE))
        .err()
        .unwrap();
    assert!(matches!(err, AmsError::MissingCoefficient { term: FormTerm::Diffusion }));
}

#[test]
fn scalar_forms_reject_vector_spaces() {
    let mesh = UniformQuadMesh::unit_square(1);
    util::assert_panics!(DiffusionForm::new(H1Space::vector(mesh), &ONE));
    util::assert_panics!(VectorDiffusionMassForm::new(
        H1Space::scalar(mesh),
        &ONE,
        fenris_ams::assembly::MassCoefficient::Scalar(&ONE)
    ));
}

proptest! {
    #[test]
    fn assembled_diagonal_matches_matrix_diagonal(mesh in uniform_quad_mesh(4), a in 0.1..10.0, b in 0.1..10.0) {
        let alpha = ConstantCoefficient(a);
        let beta = ConstantCoefficient(b);
        let form = CurlCurlForm::new(NedelecSpace::new(mesh), &alpha, &beta);
        let matrix = form.assemble();
        let expected: DVector<f64> = DMatrix::from(&matrix).diagonal();
        prop_assert!((form.assemble_diagonal() - &expected).amax() <= 1e-12 * expected.amax());
        prop_assert!((matrix.assemble_diagonal() - &expected).amax() <= 1e-12 * expected.amax());
    }

    #[test]
    fn curl_curl_matrix_is_symmetric_positive_semidefinite(mesh in uniform_quad_mesh(3)) {
        let matrix = DMatrix::from(&CurlCurlForm::new(NedelecSpace::new(mesh), &ONE, &ONE).assemble());
        prop_assert!((&matrix - matrix.transpose()).amax() <= 1e-12);
        let min_eigenvalue = matrix.symmetric_eigenvalues().min();
        prop_assert!(min_eigenvalue > 0.0);
    }
}
