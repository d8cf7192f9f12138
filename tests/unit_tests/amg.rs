use crate::unit_tests::{pcg_iterations, tridiagonal_spd, ONE};
use fenris_ams::amg::{AlgebraicMultigrid, AmgOptions};
use fenris_ams::assembly::DiffusionForm;
use fenris_ams::error::AmsError;
use fenris_ams::mesh::UniformQuadMesh;
use fenris_ams::proptest::vector;
use fenris_ams::space::{FiniteElementSpace, H1Space};
use fenris_sparse::{eliminate_essential_dofs_csr, DiagonalPolicy, LinearOperator, Operator};
use log::LevelFilter;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use proptest::prelude::*;

fn apply(amg: &AlgebraicMultigrid, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::<f64>::zeros(amg.nrows());
    amg.apply((&mut y).into(), x.into()).unwrap();
    y
}

/// The Laplacian on the unit square with the boundary eliminated.
fn eliminated_laplacian(cells_per_dim: usize, policy: DiagonalPolicy) -> (CsrMatrix<f64>, Vec<usize>) {
    let space = H1Space::scalar(UniformQuadMesh::unit_square(cells_per_dim));
    let boundary = space.essential_dofs(&[true; 4]).unwrap();
    let mut matrix = DiffusionForm::new(space, &ONE).assemble();
    eliminate_essential_dofs_csr(&mut matrix, &boundary, policy);
    (matrix, boundary)
}

#[test]
fn small_matrix_is_solved_directly() {
    let dense = tridiagonal_spd(10);
    let amg = AlgebraicMultigrid::new(&CsrMatrix::from(&dense), &AmgOptions::default()).unwrap();
    assert_eq!(amg.num_levels(), 1);
    assert_eq!(amg.level_sizes(), vec![10]);
    assert_eq!(amg.operator_complexity(), 1.0);

    let b = DVector::from_fn(10, |i, _| i as f64 - 3.0);
    let x = apply(&amg, &b);
    assert_matrix_eq!(&dense * x, b, comp = abs, tol = 1e-10);
}

#[test]
fn hierarchy_coarsens_laplacian() {
    let (matrix, _) = eliminated_laplacian(16, DiagonalPolicy::One);
    let amg = AlgebraicMultigrid::new(&matrix, &AmgOptions::default()).unwrap();
    let sizes = amg.level_sizes();
    assert!(amg.num_levels() > 1);
    assert_eq!(sizes[0], 289);
    assert!(sizes.windows(2).all(|w| w[1] < w[0]));
    assert!(*sizes.last().unwrap() <= 40 || amg.num_levels() == 10);
    assert!(amg.operator_complexity() < 3.0);
}

#[test]
fn level_count_is_capped() {
    let (matrix, _) = eliminated_laplacian(16, DiagonalPolicy::One);
    let options = AmgOptions {
        max_levels: 2,
        coarse_size: 1,
        ..AmgOptions::default()
    };
    let amg = AlgebraicMultigrid::new(&matrix, &options).unwrap();
    assert_eq!(amg.num_levels(), 2);
}

#[test]
fn v_cycle_accelerates_cg() {
    let (matrix, boundary) = eliminated_laplacian(16, DiagonalPolicy::One);
    let amg = AlgebraicMultigrid::new(&matrix, &AmgOptions::default()).unwrap();
    let mut b = DVector::<f64>::repeat(matrix.nrows(), 1.0);
    for &dof in &boundary {
        b[dof] = 0.0;
    }
    let preconditioned = pcg_iterations(&matrix, &amg, &b);
    let plain = pcg_iterations(&matrix, &CsrMatrix::<f64>::identity(matrix.nrows()), &b);
    assert!(
        preconditioned < plain,
        "AMG-preconditioned CG took {} iterations, plain CG {}",
        preconditioned,
        plain
    );
}

#[test]
fn null_rows_stay_zero() {
    let (matrix, boundary) = eliminated_laplacian(12, DiagonalPolicy::Zero);
    let options = AmgOptions {
        coarse_size: 10,
        ..AmgOptions::default()
    };
    let amg = AlgebraicMultigrid::new(&matrix, &options).unwrap();
    assert!(amg.num_levels() > 1);
    let y = apply(&amg, &DVector::repeat(matrix.nrows(), 1.0));
    util::assert_entries_zero!(y, boundary);
    assert!(y.amax() > 0.0);
}

#[test]
fn null_rows_on_coarsest_level_are_exactly_zero() {
    let (matrix, boundary) = eliminated_laplacian(4, DiagonalPolicy::Zero);
    let amg = AlgebraicMultigrid::new(&matrix, &AmgOptions::default()).unwrap();
    assert_eq!(amg.num_levels(), 1);

    let b = DVector::from_fn(matrix.nrows(), |i, _| 1.0 + 0.1 * i as f64);
    let y = apply(&amg, &b);
    util::assert_entries_zero!(y, boundary);

    // Interior rows are solved exactly
    let residual = &b - &matrix * &y;
    let interior: Vec<_> = (0..matrix.nrows()).filter(|i| !boundary.contains(i)).collect();
    for i in interior {
        assert!(residual[i].abs() <= 1e-10, "residual {:e} in row {}", residual[i], i);
    }
}

#[test]
fn verbosity_does_not_change_the_hierarchy() {
    let (matrix, _) = eliminated_laplacian(16, DiagonalPolicy::One);
    let quiet = AlgebraicMultigrid::with_verbosity(&matrix, &AmgOptions::default(), LevelFilter::Off).unwrap();
    let chatty = AlgebraicMultigrid::with_verbosity(&matrix, &AmgOptions::default(), LevelFilter::Trace).unwrap();
    assert!(quiet.num_levels() > 1);
    assert_eq!(quiet.level_sizes(), chatty.level_sizes());

    let b = DVector::from_fn(matrix.nrows(), |i, _| (i % 7) as f64);
    assert_eq!(apply(&quiet, &b), apply(&chatty, &b));
}

#[test]
fn zero_matrix_maps_to_zero() {
    let amg = AlgebraicMultigrid::new(&CsrMatrix::zeros(5, 5), &AmgOptions::default()).unwrap();
    assert_eq!(apply(&amg, &DVector::repeat(5, 1.0)), DVector::zeros(5));
}

#[test]
fn setup_rejects_invalid_input() {
    let err = AlgebraicMultigrid::new(&CsrMatrix::zeros(4, 5), &AmgOptions::default()).unwrap_err();
    assert!(matches!(err, AmsError::AmgSetup { .. }));

    let options = AmgOptions {
        num_functions: 2,
        ..AmgOptions::default()
    };
    let err = AlgebraicMultigrid::new(&CsrMatrix::from(&tridiagonal_spd(5)), &options).unwrap_err();
    assert!(matches!(err, AmsError::AmgSetup { .. }));

    let options = AmgOptions {
        num_functions: 0,
        ..AmgOptions::default()
    };
    assert!(AlgebraicMultigrid::new(&CsrMatrix::from(&tridiagonal_spd(4)), &options).is_err());
}

#[test]
fn apply_rejects_mismatched_vectors() {
    let amg = AlgebraicMultigrid::new(&CsrMatrix::from(&tridiagonal_spd(4)), &AmgOptions::default()).unwrap();
    let mut y = DVector::<f64>::zeros(4);
    let x = DVector::<f64>::zeros(3);
    let err = amg.apply((&mut y).into(), (&x).into()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AmsError>(),
        Some(AmsError::VectorSizeMismatch { expected: 4, actual: 3, .. })
    ));
}

#[test]
fn options_deserialize_with_defaults() {
    let options: AmgOptions = serde_json::from_str(r#"{ "coarse_size": 7 }"#).unwrap();
    assert_eq!(
        options,
        AmgOptions {
            coarse_size: 7,
            ..AmgOptions::default()
        }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn v_cycle_is_symmetric(
        x in vector(12 * 12),
        z in vector(12 * 12)
    ) {
        // Without elimination the Laplacian has no boundary, so use a mass shift
        let space = H1Space::scalar(UniformQuadMesh::unit_square(11));
        let mut matrix = DMatrix::from(&DiffusionForm::new(space, &ONE).assemble());
        matrix += DMatrix::identity(144, 144) * 0.1;
        let options = AmgOptions { coarse_size: 10, ..AmgOptions::default() };
        let amg = AlgebraicMultigrid::new(&CsrMatrix::from(&matrix), &options).unwrap();
        let lhs = apply(&amg, &x).dot(&z);
        let rhs = x.dot(&apply(&amg, &z));
        prop_assert!((lhs - rhs).abs() <= 1e-10 * (1.0 + lhs.abs()));
    }
}
