use fenris_ams::mesh::UniformQuadMesh;
use fenris_ams::proptest::{boundary_marker, uniform_quad_mesh};
use fenris_ams::space::{FiniteElementSpace, H1Space, NedelecSpace};
use proptest::prelude::*;

#[test]
fn dof_counts() {
    let mesh = UniformQuadMesh::new(2, 3, 0.5);
    assert_eq!(NedelecSpace::new(mesh).ndofs(), 17);
    assert_eq!(NedelecSpace::new(mesh).order(), 1);
    assert_eq!(H1Space::scalar(mesh).ndofs(), 12);
    assert_eq!(H1Space::vector(mesh).ndofs(), 24);
    assert_eq!(H1Space::vector(mesh).vdim(), 2);
}

#[test]
fn vector_dofs_are_interleaved() {
    let space = H1Space::vector(UniformQuadMesh::unit_square(2));
    assert_eq!(space.dof(0, 0), 0);
    assert_eq!(space.dof(0, 1), 1);
    assert_eq!(space.dof(4, 1), 9);
}

#[test]
fn essential_dofs() {
    let mesh = UniformQuadMesh::unit_square(2);
    let bottom = [true, false, false, false];
    assert_eq!(NedelecSpace::new(mesh).essential_dofs(&bottom).unwrap(), vec![0, 1]);
    assert_eq!(H1Space::scalar(mesh).essential_dofs(&bottom).unwrap(), vec![0, 1, 2]);
    assert_eq!(
        H1Space::vector(mesh).essential_dofs(&bottom).unwrap(),
        vec![0, 1, 2, 3, 4, 5]
    );
    assert!(NedelecSpace::new(mesh)
        .essential_dofs(&[false, false, false, false, true])
        .is_err());
}

proptest! {
    #[test]
    fn vector_essential_dofs_cover_both_components(
        mesh in uniform_quad_mesh(4),
        marker in boundary_marker()
    ) {
        let scalar = H1Space::scalar(mesh).essential_dofs(&marker).unwrap();
        let vector = H1Space::vector(mesh).essential_dofs(&marker).unwrap();
        prop_assert_eq!(vector.len(), 2 * scalar.len());
        prop_assert!(vector.windows(2).all(|w| w[0] < w[1]));
        for node in scalar {
            prop_assert!(vector.contains(&(2 * node)));
            prop_assert!(vector.contains(&(2 * node + 1)));
        }
    }

    #[test]
    fn nedelec_essential_dofs_are_sorted_and_in_range(
        mesh in uniform_quad_mesh(4),
        marker in boundary_marker()
    ) {
        let space = NedelecSpace::new(mesh);
        let dofs = space.essential_dofs(&marker).unwrap();
        prop_assert!(dofs.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(dofs.iter().all(|&dof| dof < space.ndofs()));
    }
}
