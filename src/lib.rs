//! Matrix-free auxiliary-space Maxwell solver (AMS) preconditioning for lowest-order edge
//! element discretisations of `alpha curl curl u + beta u = f`.
//!
//! [`MatrixFreeAms`] assembles everything needed for a [`UniformQuadMesh`] discretisation:
//! a Jacobi smoother, the discrete gradient and nodal interpolation operators, and one
//! [`AuxiliarySpaceSolver`] for each of the two auxiliary nodal spaces. [`GeneralAms`] is the
//! cycle itself, usable with any set of operators.
pub mod amg;
pub mod ams;
pub mod assembly;
pub mod auxiliary;
pub mod coefficient;
pub mod comm;
pub mod error;
pub mod interpolation;
pub mod matrix_free;
pub mod mesh;
pub mod smoother;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub use ams::{AmsTimings, CycleOptions, CycleStage, GeneralAms};
pub use auxiliary::{AuxiliarySpaceSolver, EssentialZeroing, GSpaceBoundary};
pub use error::AmsError;
pub use matrix_free::{AmsOptions, MatrixFreeAms};
pub use mesh::UniformQuadMesh;

pub extern crate fenris_sparse;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
