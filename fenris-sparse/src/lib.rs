//! Sparse linear algebra and operator abstractions used by `fenris-ams`.
pub mod cg;
pub mod operator;
pub mod sparse;

pub use operator::{LinearOperator, Operator, OperatorError};
pub use sparse::{csr_diagonal, eliminate_essential_dofs_csr, zero_entries, DiagonalPolicy};

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
