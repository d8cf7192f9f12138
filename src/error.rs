//! Errors reported while setting up or applying the AMS preconditioner.
use fenris_sparse::cg::SolveErrorKind;
use fenris_sparse::OperatorError;
use std::error::Error;
use std::fmt;

/// The term of an auxiliary-space bilinear form a coefficient belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTerm {
    Diffusion,
    Mass,
}

impl fmt::Display for FormTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diffusion => write!(f, "diffusion"),
            Self::Mass => write!(f, "mass"),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum AmsError {
    /// The coefficient needed for a form term is only available in a kind
    /// (scalar or vector) that the term does not support.
    UnimplementedCoefficient { term: FormTerm },
    /// No coefficient at all was supplied for a form term.
    MissingCoefficient { term: FormTerm },
    /// Two operators that must be composed have incompatible dimensions.
    OperatorDimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A vector passed to an operator does not have the operator's size.
    VectorSizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The boundary marker refers to an attribute the mesh does not have.
    InvalidBoundaryMarker { attribute: usize },
    /// The diagonal of a non-essential row is zero, so Jacobi smoothing is undefined.
    ZeroSmootherDiagonal { dof: usize },
    AmgSetup { reason: String },
    /// An operator failed while being applied.
    Operator(Box<dyn Error>),
}

impl fmt::Display for AmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnimplementedCoefficient { term } => {
                write!(f, "VectorCoefficient support not implemented for the {} term", term)
            }
            Self::MissingCoefficient { term } => write!(f, "No coefficient given for the {} term", term),
            Self::OperatorDimensionMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Operator dimension mismatch in {}: expected {}, got {}",
                context, expected, actual
            ),
            Self::VectorSizeMismatch {
                context,
                expected,
                actual,
            } => write!(
                f,
                "Vector size mismatch in {}: expected length {}, got {}",
                context, expected, actual
            ),
            Self::InvalidBoundaryMarker { attribute } => {
                write!(f, "Boundary marker refers to nonexistent attribute {}", attribute)
            }
            Self::ZeroSmootherDiagonal { dof } => {
                write!(f, "Zero diagonal entry for non-essential dof {} in Jacobi smoother", dof)
            }
            Self::AmgSetup { reason } => write!(f, "Failed to set up algebraic multigrid: {}", reason),
            Self::Operator(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
        }
    }
}

impl Error for AmsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Operator(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<Box<dyn Error>> for AmsError {
    fn from(err: Box<dyn Error>) -> Self {
        Self::Operator(err)
    }
}

impl From<OperatorError> for AmsError {
    fn from(err: OperatorError) -> Self {
        Self::Operator(Box::new(err))
    }
}

impl From<SolveErrorKind> for AmsError {
    fn from(kind: SolveErrorKind) -> Self {
        match kind {
            SolveErrorKind::OperatorError(err)
            | SolveErrorKind::PreconditionerError(err)
            | SolveErrorKind::StoppingCriterionError(err) => Self::Operator(err),
            other => Self::Operator(other.to_string().into()),
        }
    }
}

/// Checks that a vector has the length an operator expects.
pub(crate) fn check_vector_size(context: &'static str, expected: usize, actual: usize) -> Result<(), AmsError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AmsError::VectorSizeMismatch {
            context,
            expected,
            actual,
        })
    }
}

/// Checks that two operators being composed agree in the given dimension.
pub(crate) fn check_operator_dimension(context: &'static str, expected: usize, actual: usize) -> Result<(), AmsError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AmsError::OperatorDimensionMismatch {
            context,
            expected,
            actual,
        })
    }
}
