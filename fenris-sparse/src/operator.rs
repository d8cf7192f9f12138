//! Linear operators acting on dynamically sized vectors.
//!
//! [`LinearOperator`] is the minimal abstraction consumed by iterative solvers: something that
//! can compute `y = A x`. [`Operator`] refines it with fixed dimensions and (optionally) the
//! action of the transpose, which is what inter-space maps and preconditioners need.
use core::fmt;
use nalgebra::base::constraint::AreMultipliable;
use nalgebra::constraint::{DimEq, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra::{ClosedAdd, ClosedMul, DMatrix, DVector, DVectorView, DVectorViewMut, Dim, Dyn, Matrix, Scalar, U1};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::cell::RefCell;
use std::error::Error;
use std::sync::Arc;

pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

/// A linear operator with fixed dimensions.
///
/// The dimensions of an operator never change after construction. Implementors that cannot
/// apply their transpose keep the default [`Operator::apply_transpose`], which fails with
/// [`OperatorError::TransposeUnsupported`].
pub trait Operator<T: Scalar>: LinearOperator<T> {
    /// The length of the output of [`LinearOperator::apply`].
    fn nrows(&self) -> usize;

    /// The length of the input of [`LinearOperator::apply`].
    fn ncols(&self) -> usize;

    /// Computes `y = A^T x`.
    fn apply_transpose(&self, _y: DVectorViewMut<T>, _x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        Err(Box::new(OperatorError::TransposeUnsupported))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperatorError {
    /// The input or output vector does not match the operator.
    DimensionMismatch {
        shape: (usize, usize),
        input: usize,
        output: usize,
    },
    TransposeUnsupported,
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { shape, input, output } => write!(
                f,
                "Operator of shape {}x{} applied with input of length {} and output of length {}",
                shape.0, shape.1, input, output
            ),
            Self::TransposeUnsupported => write!(f, "Operator does not support transposed application"),
        }
    }
}

impl Error for OperatorError {}

/// Checks that `y = A x` is well-defined for an operator of the given shape.
pub fn check_apply_dims(shape: (usize, usize), output: usize, input: usize) -> Result<(), OperatorError> {
    if shape.0 == output && shape.1 == input {
        Ok(())
    } else {
        Err(OperatorError::DimensionMismatch { shape, input, output })
    }
}

/// Checks that `y = A^T x` is well-defined for an operator of the given shape.
pub fn check_apply_transpose_dims(shape: (usize, usize), output: usize, input: usize) -> Result<(), OperatorError> {
    check_apply_dims((shape.1, shape.0), output, input)
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<'a, T, A> Operator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + Operator<T>,
{
    fn nrows(&self) -> usize {
        <A as Operator<T>>::nrows(self)
    }

    fn ncols(&self) -> usize {
        <A as Operator<T>>::ncols(self)
    }

    fn apply_transpose(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as Operator<T>>::apply_transpose(self, y, x)
    }
}

impl<T, A> LinearOperator<T> for Arc<A>
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.as_ref().apply(y, x)
    }
}

impl<T, A> Operator<T> for Arc<A>
where
    T: Scalar,
    A: ?Sized + Operator<T>,
{
    fn nrows(&self) -> usize {
        self.as_ref().nrows()
    }

    fn ncols(&self) -> usize {
        self.as_ref().ncols()
    }

    fn apply_transpose(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.as_ref().apply_transpose(y, x)
    }
}

impl<T, A> LinearOperator<T> for Box<A>
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.as_ref().apply(y, x)
    }
}

impl<T, A> Operator<T> for Box<A>
where
    T: Scalar,
    A: ?Sized + Operator<T>,
{
    fn nrows(&self) -> usize {
        self.as_ref().nrows()
    }

    fn ncols(&self) -> usize {
        self.as_ref().ncols()
    }

    fn apply_transpose(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        self.as_ref().apply_transpose(y, x)
    }
}

impl<T, R, C, S> LinearOperator<T> for Matrix<T, R, C, S>
where
    T: Scalar + One + Zero + ClosedMul + ClosedAdd,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
    ShapeConstraint: DimEq<Dyn, R> + DimEq<C, Dyn> + AreMultipliable<R, C, Dyn, U1>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_dims(self.shape(), y.len(), x.len())?;
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> Operator<T> for DMatrix<T>
where
    T: Scalar + One + Zero + ClosedMul + ClosedAdd,
{
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn apply_transpose(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_transpose_dims(self.shape(), y.len(), x.len())?;
        y.gemv_tr(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

impl<T> Operator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn apply_transpose(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_transpose_dims((self.nrows(), self.ncols()), y.len(), x.len())?;
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::Transpose(self), Op::NoOp(&x));
        Ok(())
    }
}

/// The identity of unspecified size. Used as the default (absent) preconditioner.
pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RapBuffers<T: Scalar> {
    px: DVector<T>,
    apx: DVector<T>,
}

/// The matrix-free Galerkin product `P^T A P`.
///
/// Neither `P` nor `A` is ever multiplied out; every application performs one product
/// with each of `P`, `A` and `P^T`.
#[derive(Debug)]
pub struct RapOperator<P, A, T: Scalar> {
    p: P,
    a: A,
    buffers: RefCell<RapBuffers<T>>,
}

impl<P, A, T> RapOperator<P, A, T>
where
    T: Scalar + Zero,
    P: Operator<T>,
    A: Operator<T>,
{
    /// Requires `A` to be square with `P.nrows() == A.ncols()`.
    pub fn new(p: P, a: A) -> Result<Self, OperatorError> {
        if p.nrows() != a.ncols() || a.nrows() != a.ncols() {
            return Err(OperatorError::DimensionMismatch {
                shape: (a.nrows(), a.ncols()),
                input: p.nrows(),
                output: p.nrows(),
            });
        }
        let n = p.nrows();
        Ok(Self {
            p,
            a,
            buffers: RefCell::new(RapBuffers {
                px: DVector::zeros(n),
                apx: DVector::zeros(n),
            }),
        })
    }

    pub fn outer(&self) -> &P {
        &self.p
    }

    pub fn inner(&self) -> &A {
        &self.a
    }
}

impl<P, A, T> LinearOperator<T> for RapOperator<P, A, T>
where
    T: Scalar + Zero,
    P: Operator<T>,
    A: Operator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_dims((self.p.ncols(), self.p.ncols()), y.len(), x.len())?;
        let mut buffers = self.buffers.borrow_mut();
        let RapBuffers { px, apx } = &mut *buffers;
        self.p.apply(px.into(), x)?;
        self.a.apply(apx.into(), (&*px).into())?;
        self.p.apply_transpose(y, (&*apx).into())
    }
}

impl<P, A, T> Operator<T> for RapOperator<P, A, T>
where
    T: Scalar + Zero,
    P: Operator<T>,
    A: Operator<T>,
{
    fn nrows(&self) -> usize {
        self.p.ncols()
    }

    fn ncols(&self) -> usize {
        self.p.ncols()
    }

    /// `P^T A^T P`. Only requires `A` to support transposition.
    fn apply_transpose(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        check_apply_dims((self.p.ncols(), self.p.ncols()), y.len(), x.len())?;
        let mut buffers = self.buffers.borrow_mut();
        let RapBuffers { px, apx } = &mut *buffers;
        self.p.apply(px.into(), x)?;
        self.a.apply_transpose(apx.into(), (&*px).into())?;
        self.p.apply_transpose(y, (&*apx).into())
    }
}
