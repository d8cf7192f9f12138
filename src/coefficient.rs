//! Material coefficients of the curl-curl problem.
//!
//! Coefficients are evaluated once per cell, at the cell centroid.
use nalgebra::{Point2, Vector2};

pub trait Coefficient {
    fn evaluate(&self, x: &Point2<f64>) -> f64;
}

pub trait VectorCoefficient {
    fn evaluate(&self, x: &Point2<f64>) -> Vector2<f64>;
}

impl<F> Coefficient for F
where
    F: Fn(&Point2<f64>) -> f64,
{
    fn evaluate(&self, x: &Point2<f64>) -> f64 {
        self(x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantCoefficient(pub f64);

impl Coefficient for ConstantCoefficient {
    fn evaluate(&self, _x: &Point2<f64>) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantVectorCoefficient(pub Vector2<f64>);

impl VectorCoefficient for ConstantVectorCoefficient {
    fn evaluate(&self, _x: &Point2<f64>) -> Vector2<f64> {
        self.0
    }
}

/// Wraps a closure returning a vector, since a blanket closure impl is reserved for
/// scalar coefficients.
#[derive(Debug, Clone, Copy)]
pub struct VectorFunctionCoefficient<F>(pub F);

impl<F> VectorCoefficient for VectorFunctionCoefficient<F>
where
    F: Fn(&Point2<f64>) -> Vector2<f64>,
{
    fn evaluate(&self, x: &Point2<f64>) -> Vector2<f64> {
        (self.0)(x)
    }
}

/// The coefficients of `alpha curl curl + beta I`.
///
/// Either coefficient may be given as a scalar or as a vector (per-component) coefficient.
/// Which kinds are accepted depends on the auxiliary space the coefficient is used in.
#[derive(Clone, Copy, Default)]
pub struct AmsCoefficients<'a> {
    pub alpha: Option<&'a dyn Coefficient>,
    pub beta: Option<&'a dyn Coefficient>,
    pub alpha_vector: Option<&'a dyn VectorCoefficient>,
    pub beta_vector: Option<&'a dyn VectorCoefficient>,
}

impl<'a> AmsCoefficients<'a> {
    /// Scalar `alpha` and `beta`.
    pub fn scalar(alpha: &'a dyn Coefficient, beta: &'a dyn Coefficient) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            ..Self::default()
        }
    }

    pub fn with_alpha(self, alpha: &'a dyn Coefficient) -> Self {
        Self {
            alpha: Some(alpha),
            ..self
        }
    }

    pub fn with_beta(self, beta: &'a dyn Coefficient) -> Self {
        Self {
            beta: Some(beta),
            ..self
        }
    }

    pub fn with_alpha_vector(self, alpha: &'a dyn VectorCoefficient) -> Self {
        Self {
            alpha_vector: Some(alpha),
            ..self
        }
    }

    pub fn with_beta_vector(self, beta: &'a dyn VectorCoefficient) -> Self {
        Self {
            beta_vector: Some(beta),
            ..self
        }
    }
}
