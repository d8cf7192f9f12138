//! Approximate solvers for the auxiliary-space systems of AMS.
//!
//! An [`AuxiliarySpaceSolver`] owns the assembled matrix of one auxiliary nodal space (the
//! scalar gradient space "G" or the vector interpolation space "Pi") together with an AMG
//! hierarchy for it. Each application either runs a single V-cycle, or a few CG iterations on
//! the matrix-free Galerkin operator `C^T A C` of the system operator `A` and the inter-space
//! operator `C`, preconditioned by the V-cycle.
use crate::amg::{AlgebraicMultigrid, AmgOptions};
use crate::assembly::{assemble_eliminated, require_scalar, DiffusionForm, VectorDiffusionMassForm};
use crate::coefficient::AmsCoefficients;
use crate::comm::Communicator;
use crate::error::{check_operator_dimension, check_vector_size, AmsError, FormTerm};
use crate::mesh::UniformQuadMesh;
use crate::space::{FiniteElementSpace, H1Space};
use fenris_sparse::cg::{CgWorkspace, ConjugateGradient, RelativeResidualCriterion, SolveErrorKind};
use fenris_sparse::operator::RapOperator;
use fenris_sparse::{zero_entries, DiagonalPolicy, LinearOperator, Operator};
use log::LevelFilter;
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, OnceCell, RefCell};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Inner iteration counts above this value request an accurate solve rather than a fixed
/// number of iterations.
pub const ACCURATE_SOLVE_THRESHOLD: usize = 99;
const ACCURATE_SOLVE_MAX_ITERATIONS: usize = 100;
const ACCURATE_SOLVE_TOLERANCE: f64 = 1e-14;

/// Which auxiliary space a solver acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliarySpace {
    /// Scalar nodal space, coupled to the edge space by the discrete gradient.
    Gradient,
    /// Vector nodal space, coupled to the edge space by nodal interpolation.
    Interpolation,
}

impl fmt::Display for AuxiliarySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gradient => write!(f, "G"),
            Self::Interpolation => write!(f, "Pi"),
        }
    }
}

/// How essential dofs of the G space are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GSpaceBoundary {
    /// Eliminate with a unit diagonal and zero the essential entries of every V-cycle output.
    #[default]
    UnitDiagonalPostZero,
    /// Eliminate rows and columns entirely. AMG leaves the resulting null rows at zero.
    ZeroDiagonal,
}

impl GSpaceBoundary {
    pub fn diagonal_policy(&self) -> DiagonalPolicy {
        match self {
            Self::UnitDiagonalPostZero => DiagonalPolicy::One,
            Self::ZeroDiagonal => DiagonalPolicy::Zero,
        }
    }
}

/// How an auxiliary system is solved on every application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InnerSolve {
    /// One AMG V-cycle.
    VCycle,
    /// Preconditioned CG on the Galerkin operator.
    Cg {
        max_iterations: usize,
        relative_tolerance: f64,
    },
}

impl InnerSolve {
    /// Zero iterations means a plain V-cycle. Up to [`ACCURATE_SOLVE_THRESHOLD`] iterations
    /// are run exactly (zero tolerance); larger counts request an accurate solve of at most
    /// 100 iterations to a relative tolerance of `1e-14`.
    pub fn from_iterations(cg_iterations: usize) -> Self {
        match cg_iterations {
            0 => Self::VCycle,
            n if n > ACCURATE_SOLVE_THRESHOLD => Self::Cg {
                max_iterations: ACCURATE_SOLVE_MAX_ITERATIONS,
                relative_tolerance: ACCURATE_SOLVE_TOLERANCE,
            },
            n => Self::Cg {
                max_iterations: n,
                relative_tolerance: 0.0,
            },
        }
    }
}

/// Settings shared by both auxiliary-space variants.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliarySolverSettings {
    pub cg_iterations: usize,
    pub amg: AmgOptions,
    pub g_space_boundary: GSpaceBoundary,
    pub verbosity: LevelFilter,
    pub cg_verbose: bool,
}

impl Default for AuxiliarySolverSettings {
    fn default() -> Self {
        Self {
            cg_iterations: 0,
            amg: AmgOptions::default(),
            g_space_boundary: GSpaceBoundary::default(),
            verbosity: LevelFilter::Warn,
            cg_verbose: false,
        }
    }
}

/// Zeroes a fixed set of output entries after every application of the wrapped operator.
#[derive(Debug, Clone)]
pub struct EssentialZeroing<P> {
    operator: P,
    dofs: Vec<usize>,
}

impl<P: Operator<f64>> EssentialZeroing<P> {
    /// # Panics
    ///
    /// Panics if a dof is out of bounds for the output of the operator.
    pub fn new(operator: P, dofs: Vec<usize>) -> Self {
        let n = operator.nrows();
        assert!(dofs.iter().all(|&dof| dof < n), "Essential dof out of bounds");
        Self { operator, dofs }
    }

    pub fn operator(&self) -> &P {
        &self.operator
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }
}

impl<P: Operator<f64>> LinearOperator<f64> for EssentialZeroing<P> {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let n = y.len();
        self.operator.apply(y.rows_mut(0, n), x)?;
        zero_entries(y, &self.dofs);
        Ok(())
    }
}

impl<P: Operator<f64>> Operator<f64> for EssentialZeroing<P> {
    fn nrows(&self) -> usize {
        self.operator.nrows()
    }

    fn ncols(&self) -> usize {
        self.operator.ncols()
    }
}

type GalerkinOperator<'a> = RapOperator<Arc<dyn Operator<f64> + 'a>, &'a dyn Operator<f64>, f64>;

/// Approximate inverse of one auxiliary-space system.
pub struct AuxiliarySpaceSolver<'a> {
    space: AuxiliarySpace,
    matrix: CsrMatrix<f64>,
    preconditioner: Box<dyn Operator<f64>>,
    essential_dofs: Vec<usize>,
    inner_solve: InnerSolve,
    conn: Arc<dyn Operator<f64> + 'a>,
    system: &'a dyn Operator<f64>,
    galerkin: OnceCell<GalerkinOperator<'a>>,
    cg_workspace: RefCell<CgWorkspace<f64>>,
    inner_iterations: Cell<usize>,
    is_root: bool,
    verbosity: LevelFilter,
    cg_verbose: bool,
}

impl<'a> fmt::Debug for AuxiliarySpaceSolver<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliarySpaceSolver")
            .field("space", &self.space)
            .field("dim", &self.matrix.nrows())
            .field("essential_dofs", &self.essential_dofs.len())
            .field("inner_solve", &self.inner_solve)
            .field("inner_iterations", &self.inner_iterations.get())
            .finish()
    }
}

impl<'a> AuxiliarySpaceSolver<'a> {
    /// Builds a solver from an already assembled (and eliminated) auxiliary matrix.
    ///
    /// `conn` maps the auxiliary space into the domain of `system`. When `zero_essential` is set,
    /// the essential entries of every V-cycle output are zeroed.
    #[allow(clippy::too_many_arguments)]
    pub fn with_matrix(
        space: AuxiliarySpace,
        matrix: CsrMatrix<f64>,
        essential_dofs: Vec<usize>,
        zero_essential: bool,
        conn: Arc<dyn Operator<f64> + 'a>,
        system: &'a dyn Operator<f64>,
        settings: &AuxiliarySolverSettings,
        amg_options: &AmgOptions,
        comm: &dyn Communicator,
    ) -> Result<Self, AmsError> {
        check_operator_dimension("system operator (square)", system.nrows(), system.ncols())?;
        check_operator_dimension("inter-space operator height vs. system width", system.ncols(), conn.nrows())?;
        check_operator_dimension(
            "inter-space operator width vs. auxiliary matrix",
            matrix.nrows(),
            conn.ncols(),
        )?;

        let amg = AlgebraicMultigrid::with_verbosity(&matrix, amg_options, settings.verbosity)?;
        if settings.verbosity >= LevelFilter::Debug {
            log::debug!(
                "{}-space AMG: {} levels {:?}, operator complexity {:.3}",
                space,
                amg.num_levels(),
                amg.level_sizes(),
                amg.operator_complexity()
            );
        }
        let preconditioner: Box<dyn Operator<f64>> = if zero_essential {
            Box::new(EssentialZeroing::new(amg, essential_dofs.clone()))
        } else {
            Box::new(amg)
        };

        Ok(Self {
            space,
            matrix,
            preconditioner,
            essential_dofs,
            inner_solve: InnerSolve::from_iterations(settings.cg_iterations),
            conn,
            system,
            galerkin: OnceCell::new(),
            cg_workspace: RefCell::new(CgWorkspace::default()),
            inner_iterations: Cell::new(0),
            is_root: comm.is_root(),
            verbosity: settings.verbosity,
            cg_verbose: settings.cg_verbose,
        })
    }

    /// The G-space solver: scalar diffusion with coefficient `beta` on the low-order refined mesh.
    ///
    /// Only a scalar `beta` is supported.
    pub fn g_space(
        lor_mesh: &UniformQuadMesh,
        coefficients: &AmsCoefficients,
        essential_boundary: &[bool],
        system: &'a dyn Operator<f64>,
        gradient: Arc<dyn Operator<f64> + 'a>,
        settings: &AuxiliarySolverSettings,
        comm: &dyn Communicator,
    ) -> Result<Self, AmsError> {
        let space = H1Space::scalar(*lor_mesh);
        let beta = require_scalar(FormTerm::Diffusion, coefficients.beta, coefficients.beta_vector)?;
        let form = DiffusionForm::new(space, beta);
        let essential_dofs = space.essential_dofs(essential_boundary)?;
        let boundary = settings.g_space_boundary;
        let matrix = assemble_eliminated(&form, &essential_dofs, boundary.diagonal_policy());
        let amg_options = AmgOptions {
            num_functions: 1,
            ..settings.amg.clone()
        };
        Self::with_matrix(
            AuxiliarySpace::Gradient,
            matrix,
            essential_dofs,
            boundary == GSpaceBoundary::UnitDiagonalPostZero,
            gradient,
            system,
            settings,
            &amg_options,
            comm,
        )
    }

    /// The Pi-space solver: vector diffusion `alpha` plus mass `beta` on the low-order
    /// refined mesh, with AMG coarsening each component separately.
    pub fn pi_space(
        lor_mesh: &UniformQuadMesh,
        coefficients: &AmsCoefficients,
        essential_boundary: &[bool],
        system: &'a dyn Operator<f64>,
        interpolation: Arc<dyn Operator<f64> + 'a>,
        settings: &AuxiliarySolverSettings,
        comm: &dyn Communicator,
    ) -> Result<Self, AmsError> {
        let space = H1Space::vector(*lor_mesh);
        let form = VectorDiffusionMassForm::from_coefficients(space, coefficients)?;
        let essential_dofs = space.essential_dofs(essential_boundary)?;
        let matrix = assemble_eliminated(&form, &essential_dofs, DiagonalPolicy::Keep);
        let amg_options = AmgOptions {
            num_functions: space.vdim(),
            ..settings.amg.clone()
        };
        Self::with_matrix(
            AuxiliarySpace::Interpolation,
            matrix,
            essential_dofs,
            false,
            interpolation,
            system,
            settings,
            &amg_options,
            comm,
        )
    }

    pub fn space(&self) -> AuxiliarySpace {
        self.space
    }

    /// The assembled auxiliary matrix the V-cycle is built from.
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    pub fn essential_dofs(&self) -> &[usize] {
        &self.essential_dofs
    }

    pub fn inner_solve(&self) -> InnerSolve {
        self.inner_solve
    }

    /// Total number of inner CG iterations over all applications. Only tallied on the root
    /// process; zero elsewhere.
    pub fn inner_iterations(&self) -> usize {
        self.inner_iterations.get()
    }

    fn galerkin_operator(&self) -> Result<&GalerkinOperator<'a>, AmsError> {
        if let Some(op) = self.galerkin.get() {
            return Ok(op);
        }
        let op = RapOperator::new(Arc::clone(&self.conn), self.system)?;
        Ok(self.galerkin.get_or_init(|| op))
    }

    fn solve(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), AmsError> {
        let n = self.matrix.nrows();
        check_vector_size("auxiliary solver input", n, x.len())?;
        check_vector_size("auxiliary solver output", n, y.len())?;
        y.fill(0.0);

        let (max_iterations, relative_tolerance) = match self.inner_solve {
            InnerSolve::VCycle => return self.preconditioner.apply(y, x).map_err(AmsError::Operator),
            InnerSolve::Cg {
                max_iterations,
                relative_tolerance,
            } => (max_iterations, relative_tolerance),
        };

        let galerkin = self.galerkin_operator()?;
        let mut workspace = self.cg_workspace.borrow_mut();
        let result = ConjugateGradient::with_workspace(&mut *workspace)
            .with_operator(galerkin)
            .with_preconditioner(&self.preconditioner)
            .with_stopping_criterion(RelativeResidualCriterion::new(relative_tolerance))
            .with_max_iter(max_iterations)
            .with_verbose(self.cg_verbose)
            .solve_with_guess(x, y);

        let iterations = match result {
            Ok(output) => output.num_iterations,
            Err(err) => match err.kind {
                SolveErrorKind::MaxIterationsReached { .. } => err.output.num_iterations,
                kind if kind.is_breakdown() => {
                    if self.verbosity >= LevelFilter::Warn {
                        log::warn!(
                            "{}-space inner CG stopped after {} iterations: {}",
                            self.space,
                            err.output.num_iterations,
                            kind
                        );
                    }
                    err.output.num_iterations
                }
                kind => return Err(AmsError::from(kind)),
            },
        };

        if self.is_root {
            self.inner_iterations.set(self.inner_iterations.get() + iterations);
        }
        if self.verbosity >= LevelFilter::Trace {
            log::trace!("{}-space inner CG: {} iterations", self.space, iterations);
        }
        Ok(())
    }
}

impl<'a> LinearOperator<f64> for AuxiliarySpaceSolver<'a> {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        Ok(self.solve(y, x)?)
    }
}

impl<'a> Operator<f64> for AuxiliarySpaceSolver<'a> {
    fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    fn ncols(&self) -> usize {
        self.matrix.nrows()
    }
}
