//! Construction of the complete AMS preconditioner for a curl-curl system.
use crate::ams::{AmsTimings, CycleOptions, GeneralAms};
use crate::amg::AmgOptions;
use crate::assembly::AssembleDiagonal;
use crate::auxiliary::{AuxiliarySolverSettings, AuxiliarySpaceSolver, GSpaceBoundary};
use crate::coefficient::AmsCoefficients;
use crate::comm::Communicator;
use crate::error::{check_operator_dimension, AmsError};
use crate::interpolation::{GradientInterpolator, IdentityInterpolator};
use crate::smoother::JacobiSmoother;
use crate::space::{FiniteElementSpace, H1Space, NedelecSpace};
use fenris_sparse::{LinearOperator, Operator};
use log::LevelFilter;
use nalgebra::{DVectorView, DVectorViewMut};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmsOptions {
    /// Inner CG iterations of the G-space solver. Zero applies the V-cycle directly, values
    /// above 99 request an accurate solve.
    pub inner_g_iterations: usize,
    /// Inner CG iterations of the Pi-space solver.
    pub inner_pi_iterations: usize,
    /// Damping of the Jacobi smoother.
    pub smoother_scale: f64,
    pub extra_smoothing: bool,
    pub g_space_boundary: GSpaceBoundary,
    pub amg: AmgOptions,
    /// Maximum level of messages emitted by the preconditioner.
    pub verbosity: LevelFilter,
    /// Log every inner CG iteration (at debug level).
    pub cg_verbose: bool,
}

impl Default for AmsOptions {
    fn default() -> Self {
        Self {
            inner_g_iterations: 1,
            inner_pi_iterations: 0,
            smoother_scale: 0.25,
            extra_smoothing: false,
            g_space_boundary: GSpaceBoundary::default(),
            amg: AmgOptions::default(),
            verbosity: LevelFilter::Warn,
            cg_verbose: false,
        }
    }
}

impl AmsOptions {
    fn auxiliary_settings(&self, cg_iterations: usize) -> AuxiliarySolverSettings {
        AuxiliarySolverSettings {
            cg_iterations,
            amg: self.amg.clone(),
            g_space_boundary: self.g_space_boundary,
            verbosity: self.verbosity,
            cg_verbose: self.cg_verbose,
        }
    }

    fn cycle_options(&self) -> CycleOptions {
        CycleOptions {
            extra_smoothing: self.extra_smoothing,
            verbosity: self.verbosity,
        }
    }
}

/// The AMS cycle as assembled by [`MatrixFreeAms`].
pub type MatrixFreeCycle<'a> = GeneralAms<
    &'a dyn Operator<f64>,
    Arc<IdentityInterpolator>,
    Arc<GradientInterpolator>,
    AuxiliarySpaceSolver<'a>,
    AuxiliarySpaceSolver<'a>,
    JacobiSmoother,
>;

/// The AMS preconditioner for a lowest-order edge discretisation of
/// `alpha curl curl u + beta u`.
///
/// The inter-space operators are applied matrix-free on the nodal spaces of the edge space's
/// mesh, while the auxiliary systems are assembled on its low-order refined mesh.
pub struct MatrixFreeAms<'a> {
    cycle: MatrixFreeCycle<'a>,
    h1_space: H1Space,
    h1_vector_space: H1Space,
}

impl<'a> MatrixFreeAms<'a> {
    /// Builds the preconditioner for `operator`, the system operator of `form` on `space`
    /// with the essential boundary attributes selected by `essential_boundary` eliminated.
    ///
    /// The Jacobi smoother takes its diagonal from `form`. The G-space solver uses the scalar
    /// `beta` coefficient, the Pi-space solver `alpha` for diffusion and `beta` (scalar or vector)
    /// for mass. Configuration errors are reported here, never during application.
    pub fn new(
        form: &impl AssembleDiagonal,
        operator: &'a dyn Operator<f64>,
        space: &NedelecSpace,
        coefficients: &AmsCoefficients,
        essential_boundary: &[bool],
        options: &AmsOptions,
        comm: &dyn Communicator,
    ) -> Result<Self, AmsError> {
        check_operator_dimension("system operator vs. edge space", space.ndofs(), operator.nrows())?;
        check_operator_dimension("system operator (square)", operator.nrows(), operator.ncols())?;

        let essential_dofs = space.essential_dofs(essential_boundary)?;
        let smoother = JacobiSmoother::new(form, &essential_dofs, options.smoother_scale)?;

        let mesh = *space.mesh();
        let h1_space = H1Space::scalar(mesh);
        let h1_vector_space = H1Space::vector(mesh);
        let g = Arc::new(GradientInterpolator::new(&h1_space, space));
        let pi = Arc::new(IdentityInterpolator::new(&h1_vector_space, space));

        let lor_mesh = mesh.low_order_refined(space.order());
        let g_solver = AuxiliarySpaceSolver::g_space(
            &lor_mesh,
            coefficients,
            essential_boundary,
            operator,
            g.clone(),
            &options.auxiliary_settings(options.inner_g_iterations),
            comm,
        )?;
        let pi_solver = AuxiliarySpaceSolver::pi_space(
            &lor_mesh,
            coefficients,
            essential_boundary,
            operator,
            pi.clone(),
            &options.auxiliary_settings(options.inner_pi_iterations),
            comm,
        )?;

        if options.verbosity >= LevelFilter::Info {
            log::info!(
                "AMS set up for {} edge dofs: G space {} dofs, Pi space {} dofs",
                space.ndofs(),
                g_solver.nrows(),
                pi_solver.nrows()
            );
        }

        let cycle = GeneralAms::new(operator, pi, g, pi_solver, g_solver, smoother, options.cycle_options())?;
        Ok(Self {
            cycle,
            h1_space,
            h1_vector_space,
        })
    }

    pub fn cycle(&self) -> &MatrixFreeCycle<'a> {
        &self.cycle
    }

    /// The scalar nodal space of the gradient correction.
    pub fn h1_space(&self) -> &H1Space {
        &self.h1_space
    }

    /// The vector nodal space of the interpolation correction.
    pub fn h1_vector_space(&self) -> &H1Space {
        &self.h1_vector_space
    }

    pub fn g_space_solver(&self) -> &AuxiliarySpaceSolver<'a> {
        self.cycle.g_solver()
    }

    pub fn pi_space_solver(&self) -> &AuxiliarySpaceSolver<'a> {
        self.cycle.pi_solver()
    }

    /// Total inner CG iterations of the G-space solver.
    pub fn g_space_iterations(&self) -> usize {
        self.g_space_solver().inner_iterations()
    }

    /// Total inner CG iterations of the Pi-space solver.
    pub fn pi_space_iterations(&self) -> usize {
        self.pi_space_solver().inner_iterations()
    }

    pub fn timings(&self) -> AmsTimings {
        self.cycle.timings()
    }

    pub fn write_timings(&self, rank: usize, out: &mut impl io::Write) -> io::Result<()> {
        self.cycle.write_timings(rank, out)
    }

    pub fn report_timings(&self, rank: usize) {
        self.cycle.report_timings(rank)
    }
}

impl<'a> LinearOperator<f64> for MatrixFreeAms<'a> {
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        self.cycle.apply(y, x)
    }
}

impl<'a> Operator<f64> for MatrixFreeAms<'a> {
    fn nrows(&self) -> usize {
        self.cycle.nrows()
    }

    fn ncols(&self) -> usize {
        self.cycle.ncols()
    }
}
