//! The multiplicative AMS cycle.
use crate::error::{check_operator_dimension, check_vector_size, AmsError};
use fenris_sparse::{LinearOperator, Operator};
use log::LevelFilter;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

/// A stage of the AMS cycle, reported to a stage observer once the stage has updated the
/// approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    /// The initial smoothing `y = S x`.
    PreSmoothing,
    GSpaceCorrection,
    PiSpaceCorrection,
    /// Smoothing between two corrections, only with extra smoothing enabled.
    ExtraSmoothing,
    /// The final smoothing of the residual.
    PostSmoothing,
}

/// Options of the cycle itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleOptions {
    /// Smooth between the G- and Pi-space corrections as well, giving the cycle "0102010"
    /// instead of "01210".
    pub extra_smoothing: bool,
    pub verbosity: LevelFilter,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            extra_smoothing: false,
            verbosity: LevelFilter::Warn,
        }
    }
}

/// Wall-clock time accumulated over all applications of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmsTimings {
    pub residual: Duration,
    pub smooth: Duration,
    pub g_space: Duration,
    pub pi_space: Duration,
}

impl AmsTimings {
    /// Writes the timing report line for the given process rank.
    pub fn write_report(&self, rank: usize, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "{}", self.report_line(rank))
    }

    fn report_line(&self, rank: usize) -> String {
        format!(
            "{}: AMS timing for residual {}, smooth {}, G {}, Pi {}",
            rank,
            self.residual.as_secs_f64(),
            self.smooth.as_secs_f64(),
            self.g_space.as_secs_f64(),
            self.pi_space.as_secs_f64()
        )
    }
}

impl fmt::Display for AmsTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "residual {:?}, smooth {:?}, G {:?}, Pi {:?}",
            self.residual, self.smooth, self.g_space, self.pi_space
        )
    }
}

type StageObserver = Box<dyn Fn(CycleStage, DVectorView<f64>)>;

#[derive(Debug)]
struct CycleBuffers {
    y: DVector<f64>,
    residual: DVector<f64>,
    temp: DVector<f64>,
    g_rhs: DVector<f64>,
    g_correction: DVector<f64>,
    pi_rhs: DVector<f64>,
    pi_correction: DVector<f64>,
}

#[derive(Default)]
struct Timers {
    residual: Cell<Duration>,
    smooth: Cell<Duration>,
    g_space: Cell<Duration>,
    pi_space: Cell<Duration>,
}

fn timed<R>(timer: &Cell<Duration>, f: impl FnOnce() -> R) -> R {
    let start = Instant::now();
    let result = f();
    timer.set(timer.get() + start.elapsed());
    result
}

/// One multiplicative AMS cycle approximating `A^-1`.
///
/// Applying the cycle to `x` runs, in order: smoothing `y = S x`, a G-space correction,
/// a Pi-space correction, a second G-space correction and a final smoothing of the
/// residual. Every correction recomputes the residual `r = x - A y` from scratch, restricts
/// it to the auxiliary space, solves approximately there and adds the prolongated
/// correction to `y`.
///
/// The collaborating operators are fixed at construction. The cycle is generic over them,
/// so they may be owned, borrowed or shared.
pub struct GeneralAms<A, Pi, G, PiSolver, GSolver, Smoother> {
    system: A,
    pi: Pi,
    g: G,
    pi_solver: PiSolver,
    g_solver: GSolver,
    smoother: Smoother,
    options: CycleOptions,
    buffers: RefCell<CycleBuffers>,
    timers: Timers,
    observer: Option<StageObserver>,
}

impl<A, Pi, G, PiSolver, GSolver, Smoother> GeneralAms<A, Pi, G, PiSolver, GSolver, Smoother>
where
    A: Operator<f64>,
    Pi: Operator<f64>,
    G: Operator<f64>,
    PiSolver: Operator<f64>,
    GSolver: Operator<f64>,
    Smoother: Operator<f64>,
{
    /// Fails if the dimensions of the collaborators are incompatible.
    pub fn new(
        system: A,
        pi: Pi,
        g: G,
        pi_solver: PiSolver,
        g_solver: GSolver,
        smoother: Smoother,
        options: CycleOptions,
    ) -> Result<Self, AmsError> {
        let n = system.nrows();
        check_operator_dimension("system operator (square)", n, system.ncols())?;
        check_operator_dimension("smoother height", n, smoother.nrows())?;
        check_operator_dimension("smoother width", n, smoother.ncols())?;
        check_operator_dimension("G height vs. system", n, g.nrows())?;
        check_operator_dimension("Pi height vs. system", n, pi.nrows())?;
        check_operator_dimension("G-space solver height vs. G width", g.ncols(), g_solver.nrows())?;
        check_operator_dimension("G-space solver width vs. G width", g.ncols(), g_solver.ncols())?;
        check_operator_dimension("Pi-space solver height vs. Pi width", pi.ncols(), pi_solver.nrows())?;
        check_operator_dimension("Pi-space solver width vs. Pi width", pi.ncols(), pi_solver.ncols())?;

        let buffers = CycleBuffers {
            y: DVector::zeros(n),
            residual: DVector::zeros(n),
            temp: DVector::zeros(n),
            g_rhs: DVector::zeros(g.ncols()),
            g_correction: DVector::zeros(g.ncols()),
            pi_rhs: DVector::zeros(pi.ncols()),
            pi_correction: DVector::zeros(pi.ncols()),
        };

        Ok(Self {
            system,
            pi,
            g,
            pi_solver,
            g_solver,
            smoother,
            options,
            buffers: RefCell::new(buffers),
            timers: Timers::default(),
            observer: None,
        })
    }

    /// Calls `observer` with the current approximation after every stage of the cycle.
    pub fn with_stage_observer(self, observer: impl Fn(CycleStage, DVectorView<f64>) + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            ..self
        }
    }

    pub fn options(&self) -> &CycleOptions {
        &self.options
    }

    pub fn system(&self) -> &A {
        &self.system
    }

    pub fn g_solver(&self) -> &GSolver {
        &self.g_solver
    }

    pub fn pi_solver(&self) -> &PiSolver {
        &self.pi_solver
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    pub fn timings(&self) -> AmsTimings {
        AmsTimings {
            residual: self.timers.residual.get(),
            smooth: self.timers.smooth.get(),
            g_space: self.timers.g_space.get(),
            pi_space: self.timers.pi_space.get(),
        }
    }

    pub fn write_timings(&self, rank: usize, out: &mut impl io::Write) -> io::Result<()> {
        self.timings().write_report(rank, out)
    }

    /// Reports the accumulated timings through the logger.
    pub fn report_timings(&self, rank: usize) {
        log::info!("{}", self.timings().report_line(rank));
    }

    fn observe(&self, stage: CycleStage, y: &DVector<f64>) {
        if let Some(observer) = &self.observer {
            observer(stage, y.into());
        }
        if self.options.verbosity >= LevelFilter::Trace {
            log::trace!("AMS stage {:?}: ||y|| = {:e}", stage, y.norm());
        }
    }

    /// `r = x - A y`
    fn form_residual(&self, x: DVectorView<f64>, y: &DVector<f64>, residual: &mut DVector<f64>) -> Result<(), AmsError> {
        timed(&self.timers.residual, || {
            self.system.apply((&mut *residual).into(), y.into())?;
            residual.zip_apply(&x, |r_i, x_i| *r_i = x_i - *r_i);
            Ok(())
        })
    }

    /// `y += S (x - A y)`
    fn smooth_residual(&self, x: DVectorView<f64>, buffers: &mut CycleBuffers) -> Result<(), AmsError> {
        let CycleBuffers { y, residual, temp, .. } = buffers;
        self.form_residual(x, y, residual)?;
        timed(&self.timers.smooth, || {
            self.smoother.apply((&mut *temp).into(), (&*residual).into())?;
            *y += &*temp;
            Ok(())
        })
    }

    /// `y += C M C^T (x - A y)` for the inter-space operator `C` and auxiliary solver `M`.
    #[allow(clippy::too_many_arguments)]
    fn correct<C: Operator<f64>, S: Operator<f64>>(
        &self,
        x: DVectorView<f64>,
        conn: &C,
        solver: &S,
        timer: &Cell<Duration>,
        rhs: &mut DVector<f64>,
        correction: &mut DVector<f64>,
        y: &mut DVector<f64>,
        residual: &mut DVector<f64>,
        temp: &mut DVector<f64>,
    ) -> Result<(), AmsError> {
        self.form_residual(x, y, residual)?;
        conn.apply_transpose((&mut *rhs).into(), (&*residual).into())?;
        timed(timer, || solver.apply((&mut *correction).into(), (&*rhs).into()))?;
        conn.apply((&mut *temp).into(), (&*correction).into())?;
        *y += &*temp;
        Ok(())
    }

    fn g_correction(&self, x: DVectorView<f64>, buffers: &mut CycleBuffers) -> Result<(), AmsError> {
        let CycleBuffers {
            y,
            residual,
            temp,
            g_rhs,
            g_correction,
            ..
        } = buffers;
        self.correct(
            x,
            &self.g,
            &self.g_solver,
            &self.timers.g_space,
            g_rhs,
            g_correction,
            y,
            residual,
            temp,
        )
    }

    fn pi_correction(&self, x: DVectorView<f64>, buffers: &mut CycleBuffers) -> Result<(), AmsError> {
        let CycleBuffers {
            y,
            residual,
            temp,
            pi_rhs,
            pi_correction,
            ..
        } = buffers;
        self.correct(
            x,
            &self.pi,
            &self.pi_solver,
            &self.timers.pi_space,
            pi_rhs,
            pi_correction,
            y,
            residual,
            temp,
        )
    }

    fn extra_smoothing(&self, x: DVectorView<f64>, buffers: &mut CycleBuffers) -> Result<(), AmsError> {
        if self.options.extra_smoothing {
            self.smooth_residual(x, buffers)?;
            self.observe(CycleStage::ExtraSmoothing, &buffers.y);
        }
        Ok(())
    }

    fn cycle(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), AmsError> {
        let n = self.system.nrows();
        check_vector_size("AMS input", n, x.len())?;
        check_vector_size("AMS output", n, y.len())?;

        let mut buffers = self.buffers.borrow_mut();
        let buffers = &mut *buffers;

        timed(&self.timers.smooth, || {
            self.smoother.apply((&mut buffers.y).into(), x)
        })?;
        self.observe(CycleStage::PreSmoothing, &buffers.y);

        self.g_correction(x, buffers)?;
        self.observe(CycleStage::GSpaceCorrection, &buffers.y);
        self.extra_smoothing(x, buffers)?;

        self.pi_correction(x, buffers)?;
        self.observe(CycleStage::PiSpaceCorrection, &buffers.y);
        self.extra_smoothing(x, buffers)?;

        self.g_correction(x, buffers)?;
        self.observe(CycleStage::GSpaceCorrection, &buffers.y);

        self.smooth_residual(x, buffers)?;
        self.observe(CycleStage::PostSmoothing, &buffers.y);

        y.copy_from(&buffers.y);
        Ok(())
    }
}

impl<A, Pi, G, PiSolver, GSolver, Smoother> LinearOperator<f64> for GeneralAms<A, Pi, G, PiSolver, GSolver, Smoother>
where
    A: Operator<f64>,
    Pi: Operator<f64>,
    G: Operator<f64>,
    PiSolver: Operator<f64>,
    GSolver: Operator<f64>,
    Smoother: Operator<f64>,
{
    fn apply(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        Ok(self.cycle(y, x)?)
    }
}

impl<A, Pi, G, PiSolver, GSolver, Smoother> Operator<f64> for GeneralAms<A, Pi, G, PiSolver, GSolver, Smoother>
where
    A: Operator<f64>,
    Pi: Operator<f64>,
    G: Operator<f64>,
    PiSolver: Operator<f64>,
    GSolver: Operator<f64>,
    Smoother: Operator<f64>,
{
    fn nrows(&self) -> usize {
        self.system.nrows()
    }

    fn ncols(&self) -> usize {
        self.system.ncols()
    }
}
