//! Smoothed-aggregation algebraic multigrid.
//!
//! One application of [`AlgebraicMultigrid`] is a single V-cycle with damped-Jacobi pre- and
//! post-smoothing and a dense pseudo-inverse on the coarsest level. The cycle is symmetric,
//! so it can be used to precondition CG.
//!
//! Rows without strong connections are left out of the aggregation and only see the smoother.
//! Rows with a zero diagonal are treated as null rows: in addition, every smoothing sweep
//! leaves them untouched, the coarse solve excludes them, and the output of a V-cycle is
//! exactly zero in those entries.
use crate::error::{check_vector_size, AmsError};
use fenris_sparse::{csr_diagonal, LinearOperator, Operator};
use log::LevelFilter;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmgOptions {
    /// Upper bound on the number of levels, including the finest.
    pub max_levels: usize,
    /// Levels with at most this many rows are solved directly.
    pub coarse_size: usize,
    /// Threshold `theta` in the strength test `|a_ij| > theta sqrt(|a_ii a_jj|)`.
    pub strength_threshold: f64,
    /// Number of pre- and post-smoothing sweeps.
    pub smoothing_steps: usize,
    /// Number of interleaved unknowns per node. Only dofs of the same unknown interact
    /// during coarsening.
    pub num_functions: usize,
}

impl Default for AmgOptions {
    fn default() -> Self {
        Self {
            max_levels: 10,
            coarse_size: 40,
            strength_threshold: 0.08,
            smoothing_steps: 1,
            num_functions: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct AmgLevel {
    matrix: CsrMatrix<f64>,
    /// Zero for null rows.
    inverse_diagonal: DVector<f64>,
    smoother_weight: f64,
    /// Prolongation from the next coarser level, absent on the coarsest level.
    prolongation: Option<CsrMatrix<f64>>,
    restriction: Option<CsrMatrix<f64>>,
}

impl AmgLevel {
    fn new(matrix: CsrMatrix<f64>) -> Self {
        let diagonal = csr_diagonal(&matrix);
        let inverse_diagonal = diagonal.map(|d| if d != 0.0 { 1.0 / d } else { 0.0 });
        let rho = jacobi_spectral_radius_bound(&matrix, &inverse_diagonal);
        Self {
            matrix,
            inverse_diagonal,
            smoother_weight: 4.0 / (3.0 * rho),
            prolongation: None,
            restriction: None,
        }
    }

    fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    fn null_rows(&self) -> Vec<usize> {
        (0..self.nrows())
            .filter(|&i| self.inverse_diagonal[i] == 0.0)
            .collect()
    }

    /// `x <- x + w D^-1 (b - A x)`
    fn jacobi_sweep(&self, b: &DVector<f64>, x: &mut DVector<f64>) {
        let mut ax = DVector::zeros(self.nrows());
        spmm_csr_dense(0.0, &mut ax, 1.0, Op::NoOp(&self.matrix), Op::NoOp(&*x));
        let w = self.smoother_weight;
        x.as_mut_slice()
            .par_iter_mut()
            .zip(ax.as_slice().par_iter())
            .zip(b.as_slice().par_iter())
            .zip(self.inverse_diagonal.as_slice().par_iter())
            .for_each(|(((x_i, ax_i), b_i), d_i)| *x_i += w * d_i * (b_i - ax_i));
    }

    fn residual(&self, b: &DVector<f64>, x: &DVector<f64>) -> DVector<f64> {
        let mut r = b.clone();
        spmm_csr_dense(1.0, &mut r, -1.0, Op::NoOp(&self.matrix), Op::NoOp(x));
        r
    }
}

/// Gershgorin bound on the spectral radius of `D^-1 A`, ignoring null rows.
fn jacobi_spectral_radius_bound(matrix: &CsrMatrix<f64>, inverse_diagonal: &DVector<f64>) -> f64 {
    let rho = matrix
        .row_iter()
        .zip(inverse_diagonal.iter())
        .map(|(row, d_inv)| d_inv.abs() * row.values().iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    if rho > 0.0 {
        rho
    } else {
        1.0
    }
}

/// Strong connections of every row. Null rows have none, and are never strongly connected to.
fn strength_graph(matrix: &CsrMatrix<f64>, theta: f64, num_functions: usize) -> Vec<Vec<usize>> {
    let diagonal = csr_diagonal(matrix);
    (0..matrix.nrows())
        .map(|i| {
            if diagonal[i] == 0.0 {
                return Vec::new();
            }
            let row = matrix.row(i);
            row.col_indices()
                .iter()
                .zip(row.values())
                .filter(|&(&j, &a_ij)| {
                    j != i
                        && j % num_functions == i % num_functions
                        && diagonal[j] != 0.0
                        && a_ij.abs() > theta * (diagonal[i] * diagonal[j]).abs().sqrt()
                })
                .map(|(&j, _)| j)
                .collect()
        })
        .collect()
}

/// Greedy aggregation in three passes. Returns the aggregate of every row (`None` for rows
/// without strong connections) and the number of aggregates.
///
/// 1. Rows whose strong neighbourhood is entirely unaggregated seed a new aggregate
///    together with that neighbourhood.
/// 2. Remaining rows join the aggregate of a strongly connected row from the first pass.
/// 3. Whatever is left forms new aggregates with its unaggregated strong neighbours.
fn aggregate(strong: &[Vec<usize>], is_null: &[bool]) -> (Vec<Option<usize>>, usize) {
    let n = strong.len();
    let mut aggregates = vec![None; n];
    let mut count = 0;

    for i in 0..n {
        if is_null[i] || strong[i].is_empty() || aggregates[i].is_some() {
            continue;
        }
        if strong[i].iter().all(|&j| aggregates[j].is_none()) {
            aggregates[i] = Some(count);
            for &j in &strong[i] {
                aggregates[j] = Some(count);
            }
            count += 1;
        }
    }

    let first_pass = aggregates.clone();
    for i in 0..n {
        if is_null[i] || aggregates[i].is_some() {
            continue;
        }
        aggregates[i] = strong[i].iter().find_map(|&j| first_pass[j]);
    }

    for i in 0..n {
        if is_null[i] || strong[i].is_empty() || aggregates[i].is_some() {
            continue;
        }
        aggregates[i] = Some(count);
        for &j in &strong[i] {
            if aggregates[j].is_none() {
                aggregates[j] = Some(count);
            }
        }
        count += 1;
    }

    (aggregates, count)
}

/// `P = (I - w D^-1 A) T`, where `T` is the piecewise-constant tentative prolongator.
fn smoothed_prolongation(level: &AmgLevel, aggregates: &[Option<usize>], num_aggregates: usize) -> CsrMatrix<f64> {
    let n = level.nrows();
    let mut tentative = CooMatrix::new(n, num_aggregates);
    for (i, aggregate) in aggregates.iter().enumerate() {
        if let Some(k) = aggregate {
            tentative.push(i, *k, 1.0);
        }
    }
    let tentative = CsrMatrix::from(&tentative);
    let a_tentative = &level.matrix * &tentative;

    let mut prolongation = CooMatrix::new(n, num_aggregates);
    for (i, j, &v) in tentative.triplet_iter() {
        prolongation.push(i, j, v);
    }
    for (i, j, &v) in a_tentative.triplet_iter() {
        let scaled = level.smoother_weight * level.inverse_diagonal[i] * v;
        if scaled != 0.0 {
            prolongation.push(i, j, -scaled);
        }
    }
    CsrMatrix::from(&prolongation)
}

/// Pseudo-inverse of `matrix` restricted to the rows and columns in `active`, scattered back
/// into a full-size matrix that is zero in every other row and column.
fn restricted_pseudo_inverse(matrix: &CsrMatrix<f64>, active: &[usize]) -> Result<DMatrix<f64>, AmsError> {
    let n = matrix.nrows();
    let mut local_index = vec![None; n];
    for (local, &i) in active.iter().enumerate() {
        local_index[i] = Some(local);
    }
    let mut block = DMatrix::zeros(active.len(), active.len());
    for (i, j, &v) in matrix.triplet_iter() {
        if let (Some(r), Some(c)) = (local_index[i], local_index[j]) {
            block[(r, c)] += v;
        }
    }

    let mut inverse = DMatrix::zeros(n, n);
    let scale = if active.is_empty() { 0.0 } else { block.amax() };
    if scale > 0.0 {
        let block_inverse = block
            .pseudo_inverse(1e-12 * scale)
            .map_err(|reason| AmsError::AmgSetup {
                reason: reason.to_string(),
            })?;
        for (r, &i) in active.iter().enumerate() {
            for (c, &j) in active.iter().enumerate() {
                inverse[(i, j)] = block_inverse[(r, c)];
            }
        }
    }
    Ok(inverse)
}

/// A smoothed-aggregation AMG hierarchy, applied as one V-cycle.
#[derive(Debug, Clone)]
pub struct AlgebraicMultigrid {
    levels: Vec<AmgLevel>,
    coarse_inverse: DMatrix<f64>,
    /// Null rows of the finest level.
    null_rows: Vec<usize>,
    smoothing_steps: usize,
}

impl AlgebraicMultigrid {
    pub fn new(matrix: &CsrMatrix<f64>, options: &AmgOptions) -> Result<Self, AmsError> {
        Self::with_verbosity(matrix, options, LevelFilter::Warn)
    }

    /// As [`AlgebraicMultigrid::new`], with setup messages limited to `verbosity`.
    pub fn with_verbosity(
        matrix: &CsrMatrix<f64>,
        options: &AmgOptions,
        verbosity: LevelFilter,
    ) -> Result<Self, AmsError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(AmsError::AmgSetup {
                reason: format!("matrix must be square, got {}x{}", matrix.nrows(), matrix.ncols()),
            });
        }
        let num_functions = options.num_functions;
        if num_functions == 0 || matrix.nrows() % num_functions != 0 {
            return Err(AmsError::AmgSetup {
                reason: format!(
                    "{} rows cannot be split into {} interleaved functions",
                    matrix.nrows(),
                    num_functions
                ),
            });
        }

        let mut levels = Vec::new();
        let mut current = AmgLevel::new(matrix.clone());
        let null_rows = current.null_rows();
        loop {
            let n = current.nrows();
            if n <= options.coarse_size || levels.len() + 1 >= options.max_levels {
                break;
            }
            let strong = strength_graph(&current.matrix, options.strength_threshold, num_functions);
            let is_null: Vec<bool> = current.inverse_diagonal.iter().map(|&d| d == 0.0).collect();
            let (aggregates, num_aggregates) = aggregate(&strong, &is_null);
            if num_aggregates == 0 || num_aggregates >= n {
                break;
            }

            let prolongation = smoothed_prolongation(&current, &aggregates, num_aggregates);
            let restriction = prolongation.transpose();
            let coarse_matrix = &restriction * &(&current.matrix * &prolongation);
            if verbosity >= LevelFilter::Debug {
                log::debug!("AMG level {}: {} rows, {} aggregates", levels.len(), n, num_aggregates);
            }

            current.prolongation = Some(prolongation);
            current.restriction = Some(restriction);
            levels.push(current);
            current = AmgLevel::new(coarse_matrix);
        }

        let active: Vec<usize> = (0..current.nrows())
            .filter(|&i| current.inverse_diagonal[i] != 0.0)
            .collect();
        let coarse_inverse = restricted_pseudo_inverse(&current.matrix, &active)?;
        levels.push(current);

        Ok(Self {
            levels,
            coarse_inverse,
            null_rows,
            smoothing_steps: options.smoothing_steps,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The number of rows on each level, finest first.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(AmgLevel::nrows).collect()
    }

    /// Total number of stored entries over all levels relative to the finest level.
    pub fn operator_complexity(&self) -> f64 {
        let total: usize = self.levels.iter().map(|level| level.matrix.nnz()).sum();
        total as f64 / self.levels[0].matrix.nnz().max(1) as f64
    }

    fn cycle(&self, level_index: usize, b: &DVector<f64>) -> DVector<f64> {
        let level = &self.levels[level_index];
        match (&level.prolongation, &level.restriction) {
            (Some(prolongation), Some(restriction)) => {
                let mut x = DVector::zeros(level.nrows());
                for _ in 0..self.smoothing_steps {
                    level.jacobi_sweep(b, &mut x);
                }
                let residual = level.residual(b, &x);
                let coarse_rhs = restriction * &residual;
                let coarse_correction = self.cycle(level_index + 1, &coarse_rhs);
                x += prolongation * &coarse_correction;
                for _ in 0..self.smoothing_steps {
                    level.jacobi_sweep(b, &mut x);
                }
                x
            }
            _ => &self.coarse_inverse * b,
        }
    }
}

impl LinearOperator<f64> for AlgebraicMultigrid {
    fn apply(&self, mut y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        let n = self.levels[0].nrows();
        check_vector_size("AMG input", n, x.len())?;
        check_vector_size("AMG output", n, y.len())?;
        y.copy_from(&self.cycle(0, &x.clone_owned()));
        for &i in &self.null_rows {
            y[i] = 0.0;
        }
        Ok(())
    }
}

impl Operator<f64> for AlgebraicMultigrid {
    fn nrows(&self) -> usize {
        self.levels[0].nrows()
    }

    fn ncols(&self) -> usize {
        self.levels[0].nrows()
    }

    /// The V-cycle is symmetric.
    fn apply_transpose(&self, y: DVectorViewMut<f64>, x: DVectorView<f64>) -> Result<(), Box<dyn Error>> {
        self.apply(y, x)
    }
}
