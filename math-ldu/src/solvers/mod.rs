//! Iterative solvers for LDU systems
//!
//! All solvers share the same state machine:
//!
//! 1. compute the initial residual `r = b - A psi` and the normalisation
//!    factor, and record the normalised initial residual
//! 2. unless already converged (and `minIter` is zero), iterate until the
//!    convergence test passes, `maxIter` is reached, or a pivot is singular
//! 3. return a [`SolverPerformance`] describing the run
//!
//! Residuals are normalised by
//! `normFactor = sum(|A psi - A xRef| + |b - A xRef|) + 1e-20`, where `xRef`
//! is the average of `psi`. This makes the residual independent of the
//! scaling of the system and of a uniform offset of the solution.
//!
//! # Available Solvers
//!
//! - [`PcgSolver`] (`PCG`): preconditioned conjugate gradient, symmetric matrices
//! - [`PbicgSolver`] (`PBiCG`): preconditioned bi-conjugate gradient, asymmetric matrices
//! - [`PbicgStabSolver`] (`PBiCGStab`): stabilised bi-conjugate gradient, any matrix
//! - [`SmoothSolver`] (`smoothSolver`): repeated smoother sweeps with convergence control
//! - [`DiagonalSolver`] (`diagonal`): `psi = b / diag` for diagonal matrices

mod diagonal;
mod pbicg;
mod pbicgstab;
mod pcg;
mod smooth_solver;

pub use diagonal::DiagonalSolver;
pub use pbicg::PbicgSolver;
pub use pbicgstab::PbicgStabSolver;
pub use pcg::PcgSolver;
pub use smooth_solver::SmoothSolver;

pub(crate) use diagonal::new_diagonal_solver;
pub(crate) use pbicg::new_pbicg;
pub(crate) use pbicgstab::new_pbicgstab;
pub(crate) use pcg::new_pcg;
pub(crate) use smooth_solver::new_smooth_solver;

use crate::dictionary::{Dictionary, SolverControls};
use crate::error::{LduError, Result};
use crate::interfaces::LduInterfaceFields;
use crate::matrix::LduMatrix;
use crate::parallel::{self, Communicator, SerialCommunicator};
use crate::performance::SolverPerformance;
use crate::selection::SelectionTables;
use crate::traits::{Scalar, VectorSpace};
use ndarray::Array1;

/// Added to the normalisation factor so that a zero system does not divide by zero
pub const NORM_FACTOR_SMALL: f64 = 1.0e-20;

/// Everything a solver, preconditioner or smoother is built from.
///
/// All members are borrowed; the context is `Copy` and cheap to pass around.
pub struct SolverContext<'a, T: Scalar> {
    /// Name of the solved field, used in reports and residual diagnostics
    pub field_name: &'a str,
    /// The system matrix
    pub matrix: &'a LduMatrix<T>,
    /// Coupled interfaces of the matrix
    pub interfaces: &'a LduInterfaceFields<T>,
    /// Solver controls
    pub dict: &'a Dictionary,
    /// Registries used to resolve type names
    pub tables: &'a SelectionTables<T>,
    /// Partition communicator
    pub comm: &'a dyn Communicator,
}

impl<T: Scalar> Clone for SolverContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Scalar> Copy for SolverContext<'_, T> {}

impl<'a, T: Scalar> SolverContext<'a, T> {
    /// A serial context
    pub fn new(
        field_name: &'a str,
        matrix: &'a LduMatrix<T>,
        interfaces: &'a LduInterfaceFields<T>,
        dict: &'a Dictionary,
        tables: &'a SelectionTables<T>,
    ) -> Self {
        Self {
            field_name,
            matrix,
            interfaces,
            dict,
            tables,
            comm: &SerialCommunicator,
        }
    }

    /// Use `comm` for global reductions
    pub fn with_communicator(self, comm: &'a dyn Communicator) -> Self {
        Self { comm, ..self }
    }

    /// Select and construct the solver named in the dictionary
    pub fn new_solver(self) -> Result<Box<dyn LduSolver<T> + 'a>> {
        self.tables.new_solver(self)
    }
}

/// An iterative method bound to one matrix.
pub trait LduSolver<T: Scalar> {
    /// Registered type name
    fn type_name(&self) -> &'static str;

    /// Name of the solved field
    fn field_name(&self) -> &str;

    /// Iteration controls in effect
    fn controls(&self) -> &SolverControls;

    /// Solve `A psi = source`, starting from and updating `psi`
    fn solve(&self, psi: &mut Array1<T>, source: &Array1<T>) -> Result<SolverPerformance<T>>;
}

/// Select a solver from `ctx` and solve one scalar system.
///
/// On failure the communicator is aborted so that other partitions do not
/// wait for this one.
pub fn solve<T: Scalar>(
    ctx: SolverContext<'_, T>,
    psi: &mut Array1<T>,
    source: &Array1<T>,
) -> Result<SolverPerformance<T>> {
    ctx.new_solver()
        .and_then(|solver| solver.solve(psi, source))
        .inspect_err(|_| ctx.comm.abort())
}

/// Solve a multi-component field one component at a time.
///
/// Every component is solved with the same matrix and controls; the
/// per-component records are merged with [`SolverPerformance::replace`].
/// Failures abort the communicator as in [`solve`].
pub fn solve_segregated<V>(
    ctx: SolverContext<'_, V::Cmpt>,
    psi: &mut [V],
    source: &[V],
) -> Result<SolverPerformance<V>>
where
    V: VectorSpace,
{
    segregated(ctx, psi, source).inspect_err(|_| ctx.comm.abort())
}

fn segregated<V: VectorSpace>(
    ctx: SolverContext<'_, V::Cmpt>,
    psi: &mut [V],
    source: &[V],
) -> Result<SolverPerformance<V>> {
    let n = ctx.matrix.size();
    LduError::check_len("segregated psi", n, psi.len())?;
    LduError::check_len("segregated source", n, source.len())?;

    let solver = ctx.new_solver()?;
    let mut sp = SolverPerformance::<V>::new("", ctx.field_name);
    sp.converged = true;

    for cmpt in 0..V::N_COMPONENTS {
        let mut psi_cmpt: Array1<V::Cmpt> = psi.iter().map(|v| v.component(cmpt)).collect();
        let source_cmpt: Array1<V::Cmpt> = source.iter().map(|v| v.component(cmpt)).collect();

        let sp_cmpt = solver.solve(&mut psi_cmpt, &source_cmpt)?;

        for (v, &p) in psi.iter_mut().zip(psi_cmpt.iter()) {
            *v.component_mut(cmpt) = p;
        }
        sp.replace(cmpt, &sp_cmpt);
    }
    Ok(sp)
}

/// State shared by the iterative solvers: context, controls and the
/// convergence bookkeeping.
pub(crate) struct SolverCore<'a, T: Scalar> {
    pub ctx: SolverContext<'a, T>,
    pub controls: SolverControls,
    tolerance: T,
    rel_tol: T,
}

impl<'a, T: Scalar> SolverCore<'a, T> {
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        let controls = SolverControls::from_dict(ctx.dict)?;
        ctx.interfaces.check_cells(ctx.matrix.size())?;
        Ok(Self {
            ctx,
            tolerance: T::from_f64_lossy(controls.tolerance),
            rel_tol: T::from_f64_lossy(controls.rel_tol),
            controls,
        })
    }

    pub fn matrix(&self) -> &'a LduMatrix<T> {
        self.ctx.matrix
    }

    pub fn interfaces(&self) -> &'a LduInterfaceFields<T> {
        self.ctx.interfaces
    }

    pub fn comm(&self) -> &'a dyn Communicator {
        self.ctx.comm
    }

    pub fn check_fields(&self, psi: &Array1<T>, source: &Array1<T>) -> Result<()> {
        self.ctx.matrix.check_field("psi", psi)?;
        self.ctx.matrix.check_field("source", source)
    }

    /// `sum(|A psi - A xRef| + |b - A xRef|) + small`, reduced over all partitions.
    ///
    /// `tmp` is used as scratch space.
    pub fn norm_factor(
        &self,
        psi: &Array1<T>,
        source: &Array1<T>,
        a_psi: &Array1<T>,
        tmp: &mut Array1<T>,
    ) -> Result<T> {
        let comm = self.comm();
        self.matrix().sum_a(tmp, self.interfaces())?;
        let x_ref = parallel::g_average(comm, psi)?;
        tmp.mapv_inplace(|s| s * x_ref);

        let local: T = a_psi
            .iter()
            .zip(source.iter())
            .zip(tmp.iter())
            .map(|((&ap, &b), &ax)| (ap - ax).abs() + (b - ax).abs())
            .sum();
        let norm_factor = parallel::g_sum(comm, local)? + T::from_f64_lossy(NORM_FACTOR_SMALL);

        if self.controls.log_level >= 2 {
            log::info!("Normalisation factor = {norm_factor}");
        }
        Ok(norm_factor)
    }

    /// Normalised global residual
    pub fn normalised_residual(&self, r: &Array1<T>, norm_factor: T) -> Result<T> {
        Ok(parallel::g_sum_mag(self.comm(), r)? / norm_factor)
    }

    pub fn check_convergence(&self, sp: &mut SolverPerformance<T>) -> bool {
        sp.check_convergence(self.tolerance, self.rel_tol, self.controls.log_level)
    }

    /// True if the solve must enter the iteration loop
    pub fn needs_iterations(&self, sp: &mut SolverPerformance<T>) -> bool {
        self.controls.min_iter > 0 || !self.check_convergence(sp)
    }

    /// Count the iteration just finished and decide whether to continue
    pub fn keep_iterating(&self, sp: &mut SolverPerformance<T>) -> bool {
        sp.n_iterations += 1;
        (sp.n_iterations < self.controls.max_iter && !self.check_convergence(sp))
            || sp.n_iterations < self.controls.min_iter
    }

    pub fn check_singularity(&self, sp: &mut SolverPerformance<T>, value: T) -> bool {
        sp.check_singularity_with(value, self.controls.singularity_threshold)
    }

    /// Record diagnostics and report the outcome
    pub fn finish(&self, sp: &SolverPerformance<T>, r: &Array1<T>) {
        self.matrix().set_residual_field(r, self.ctx.field_name, false);
        sp.print(self.controls.log_level);
    }
}
