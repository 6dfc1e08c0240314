//! Iterative solver built from a smoother
//!
//! Applies `nSweeps` smoother sweeps between convergence checks. A negative
//! `nSweeps` runs exactly that many sweeps without computing residuals.

use super::{LduSolver, SolverContext, SolverCore};
use crate::dictionary::SolverControls;
use crate::error::Result;
use crate::performance::SolverPerformance;
use crate::smoothers::LduSmoother;
use crate::traits::Scalar;
use ndarray::Array1;

/// Smoother iterations with convergence control
pub struct SmoothSolver<'a, T: Scalar> {
    core: SolverCore<'a, T>,
    smoother: Box<dyn LduSmoother<T> + 'a>,
    n_sweeps: i64,
}

impl<'a, T: Scalar> SmoothSolver<'a, T> {
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        let core = SolverCore::new(ctx)?;
        let smoother = ctx.tables.new_smoother(&ctx)?;
        let n_sweeps = ctx.dict.lookup_or_default::<i64>("nSweeps", 1)?;
        Ok(Self {
            core,
            smoother,
            n_sweeps,
        })
    }

    /// Sweeps between convergence checks; negative for a fixed sweep count
    pub fn n_sweeps(&self) -> i64 {
        self.n_sweeps
    }
}

impl<T: Scalar> LduSolver<T> for SmoothSolver<'_, T> {
    fn type_name(&self) -> &'static str {
        "smoothSolver"
    }

    fn field_name(&self) -> &str {
        self.core.ctx.field_name
    }

    fn controls(&self) -> &SolverControls {
        &self.core.controls
    }

    fn solve(&self, psi: &mut Array1<T>, source: &Array1<T>) -> Result<SolverPerformance<T>> {
        let core = &self.core;
        core.check_fields(psi, source)?;
        let matrix = core.matrix();
        let interfaces = core.interfaces();
        let n = matrix.size();

        let mut sp = SolverPerformance::<T>::new(self.type_name(), self.field_name());

        if self.n_sweeps < 0 {
            let sweeps = self.n_sweeps.unsigned_abs() as usize;
            self.smoother.smooth(psi, source, sweeps)?;
            sp.n_iterations += sweeps;
            return Ok(sp);
        }
        let sweeps = self.n_sweeps as usize;

        let mut a_psi = Array1::zeros(n);
        matrix.amul(&mut a_psi, psi, interfaces)?;
        let mut r = source - &a_psi;

        let mut tmp = Array1::zeros(n);
        let norm_factor = core.norm_factor(psi, source, &a_psi, &mut tmp)?;
        sp.initial_residual = core.normalised_residual(&r, norm_factor)?;
        sp.final_residual = sp.initial_residual;
        matrix.set_residual_field(&r, self.field_name(), true);

        if core.needs_iterations(&mut sp) {
            loop {
                self.smoother.smooth(psi, source, sweeps)?;

                matrix.residual(&mut r, psi, source, interfaces)?;
                sp.final_residual = core.normalised_residual(&r, norm_factor)?;
                sp.n_iterations += sweeps;

                let min_iter = core.controls.min_iter;
                let keep_going = (sp.n_iterations < core.controls.max_iter
                    && !core.check_convergence(&mut sp))
                    || sp.n_iterations < min_iter;
                if !keep_going || sweeps == 0 {
                    break;
                }
            }
        }

        core.finish(&sp, &r);
        Ok(sp)
    }
}

pub(crate) fn new_smooth_solver<'a, T: Scalar>(
    ctx: SolverContext<'a, T>,
) -> Result<Box<dyn LduSolver<T> + 'a>> {
    Ok(Box::new(SmoothSolver::new(ctx)?))
}
