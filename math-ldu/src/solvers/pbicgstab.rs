//! PBiCGStab (Preconditioned Stabilised Bi-Conjugate Gradient) solver
//!
//! Works on symmetric and asymmetric matrices without a transposed product.
//! Each iteration applies the preconditioner twice and the matrix twice, and
//! may stop half way when the intermediate residual already meets the
//! tolerance.

use super::{LduSolver, SolverContext, SolverCore};
use crate::dictionary::SolverControls;
use crate::error::Result;
use crate::parallel;
use crate::performance::SolverPerformance;
use crate::preconditioners::LduPreconditioner;
use crate::traits::Scalar;
use ndarray::{Array1, Zip};

/// Stabilised bi-conjugate gradient
pub struct PbicgStabSolver<'a, T: Scalar> {
    core: SolverCore<'a, T>,
    preconditioner: Box<dyn LduPreconditioner<T> + 'a>,
}

impl<'a, T: Scalar> PbicgStabSolver<'a, T> {
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        let core = SolverCore::new(ctx)?;
        let preconditioner = ctx.tables.new_preconditioner(&ctx)?;
        Ok(Self {
            core,
            preconditioner,
        })
    }
}

impl<T: Scalar> LduSolver<T> for PbicgStabSolver<'_, T> {
    fn type_name(&self) -> &'static str {
        "PBiCGStab"
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
        let comm = core.comm();
        let n = matrix.size();

        let mut sp = SolverPerformance::<T>::new(
            format!("{}PBiCGStab", self.preconditioner.type_name()),
            self.field_name(),
        );

        let mut y_a = Array1::zeros(n);
        matrix.amul(&mut y_a, psi, interfaces)?;
        let mut r_a = source - &y_a;

        let mut tmp = Array1::zeros(n);
        let norm_factor = core.norm_factor(psi, source, &y_a, &mut tmp)?;
        sp.initial_residual = core.normalised_residual(&r_a, norm_factor)?;
        sp.final_residual = sp.initial_residual;
        matrix.set_residual_field(&r_a, self.field_name(), true);

        if core.needs_iterations(&mut sp) {
            let r_a0 = r_a.clone();
            let mut a_y_a = Array1::zeros(n);
            let mut p_a = Array1::zeros(n);
            let mut s_a = Array1::zeros(n);
            let mut z_a = Array1::zeros(n);
            let mut t_a = Array1::zeros(n);

            let mut r_a0_r_a = T::zero();
            let mut alpha = T::zero();
            let mut omega = T::zero();

            loop {
                let r_a0_r_a_old = r_a0_r_a;
                r_a0_r_a = parallel::g_sum_prod(comm, &r_a0, &r_a)?;

                if core.check_singularity(&mut sp, r_a0_r_a.abs()) {
                    break;
                }

                if sp.n_iterations == 0 {
                    p_a.assign(&r_a);
                } else {
                    if core.check_singularity(&mut sp, omega.abs()) {
                        break;
                    }
                    let beta = (r_a0_r_a / r_a0_r_a_old) * (alpha / omega);
                    Zip::from(&mut p_a)
                        .and(&r_a)
                        .and(&a_y_a)
                        .for_each(|p, &r, &ay| *p = r + beta * (*p - omega * ay));
                }

                self.preconditioner.precondition(&mut y_a, &p_a);
                matrix.amul(&mut a_y_a, &y_a, interfaces)?;

                let r_a0_a_y_a = parallel::g_sum_prod(comm, &r_a0, &a_y_a)?;
                alpha = r_a0_r_a / r_a0_a_y_a;

                Zip::from(&mut s_a)
                    .and(&r_a)
                    .and(&a_y_a)
                    .for_each(|s, &r, &ay| *s = r - alpha * ay);

                sp.final_residual = core.normalised_residual(&s_a, norm_factor)?;

                // half-step exit when the intermediate residual has converged
                if sp.n_iterations + 1 >= core.controls.min_iter && core.check_convergence(&mut sp) {
                    Zip::from(&mut *psi)
                        .and(&y_a)
                        .for_each(|x, &y| *x += alpha * y);
                    sp.n_iterations += 1;
                    r_a.assign(&s_a);
                    core.finish(&sp, &r_a);
                    return Ok(sp);
                }

                self.preconditioner.precondition(&mut z_a, &s_a);
                matrix.amul(&mut t_a, &z_a, interfaces)?;

                let t_a_t_a = parallel::g_sum_sqr(comm, &t_a)?;
                if core.check_singularity(&mut sp, t_a_t_a) {
                    break;
                }
                omega = parallel::g_sum_prod(comm, &t_a, &s_a)? / t_a_t_a;

                Zip::from(&mut *psi)
                    .and(&y_a)
                    .and(&z_a)
                    .for_each(|x, &y, &z| *x += alpha * y + omega * z);
                Zip::from(&mut r_a)
                    .and(&s_a)
                    .and(&t_a)
                    .for_each(|r, &s, &t| *r = s - omega * t);

                sp.final_residual = core.normalised_residual(&r_a, norm_factor)?;

                if !core.keep_iterating(&mut sp) {
                    break;
                }
            }
        }

        core.finish(&sp, &r_a);
        Ok(sp)
    }
}

pub(crate) fn new_pbicgstab<'a, T: Scalar>(
    ctx: SolverContext<'a, T>,
) -> Result<Box<dyn LduSolver<T> + 'a>> {
    Ok(Box::new(PbicgStabSolver::new(ctx)?))
}
