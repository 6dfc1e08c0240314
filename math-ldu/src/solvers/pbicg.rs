//! PBiCG (Preconditioned Bi-Conjugate Gradient) solver
//!
//! Extends conjugate gradients to asymmetric matrices by iterating a shadow
//! system with the transpose. Needs `Tmul` and a preconditioner that supports
//! the transposed application (`none`, `diagonal` or `DILU`).

use super::{LduSolver, SolverContext, SolverCore};
use crate::dictionary::SolverControls;
use crate::error::Result;
use crate::parallel;
use crate::performance::SolverPerformance;
use crate::preconditioners::LduPreconditioner;
use crate::traits::Scalar;
use ndarray::{Array1, Zip};

/// Preconditioned bi-conjugate gradient for asymmetric matrices
pub struct PbicgSolver<'a, T: Scalar> {
    core: SolverCore<'a, T>,
    preconditioner: Box<dyn LduPreconditioner<T> + 'a>,
}

impl<'a, T: Scalar> PbicgSolver<'a, T> {
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        let core = SolverCore::new(ctx)?;
        let preconditioner = ctx.tables.new_preconditioner(&ctx)?;
        Ok(Self {
            core,
            preconditioner,
        })
    }
}

impl<T: Scalar> LduSolver<T> for PbicgSolver<'_, T> {
    fn type_name(&self) -> &'static str {
        "PBiCG"
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
            format!("{}PBiCG", self.preconditioner.type_name()),
            self.field_name(),
        );

        let mut p_a = Array1::zeros(n);
        let mut w_a = Array1::zeros(n);
        matrix.amul(&mut w_a, psi, interfaces)?;
        let mut r_a = source - &w_a;

        let norm_factor = core.norm_factor(psi, source, &w_a, &mut p_a)?;
        sp.initial_residual = core.normalised_residual(&r_a, norm_factor)?;
        sp.final_residual = sp.initial_residual;
        matrix.set_residual_field(&r_a, self.field_name(), true);

        if core.needs_iterations(&mut sp) {
            let mut p_t = Array1::zeros(n);
            let mut w_t = Array1::zeros(n);
            let mut r_t = r_a.clone();
            let mut w_a_r_t = T::zero();

            loop {
                let w_a_r_t_old = w_a_r_t;

                self.preconditioner.precondition(&mut w_a, &r_a);
                self.preconditioner.precondition_t(&mut w_t, &r_t)?;
                w_a_r_t = parallel::g_sum_prod(comm, &w_a, &r_t)?;

                if sp.n_iterations == 0 {
                    p_a.assign(&w_a);
                    p_t.assign(&w_t);
                } else {
                    let beta = w_a_r_t / w_a_r_t_old;
                    Zip::from(&mut p_a)
                        .and(&mut p_t)
                        .and(&w_a)
                        .and(&w_t)
                        .for_each(|pa, pt, &wa, &wt| {
                            *pa = wa + beta * *pa;
                            *pt = wt + beta * *pt;
                        });
                }

                matrix.amul(&mut w_a, &p_a, interfaces)?;
                matrix.tmul(&mut w_t, &p_t, interfaces)?;
                let w_a_p_t = parallel::g_sum_prod(comm, &w_a, &p_t)?;

                if core.check_singularity(&mut sp, w_a_p_t.abs() / norm_factor) {
                    break;
                }

                let alpha = w_a_r_t / w_a_p_t;
                Zip::from(&mut *psi)
                    .and(&p_a)
                    .for_each(|x, &p| *x += alpha * p);
                Zip::from(&mut r_a)
                    .and(&mut r_t)
                    .and(&w_a)
                    .and(&w_t)
                    .for_each(|ra, rt, &wa, &wt| {
                        *ra -= alpha * wa;
                        *rt -= alpha * wt;
                    });

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

pub(crate) fn new_pbicg<'a, T: Scalar>(ctx: SolverContext<'a, T>) -> Result<Box<dyn LduSolver<T> + 'a>> {
    Ok(Box::new(PbicgSolver::new(ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::interfaces::LduInterfaceFields;
    use crate::preconditioners::test_matrices::{convection, dense};
    use crate::selection::SelectionTables;
    use approx::assert_relative_eq;

    #[test]
    fn test_pbicg_convection() {
        let n = 12;
        let m = convection(n, 4.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let b = Array1::from_shape_fn(n, |i| 1.0 + 0.1 * i as f64);

        for preconditioner in ["none", "diagonal", "DILU"] {
            let dict = Dictionary::new("U")
                .with("solver", "PBiCG")
                .with("preconditioner", preconditioner)
                .with("tolerance", 1e-12)
                .with("relTol", 0.0)
                .with("log", 0);
            let solver =
                PbicgSolver::new(SolverContext::new("U", &m, &interfaces, &dict, &tables)).unwrap();
            let mut psi = Array1::zeros(n);
            let sp = solver.solve(&mut psi, &b).unwrap();

            assert!(sp.converged, "{preconditioner}: {sp}");
            assert_eq!(sp.solver_name, format!("{preconditioner}PBiCG"));
            let ax = dense(&m).dot(&psi);
            for i in 0..n {
                assert_relative_eq!(ax[i], b[i], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_dilu_solves_chain_in_one_iteration() {
        // DILU is an exact factorisation for a chain
        let m = convection(6, 5.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = Dictionary::new("U")
            .with("solver", "PBiCG")
            .with("preconditioner", "DILU")
            .with("tolerance", 1e-12)
            .with("log", 0);
        let solver = PbicgSolver::new(SolverContext::new("U", &m, &interfaces, &dict, &tables)).unwrap();
        let mut psi = Array1::zeros(6);
        let sp = solver.solve(&mut psi, &Array1::from_elem(6, 1.0)).unwrap();
        assert!(sp.converged);
        assert_eq!(sp.n_iterations, 1);
    }
}
