//! PCG (Preconditioned Conjugate Gradient) solver
//!
//! The method of choice for symmetric positive definite systems, e.g. the
//! pressure equation. Each iteration costs one matrix-vector product, one
//! preconditioner application and two global reductions.

use super::{LduSolver, SolverContext, SolverCore};
use crate::dictionary::SolverControls;
use crate::error::Result;
use crate::parallel;
use crate::performance::SolverPerformance;
use crate::preconditioners::LduPreconditioner;
use crate::traits::Scalar;
use ndarray::{Array1, Zip};

/// Preconditioned conjugate gradient for symmetric matrices
pub struct PcgSolver<'a, T: Scalar> {
    core: SolverCore<'a, T>,
    preconditioner: Box<dyn LduPreconditioner<T> + 'a>,
}

impl<'a, T: Scalar> PcgSolver<'a, T> {
    /// Build the solver and its preconditioner from the context dictionary
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        let core = SolverCore::new(ctx)?;
        let preconditioner = ctx.tables.new_preconditioner(&ctx)?;
        Ok(Self {
            core,
            preconditioner,
        })
    }
}

impl<T: Scalar> LduSolver<T> for PcgSolver<'_, T> {
    fn type_name(&self) -> &'static str {
        "PCG"
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
            format!("{}PCG", self.preconditioner.type_name()),
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
            let mut w_a_r_a = T::zero();

            loop {
                let w_a_r_a_old = w_a_r_a;

                self.preconditioner.precondition(&mut w_a, &r_a);
                w_a_r_a = parallel::g_sum_prod(comm, &w_a, &r_a)?;

                if sp.n_iterations == 0 {
                    p_a.assign(&w_a);
                } else {
                    let beta = w_a_r_a / w_a_r_a_old;
                    Zip::from(&mut p_a)
                        .and(&w_a)
                        .for_each(|p, &w| *p = w + beta * *p);
                }

                matrix.amul(&mut w_a, &p_a, interfaces)?;
                let w_a_p_a = parallel::g_sum_prod(comm, &w_a, &p_a)?;

                if core.check_singularity(&mut sp, w_a_p_a.abs() / norm_factor) {
                    break;
                }

                let alpha = w_a_r_a / w_a_p_a;
                Zip::from(&mut *psi)
                    .and(&mut r_a)
                    .and(&p_a)
                    .and(&w_a)
                    .for_each(|x, r, &p, &w| {
                        *x += alpha * p;
                        *r -= alpha * w;
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

pub(crate) fn new_pcg<'a, T: Scalar>(ctx: SolverContext<'a, T>) -> Result<Box<dyn LduSolver<T> + 'a>> {
    Ok(Box::new(PcgSolver::new(ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::interfaces::LduInterfaceFields;
    use crate::preconditioners::test_matrices::{dense, laplacian};
    use crate::selection::SelectionTables;
    use approx::assert_relative_eq;

    fn pcg_dict(preconditioner: &str, max_iter: usize) -> Dictionary {
        Dictionary::new("p")
            .with("solver", "PCG")
            .with("preconditioner", preconditioner)
            .with("tolerance", 1e-10)
            .with("relTol", 0.0)
            .with("maxIter", max_iter)
            .with("log", 0)
    }

    #[test]
    fn test_pcg_laplacian_converges() {
        let n = 10;
        let m = laplacian(n, 2.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let b = Array1::from_shape_fn(n, |i| (i as f64 + 1.0).sin());

        for preconditioner in ["none", "diagonal", "DIC", "DILU"] {
            let dict = pcg_dict(preconditioner, 1000);
            let solver = PcgSolver::new(SolverContext::new("p", &m, &interfaces, &dict, &tables)).unwrap();

            let mut psi = Array1::zeros(n);
            let sp = solver.solve(&mut psi, &b).unwrap();

            assert!(sp.converged, "{preconditioner}: {sp}");
            assert!(sp.n_iterations <= n, "{preconditioner}: {}", sp.n_iterations);
            assert_eq!(sp.solver_name, format!("{preconditioner}PCG"));

            let ax = dense(&m).dot(&psi);
            for i in 0..n {
                assert_relative_eq!(ax[i], b[i], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_pcg_residual_non_increasing_with_max_iter() {
        let n = 10;
        let m = laplacian(n, 2.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let b = Array1::from_elem(n, 1.0);

        let mut previous = f64::INFINITY;
        for max_iter in 1..=n {
            let dict = pcg_dict("DIC", max_iter);
            let solver = PcgSolver::new(SolverContext::new("p", &m, &interfaces, &dict, &tables)).unwrap();
            let mut psi = Array1::zeros(n);
            let sp = solver.solve(&mut psi, &b).unwrap();
            assert!(sp.final_residual <= previous * (1.0 + 1e-12));
            previous = sp.final_residual;
        }
    }

    #[test]
    fn test_converged_start_skips_iterations() {
        let m = laplacian(4, 3.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = pcg_dict("DIC", 100);
        let solver = PcgSolver::new(SolverContext::new("p", &m, &interfaces, &dict, &tables)).unwrap();

        let mut psi = Array1::from_elem(4, 1.0);
        let mut b = Array1::zeros(4);
        m.amul(&mut b, &psi, &interfaces).unwrap();

        let sp = solver.solve(&mut psi, &b).unwrap();
        assert_eq!(sp.n_iterations, 0);
        assert!(sp.converged);
        assert_eq!(psi, Array1::from_elem(4, 1.0));
    }

    #[test]
    fn test_exact_start_with_min_iter_is_singular() {
        let m = laplacian(4, 3.0);
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = pcg_dict("diagonal", 100).with("minIter", 2);
        let solver = PcgSolver::new(SolverContext::new("p", &m, &interfaces, &dict, &tables)).unwrap();

        let mut psi = Array1::from_elem(4, 1.0);
        let mut b = Array1::zeros(4);
        m.amul(&mut b, &psi, &interfaces).unwrap();
        // exact start: the first pivot is zero and the solve stops as singular
        let sp = solver.solve(&mut psi, &b).unwrap();
        assert!(sp.singular());
    }

    #[test]
    fn test_zero_diagonal_stops_as_singular() {
        let mut m = laplacian(5, 2.0);
        m.diag_mut()[2] = 0.0;
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = pcg_dict("diagonal", 100);
        let solver = PcgSolver::new(SolverContext::new("p", &m, &interfaces, &dict, &tables)).unwrap();

        let mut psi = Array1::zeros(5);
        let sp = solver.solve(&mut psi, &Array1::from_elem(5, 1.0)).unwrap();

        assert!(sp.singular());
        assert!(!sp.converged);
        assert_eq!(sp.n_iterations, 0);
        assert!(psi.iter().all(|x| x.is_finite()));
    }
}
