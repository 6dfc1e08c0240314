//! Convergence record of one solve
//!
//! [`SolverPerformance`] carries the initial and final residual, iteration
//! count and convergence/singularity flags of a solve. Residuals of
//! multi-component fields are compared component by component: a vector
//! solve has converged only when every component has.

use crate::traits::{Scalar, VectorSpace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pivot magnitude below which a component is flagged singular
pub const VSMALL: f64 = 1.0e-300;

/// Relative tolerances at or below this value disable the relative test
pub const SMALL: f64 = 1.0e-15;

/// Outcome of a linear solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SolverPerformance<T: VectorSpace> {
    /// Name of the solver that produced this record
    pub solver_name: String,
    /// Name of the solved field
    pub field_name: String,
    /// Normalised residual before the first iteration
    pub initial_residual: T,
    /// Normalised residual at exit
    pub final_residual: T,
    /// Iterations performed
    pub n_iterations: usize,
    /// Whether the convergence test passed
    pub converged: bool,
    /// Per-component singularity flags
    pub singular: Vec<bool>,
}

impl<T: VectorSpace> Default for SolverPerformance<T> {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl<T: VectorSpace> SolverPerformance<T> {
    /// A fresh record: zero residuals, not converged, not singular
    pub fn new(solver_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::with_residuals(solver_name, field_name, T::zero_value(), T::zero_value(), 0, false, false)
    }

    /// A record with all fields given; `singular` applies to every component
    pub fn with_residuals(
        solver_name: impl Into<String>,
        field_name: impl Into<String>,
        initial_residual: T,
        final_residual: T,
        n_iterations: usize,
        converged: bool,
        singular: bool,
    ) -> Self {
        Self {
            solver_name: solver_name.into(),
            field_name: field_name.into(),
            initial_residual,
            final_residual,
            n_iterations,
            converged,
            singular: vec![singular; T::N_COMPONENTS],
        }
    }

    /// True if every component is singular
    pub fn singular(&self) -> bool {
        self.singular.iter().all(|&s| s)
    }

    /// Flag components whose pivot magnitude is below [`VSMALL`]
    pub fn check_singularity(&mut self, w_a_p_a: T) -> bool {
        self.check_singularity_with(w_a_p_a, VSMALL)
    }

    /// Flag components whose pivot magnitude is below `threshold` or not finite.
    ///
    /// A zero pivot in a preconditioner turns the pivot into inf or NaN;
    /// both count as singular. Returns [`singular`](Self::singular).
    pub fn check_singularity_with(&mut self, w_a_p_a: T, threshold: f64) -> bool {
        for (cmpt, flag) in self.singular.iter_mut().enumerate() {
            let pivot = w_a_p_a.component(cmpt).to_f64_lossy();
            *flag = !pivot.is_finite() || pivot < threshold;
        }
        self.singular()
    }

    /// Evaluate the convergence test and store the result.
    ///
    /// Converged if every component of the final residual is below
    /// `tolerance`, or if `rel_tol` is active in every component and every
    /// component of the final residual is below `rel_tol` times the initial one.
    pub fn check_convergence(&mut self, tolerance: T, rel_tol: T, log_level: u32) -> bool {
        if log_level >= 2 {
            log::info!(
                "{}:  Iteration {} residual = {:?}",
                self.solver_name,
                self.n_iterations,
                self.final_residual
            );
        }

        let small = T::uniform(<T::Cmpt as Scalar>::from_f64_lossy(SMALL));
        self.converged = self.final_residual.all_lt(&tolerance)
            || (rel_tol.all_gt(&small)
                && self
                    .final_residual
                    .all_lt(&rel_tol.cmpt_multiply(&self.initial_residual)));

        self.converged
    }

    /// Log the per-component report when `log_level > 0`
    pub fn print(&self, log_level: u32) {
        if log_level == 0 {
            return;
        }
        for line in self.report_lines() {
            log::info!("{line}");
        }
        if !self.converged {
            log::warn!(
                "{}: {} failed to converge in {} iterations",
                self.solver_name,
                self.field_name,
                self.n_iterations
            );
        }
    }

    fn report_lines(&self) -> Vec<String> {
        (0..T::N_COMPONENTS)
            .map(|cmpt| {
                let field = if T::N_COMPONENTS == 1 {
                    self.field_name.clone()
                } else {
                    format!("{}.{cmpt}", self.field_name)
                };
                if self.singular[cmpt] {
                    format!("{}:  Solving for {field}:  solution singularity", self.solver_name)
                } else {
                    format!(
                        "{}:  Solving for {field}, Initial residual = {}, Final residual = {}, No Iterations {}",
                        self.solver_name,
                        self.initial_residual.component(cmpt),
                        self.final_residual.component(cmpt),
                        self.n_iterations
                    )
                }
            })
            .collect()
    }

    /// Collapse to the component type: largest component of each residual.
    ///
    /// The result is singular if any component was.
    pub fn max(&self) -> SolverPerformance<T::Cmpt> {
        SolverPerformance::with_residuals(
            self.solver_name.clone(),
            self.field_name.clone(),
            self.initial_residual.cmpt_max(),
            self.final_residual.cmpt_max(),
            self.n_iterations,
            self.converged,
            self.singular.iter().any(|&s| s),
        )
    }

    /// Write the outcome of component `cmpt`, solved on its own.
    ///
    /// Converged stays true only if every replaced component converged.
    pub fn replace(&mut self, cmpt: usize, sp: &SolverPerformance<T::Cmpt>) {
        *self.initial_residual.component_mut(cmpt) = sp.initial_residual;
        *self.final_residual.component_mut(cmpt) = sp.final_residual;
        self.n_iterations = self.n_iterations.max(sp.n_iterations);
        self.converged = self.converged && sp.converged;
        self.singular[cmpt] = sp.singular();
        if self.solver_name.is_empty() {
            self.solver_name.clone_from(&sp.solver_name);
        }
    }
}

/// Merge two records of the same solve, as done across processes.
///
/// Residuals take the component-wise maximum, iterations the maximum;
/// the result has converged only if both have, and is singular in every
/// component if either is singular.
pub fn max<T: VectorSpace>(sp1: &SolverPerformance<T>, sp2: &SolverPerformance<T>) -> SolverPerformance<T> {
    SolverPerformance::with_residuals(
        sp1.solver_name.clone(),
        sp1.field_name.clone(),
        sp1.initial_residual.cmpt_max_with(&sp2.initial_residual),
        sp1.final_residual.cmpt_max_with(&sp2.final_residual),
        sp1.n_iterations.max(sp2.n_iterations),
        sp1.converged && sp2.converged,
        sp1.singular() || sp2.singular(),
    )
}

impl<T: VectorSpace> fmt::Display for SolverPerformance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.report_lines().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Vector3;
    use approx::assert_relative_eq;

    fn vector_sp(initial: Vector3, final_: Vector3) -> SolverPerformance<Vector3> {
        SolverPerformance::with_residuals("PBiCG", "U", initial, final_, 5, true, false)
    }

    #[test]
    fn test_convergence_absolute_tolerance() {
        let mut sp = SolverPerformance::<f64>::with_residuals("PCG", "p", 1.0, 1e-7, 3, false, false);
        assert!(sp.check_convergence(1e-6, 0.0, 0));
        assert!(sp.converged);

        sp.final_residual = 1e-5;
        assert!(!sp.check_convergence(1e-6, 0.0, 0));
    }

    #[test]
    fn test_convergence_relative_tolerance() {
        let mut sp = SolverPerformance::<f64>::with_residuals("PCG", "p", 1.0, 0.05, 3, false, false);
        assert!(sp.check_convergence(1e-6, 0.1, 0));
        // relTol at or below SMALL disables the relative test
        assert!(!sp.check_convergence(1e-6, 1e-16, 0));
    }

    #[test]
    fn test_convergence_componentwise_and() {
        let mut sp = vector_sp([1.0, 1.0, 1.0], [1e-7, 1e-7, 1e-3]);
        assert!(!sp.check_convergence([1e-6; 3], [0.0; 3], 0));

        sp.final_residual = [1e-7, 1e-7, 1e-7];
        assert!(sp.check_convergence([1e-6; 3], [0.0; 3], 0));

        // relative test must pass in every component too
        sp.final_residual = [0.05, 0.05, 0.5];
        assert!(!sp.check_convergence([1e-6; 3], [0.1; 3], 0));
    }

    #[test]
    fn test_singularity() {
        let mut sp = SolverPerformance::<Vector3>::new("PCG", "U");
        assert!(!sp.check_singularity([0.0, 1.0, 1.0]));
        assert_eq!(sp.singular, vec![true, false, false]);
        assert!(sp.check_singularity([0.0, 0.0, 0.0]));

        let mut sp = SolverPerformance::<f64>::new("PCG", "p");
        assert!(sp.check_singularity_with(1e-12, 1e-10));
        assert!(!sp.check_singularity(1e-12));
        assert!(sp.check_singularity(f64::NAN));
        assert!(sp.check_singularity(f64::INFINITY));
    }

    #[test]
    fn test_pairwise_max() {
        let mut sp1 = vector_sp([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        let mut sp2 = vector_sp([2.0, 1.0, 4.0], [0.3, 0.1, 0.2]);
        sp2.converged = false;
        sp2.n_iterations = 9;

        let m = max(&sp1, &sp2);
        assert_eq!(m.initial_residual, [2.0, 2.0, 4.0]);
        assert_eq!(m.final_residual, [0.3, 0.2, 0.3]);
        assert_eq!(m.n_iterations, 9);
        assert!(!m.converged);
        assert!(!m.singular());

        sp1.singular = vec![true; 3];
        let m = max(&sp1, &sp2);
        assert_eq!(m.singular, vec![true; 3]);
    }

    #[test]
    fn test_collapse_to_component() {
        let mut sp = vector_sp([1.0, 5.0, 3.0], [0.1, 0.2, 0.05]);
        let s = sp.max();
        assert_relative_eq!(s.initial_residual, 5.0);
        assert_relative_eq!(s.final_residual, 0.2);
        assert_eq!(s.n_iterations, 5);
        assert!(s.converged);
        assert!(!s.singular());

        // one singular component marks the collapsed record singular
        sp.singular = vec![true, false, false];
        assert!(!sp.singular());
        assert!(sp.max().singular());
    }

    #[test]
    fn test_replace_component() {
        let mut sp = SolverPerformance::<Vector3>::new("", "U");
        sp.converged = true;
        let cmpt = SolverPerformance::<f64>::with_residuals("PBiCG", "U", 0.5, 1e-8, 4, true, false);
        sp.replace(1, &cmpt);

        assert_eq!(sp.initial_residual, [0.0, 0.5, 0.0]);
        assert_eq!(sp.n_iterations, 4);
        assert_eq!(sp.solver_name, "PBiCG");
        assert!(sp.converged);

        let failed = SolverPerformance::<f64>::with_residuals("PBiCG", "U", 0.5, 0.1, 1000, false, false);
        sp.replace(2, &failed);
        assert!(!sp.converged);
        assert_eq!(sp.n_iterations, 1000);
    }

    #[test]
    fn test_equality_is_fieldwise() {
        let a = vector_sp([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.singular[2] = true;
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_reports_singularity() {
        let mut sp = vector_sp([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        sp.singular = vec![false, true, false];
        let text = sp.to_string();
        assert!(text.contains("Solving for U.0, Initial residual = 1"));
        assert!(text.contains("Solving for U.1:  solution singularity"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_serde_round_trip() {
        let sp = vector_sp([1.0, 2.0, 3.0], [0.1, 0.2, 0.3]);
        let json = serde_json::to_string(&sp).unwrap();
        let back: SolverPerformance<Vector3> = serde_json::from_str(&json).unwrap();
        assert_eq!(sp, back);
    }
}
