//! Incomplete-factorisation smoothers (DIC, DILU)
//!
//! Each sweep computes the residual, including interface coupling, and
//! corrects `psi` by the factorised approximation of `A^-1` applied to it.

use super::LduSmoother;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::interfaces::LduInterfaceFields;
use crate::matrix::LduMatrix;
use crate::preconditioners::{DicPreconditioner, DiluPreconditioner, LduPreconditioner};
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// Residual-correction smoother driven by an incomplete factorisation
pub struct FactorisedSmoother<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
    interfaces: &'a LduInterfaceFields<T>,
    factor: Box<dyn LduPreconditioner<T> + 'a>,
}

impl<'a, T: Scalar> FactorisedSmoother<'a, T> {
    /// DIC smoother; the matrix must be symmetric
    pub fn dic(matrix: &'a LduMatrix<T>, interfaces: &'a LduInterfaceFields<T>) -> Result<Self> {
        Ok(Self {
            matrix,
            interfaces,
            factor: Box::new(DicPreconditioner::new(matrix)?),
        })
    }

    /// DILU smoother
    pub fn dilu(matrix: &'a LduMatrix<T>, interfaces: &'a LduInterfaceFields<T>) -> Result<Self> {
        Ok(Self {
            matrix,
            interfaces,
            factor: Box::new(DiluPreconditioner::new(matrix)?),
        })
    }
}

impl<T: Scalar> std::fmt::Debug for FactorisedSmoother<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorisedSmoother")
            .field("factor", &self.factor.type_name())
            .finish()
    }
}

impl<T: Scalar> LduSmoother<T> for FactorisedSmoother<'_, T> {
    fn type_name(&self) -> &'static str {
        self.factor.type_name()
    }

    fn smooth(&self, psi: &mut Array1<T>, source: &Array1<T>, n_sweeps: usize) -> Result<()> {
        let n = self.matrix.size();
        let mut r = Array1::zeros(n);
        let mut correction = Array1::zeros(n);

        for _ in 0..n_sweeps {
            self.matrix.residual(&mut r, psi, source, self.interfaces)?;
            self.factor.precondition(&mut correction, &r);
            *psi += &correction;
        }
        Ok(())
    }
}

pub(crate) fn new_dic_smoother<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduSmoother<T> + 'a>> {
    Ok(Box::new(FactorisedSmoother::dic(ctx.matrix, ctx.interfaces)?))
}

pub(crate) fn new_dilu_smoother<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduSmoother<T> + 'a>> {
    Ok(Box::new(FactorisedSmoother::dilu(ctx.matrix, ctx.interfaces)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::test_matrices::{convection, laplacian};
    use approx::assert_relative_eq;

    #[test]
    fn test_one_sweep_solves_chain() {
        // the factorisation of a chain is exact, so one correction solves it
        let m = convection(6, 5.0);
        let interfaces = LduInterfaceFields::new();
        let b = Array1::from_shape_fn(6, |i| i as f64);
        let mut psi = Array1::from_elem(6, 0.3);

        let smoother = FactorisedSmoother::dilu(&m, &interfaces).unwrap();
        assert_eq!(smoother.type_name(), "DILU");
        smoother.smooth(&mut psi, &b, 1).unwrap();

        let r = m.residual_of(&psi, &b, &interfaces).unwrap();
        for ri in r.iter() {
            assert_relative_eq!(*ri, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_dic_requires_symmetric() {
        let m = convection(3, 4.0);
        let interfaces = LduInterfaceFields::new();
        assert!(FactorisedSmoother::dic(&m, &interfaces).is_err());

        let m = laplacian(3, 4.0);
        let smoother = FactorisedSmoother::dic(&m, &interfaces).unwrap();
        assert_eq!(smoother.type_name(), "DIC");
    }

    #[test]
    fn test_zero_sweeps_leave_psi() {
        let m = laplacian(4, 4.0);
        let interfaces = LduInterfaceFields::new();
        let mut psi = Array1::from_elem(4, 2.0);
        FactorisedSmoother::dic(&m, &interfaces)
            .unwrap()
            .smooth(&mut psi, &Array1::zeros(4), 0)
            .unwrap();
        assert_eq!(psi, Array1::from_elem(4, 2.0));
    }
}
