//! Identity preconditioner

use super::LduPreconditioner;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::matrix::LduMatrix;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// No preconditioning: `w = r`
#[derive(Debug, Clone, Copy)]
pub struct NoPreconditioner<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
}

impl<'a, T: Scalar> NoPreconditioner<'a, T> {
    /// Wrap a matrix
    pub fn new(matrix: &'a LduMatrix<T>) -> Self {
        Self { matrix }
    }
}

impl<T: Scalar> LduPreconditioner<T> for NoPreconditioner<'_, T> {
    fn type_name(&self) -> &'static str {
        "none"
    }

    fn matrix(&self) -> &LduMatrix<T> {
        self.matrix
    }

    fn precondition(&self, w: &mut Array1<T>, r: &Array1<T>) {
        w.assign(r);
    }

    fn precondition_t(&self, w: &mut Array1<T>, r: &Array1<T>) -> Result<()> {
        w.assign(r);
        Ok(())
    }
}

pub(crate) fn new_none<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduPreconditioner<T> + 'a>> {
    Ok(Box::new(NoPreconditioner::new(ctx.matrix)))
}
