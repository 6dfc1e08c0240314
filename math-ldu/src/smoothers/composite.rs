//! Factorisation sweep followed by Gauss-Seidel
//!
//! The incomplete factorisation removes the smooth error, Gauss-Seidel then
//! damps what remains at high frequency.

use super::{FactorisedSmoother, GaussSeidelSmoother, LduSmoother};
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// Two smoothers applied in turn, each for the requested number of sweeps
pub struct CompositeSmoother<'a, T: Scalar> {
    name: &'static str,
    first: FactorisedSmoother<'a, T>,
    second: GaussSeidelSmoother<'a, T>,
}

impl<'a, T: Scalar> CompositeSmoother<'a, T> {
    /// Combine a factorised smoother with Gauss-Seidel under `name`
    pub fn new(
        name: &'static str,
        first: FactorisedSmoother<'a, T>,
        second: GaussSeidelSmoother<'a, T>,
    ) -> Self {
        Self { name, first, second }
    }
}

impl<T: Scalar> std::fmt::Debug for CompositeSmoother<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSmoother")
            .field("name", &self.name)
            .finish()
    }
}

impl<T: Scalar> LduSmoother<T> for CompositeSmoother<'_, T> {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn smooth(&self, psi: &mut Array1<T>, source: &Array1<T>, n_sweeps: usize) -> Result<()> {
        self.first.smooth(psi, source, n_sweeps)?;
        self.second.smooth(psi, source, n_sweeps)
    }
}

pub(crate) fn new_dic_gauss_seidel<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduSmoother<T> + 'a>> {
    Ok(Box::new(CompositeSmoother::new(
        "DICGaussSeidel",
        FactorisedSmoother::dic(ctx.matrix, ctx.interfaces)?,
        GaussSeidelSmoother::new(ctx.matrix, ctx.interfaces)?,
    )))
}

pub(crate) fn new_dilu_gauss_seidel<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduSmoother<T> + 'a>> {
    Ok(Box::new(CompositeSmoother::new(
        "DILUGaussSeidel",
        FactorisedSmoother::dilu(ctx.matrix, ctx.interfaces)?,
        GaussSeidelSmoother::new(ctx.matrix, ctx.interfaces)?,
    )))
}
