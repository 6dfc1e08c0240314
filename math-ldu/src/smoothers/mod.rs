//! Smoothers: fixed numbers of local relaxation sweeps
//!
//! A smoother reduces the high-frequency error of `psi` for `A psi = source`
//! without any convergence control. Interface coupling is re-evaluated at
//! the start of every sweep, so coupled cells see the latest values.
//!
//! # Available Smoothers
//!
//! - **GaussSeidel**: forward sweep in cell order
//! - **symGaussSeidel**: forward then backward sweep
//! - **DIC** / **DILU**: residual correction through the incomplete factorisation
//! - **DICGaussSeidel** / **DILUGaussSeidel**: factorisation sweep followed by Gauss-Seidel

mod composite;
mod factorised;
mod gauss_seidel;

pub use composite::CompositeSmoother;
pub use factorised::FactorisedSmoother;
pub use gauss_seidel::GaussSeidelSmoother;

pub(crate) use composite::{new_dic_gauss_seidel, new_dilu_gauss_seidel};
pub(crate) use factorised::{new_dic_smoother, new_dilu_smoother};
pub(crate) use gauss_seidel::{new_gauss_seidel, new_sym_gauss_seidel};

use crate::error::Result;
use crate::traits::Scalar;
use ndarray::Array1;

/// Relaxation sweeps on an LDU system.
pub trait LduSmoother<T: Scalar> {
    /// Registered type name
    fn type_name(&self) -> &'static str;

    /// Perform `n_sweeps` sweeps on `psi`
    fn smooth(&self, psi: &mut Array1<T>, source: &Array1<T>, n_sweeps: usize) -> Result<()>;
}
