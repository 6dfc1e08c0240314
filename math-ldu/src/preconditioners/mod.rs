//! Preconditioners for the Krylov solvers
//!
//! A preconditioner turns a residual `r` into a correction `w ~ A^-1 r`.
//! Every preconditioner borrows the matrix it was built from and never reads
//! its source.
//!
//! # Available Preconditioners
//!
//! - **none**: `w = r`
//! - **diagonal** (Jacobi): `w = r / diag`, parallel with the `rayon` feature
//! - **DIC**: diagonal incomplete Cholesky, symmetric matrices only
//! - **DILU**: diagonal incomplete LU, symmetric or asymmetric matrices

mod diagonal;
mod dic;
mod dilu;
mod none;

pub use diagonal::DiagonalPreconditioner;
pub use dic::{DicPreconditioner, dic_reciprocal_d};
pub use dilu::{DiluPreconditioner, dilu_reciprocal_d};
pub use none::NoPreconditioner;

pub(crate) use diagonal::new_diagonal;
pub(crate) use dic::new_dic;
pub(crate) use dilu::new_dilu;
pub(crate) use none::new_none;

use crate::error::{LduError, Result};
use crate::matrix::LduMatrix;
use crate::traits::Scalar;
use ndarray::Array1;

/// Approximate inverse of an LDU matrix.
pub trait LduPreconditioner<T: Scalar> {
    /// Registered type name
    fn type_name(&self) -> &'static str;

    /// The matrix being preconditioned
    fn matrix(&self) -> &LduMatrix<T>;

    /// `w = M^-1 r`
    fn precondition(&self, w: &mut Array1<T>, r: &Array1<T>);

    /// `w = M^-T r`.
    ///
    /// Falls back to [`precondition`](Self::precondition) for a symmetric
    /// matrix and fails otherwise.
    fn precondition_t(&self, w: &mut Array1<T>, r: &Array1<T>) -> Result<()> {
        if self.matrix().symmetric() {
            self.precondition(w, r);
            Ok(())
        } else {
            Err(LduError::TransposeNotSupported {
                operator: self.type_name(),
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod test_matrices {
    use crate::addressing::LduAddressing;
    use crate::matrix::LduMatrix;
    use ndarray::{Array1, Array2};
    use std::sync::Arc;

    /// 1-D Laplacian with `diag` on the diagonal and -1 off it
    pub fn laplacian(n: usize, diag: f64) -> LduMatrix<f64> {
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap();
        let mut m = LduMatrix::new(Arc::new(addr));
        m.set_diag(Array1::from_elem(n, diag)).unwrap();
        m.set_upper(Array1::from_elem(n - 1, -1.0)).unwrap();
        m
    }

    /// Asymmetric tridiagonal: upper -1, lower -2
    pub fn convection(n: usize, diag: f64) -> LduMatrix<f64> {
        let mut m = laplacian(n, diag);
        m.set_lower(Array1::from_elem(n - 1, -2.0)).unwrap();
        m
    }

    /// Dense copy of the matrix
    pub fn dense(m: &LduMatrix<f64>) -> Array2<f64> {
        let n = m.size();
        let mut a = Array2::zeros((n, n));
        let diag = m.diag().unwrap();
        for i in 0..n {
            a[[i, i]] = diag[i];
        }
        if let (Ok(lower), Ok(upper)) = (m.lower(), m.upper()) {
            let addr = m.addressing();
            for f in 0..m.n_faces() {
                let (l, u) = (addr.lower_addr()[f], addr.upper_addr()[f]);
                a[[l, u]] = upper[f];
                a[[u, l]] = lower[f];
            }
        }
        a
    }
}
