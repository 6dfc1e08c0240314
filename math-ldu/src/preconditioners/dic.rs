//! Diagonal incomplete Cholesky preconditioner
//!
//! The factorisation keeps the sparsity of the matrix and only modifies the
//! diagonal: `M = (D + L) D^-1 (D + U)` with `U = L^T`. Applying `M^-1` is a
//! forward then a backward substitution sweep over the faces.

use super::LduPreconditioner;
use crate::dictionary::Dictionary;
use crate::error::{LduError, Result};
use crate::matrix::LduMatrix;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// Reciprocal of the DIC-modified diagonal of a symmetric matrix.
///
/// Fails with [`LduError::NotSymmetric`] on an asymmetric matrix.
pub fn dic_reciprocal_d<T: Scalar>(matrix: &LduMatrix<T>) -> Result<Array1<T>> {
    if matrix.has_lower() && matrix.has_upper() {
        return Err(LduError::NotSymmetric { operator: "DIC" });
    }
    let mut r_d = matrix.diag()?.clone();

    if let Some((_, upper)) = matrix.off_diag() {
        let addr = matrix.addressing();
        for (face, (&l, &u)) in addr.lower_addr().iter().zip(addr.upper_addr()).enumerate() {
            let d_l = r_d[l];
            r_d[u] -= upper[face] * upper[face] / d_l;
        }
    }

    r_d.mapv_inplace(|d| d.recip());
    Ok(r_d)
}

/// Diagonal incomplete Cholesky preconditioner
#[derive(Debug, Clone)]
pub struct DicPreconditioner<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
    r_d: Array1<T>,
}

impl<'a, T: Scalar> DicPreconditioner<'a, T> {
    /// Factorise a symmetric matrix
    pub fn new(matrix: &'a LduMatrix<T>) -> Result<Self> {
        let r_d = dic_reciprocal_d(matrix)?;
        Ok(Self { matrix, r_d })
    }

    /// Reciprocal of the factorised diagonal
    pub fn reciprocal_d(&self) -> &Array1<T> {
        &self.r_d
    }
}

impl<T: Scalar> LduPreconditioner<T> for DicPreconditioner<'_, T> {
    fn type_name(&self) -> &'static str {
        "DIC"
    }

    fn matrix(&self) -> &LduMatrix<T> {
        self.matrix
    }

    fn precondition(&self, w: &mut Array1<T>, r: &Array1<T>) {
        let r_d = &self.r_d;
        ndarray::Zip::from(&mut *w)
            .and(r_d)
            .and(r)
            .for_each(|wi, &di, &ri| *wi = di * ri);

        let Some((_, upper)) = self.matrix.off_diag() else {
            return;
        };
        let addr = self.matrix.addressing();
        let (lower_addr, upper_addr) = (addr.lower_addr(), addr.upper_addr());

        for face in 0..lower_addr.len() {
            let (l, u) = (lower_addr[face], upper_addr[face]);
            let w_l = w[l];
            w[u] -= r_d[u] * upper[face] * w_l;
        }
        for face in (0..lower_addr.len()).rev() {
            let (l, u) = (lower_addr[face], upper_addr[face]);
            let w_u = w[u];
            w[l] -= r_d[l] * upper[face] * w_u;
        }
    }
}

pub(crate) fn new_dic<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduPreconditioner<T> + 'a>> {
    Ok(Box::new(DicPreconditioner::new(ctx.matrix)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::test_matrices::{convection, dense, laplacian};
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_reciprocal_d_of_line() {
        let m = laplacian(3, 2.0);
        let r_d = dic_reciprocal_d(&m).unwrap();
        // d0 = 2, d1 = 2 - 1/2, d2 = 2 - 1/1.5
        assert_relative_eq!(r_d[0], 0.5);
        assert_relative_eq!(r_d[1], 1.0 / 1.5);
        assert_relative_eq!(r_d[2], 1.0 / (2.0 - 1.0 / 1.5), epsilon = 1e-14);
    }

    #[test]
    fn test_exact_on_tree_topology() {
        // a chain has no fill-in, so the incomplete factorisation is exact
        let m = laplacian(5, 3.0);
        let p = DicPreconditioner::new(&m).unwrap();
        let b = array![1.0, 2.0, 0.0, -1.0, 4.0];
        let mut x = Array1::zeros(5);
        p.precondition(&mut x, &b);

        let a: Array2<f64> = dense(&m);
        let ax = a.dot(&x);
        for i in 0..5 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rejects_asymmetric() {
        let m = convection(3, 4.0);
        assert_eq!(
            DicPreconditioner::new(&m).unwrap_err(),
            LduError::NotSymmetric { operator: "DIC" }
        );
    }

    #[test]
    fn test_transpose_on_symmetric() {
        let m = laplacian(4, 4.0);
        let p = DicPreconditioner::new(&m).unwrap();
        let r = array![1.0, 0.0, 2.0, 1.0];
        let (mut w, mut wt) = (Array1::zeros(4), Array1::zeros(4));
        p.precondition(&mut w, &r);
        p.precondition_t(&mut wt, &r).unwrap();
        assert_eq!(w, wt);
    }
}
