//! Diagonal incomplete LU preconditioner
//!
//! Generalises DIC to asymmetric matrices: `M = (D + L) D^-1 (D + U)` with
//! independent `L` and `U`. Only the diagonal is modified during the
//! factorisation.

use super::LduPreconditioner;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::matrix::LduMatrix;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// Reciprocal of the DILU-modified diagonal.
pub fn dilu_reciprocal_d<T: Scalar>(matrix: &LduMatrix<T>) -> Result<Array1<T>> {
    let mut r_d = matrix.diag()?.clone();

    if let Some((lower, upper)) = matrix.off_diag() {
        let addr = matrix.addressing();
        for (face, (&l, &u)) in addr.lower_addr().iter().zip(addr.upper_addr()).enumerate() {
            let d_l = r_d[l];
            r_d[u] -= upper[face] * lower[face] / d_l;
        }
    }

    r_d.mapv_inplace(|d| d.recip());
    Ok(r_d)
}

/// Diagonal incomplete LU preconditioner
#[derive(Debug, Clone)]
pub struct DiluPreconditioner<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
    r_d: Array1<T>,
}

impl<'a, T: Scalar> DiluPreconditioner<'a, T> {
    /// Factorise the matrix
    pub fn new(matrix: &'a LduMatrix<T>) -> Result<Self> {
        let r_d = dilu_reciprocal_d(matrix)?;
        Ok(Self { matrix, r_d })
    }

    /// Reciprocal of the factorised diagonal
    pub fn reciprocal_d(&self) -> &Array1<T> {
        &self.r_d
    }

    /// Forward sweep with `forward` coefficients, backward with `backward`
    fn substitute(&self, w: &mut Array1<T>, forward: &Array1<T>, backward: &Array1<T>) {
        let r_d = &self.r_d;
        let addr = self.matrix.addressing();
        let (lower_addr, upper_addr) = (addr.lower_addr(), addr.upper_addr());

        for face in 0..lower_addr.len() {
            let (l, u) = (lower_addr[face], upper_addr[face]);
            let w_l = w[l];
            w[u] -= r_d[u] * forward[face] * w_l;
        }
        for face in (0..lower_addr.len()).rev() {
            let (l, u) = (lower_addr[face], upper_addr[face]);
            let w_u = w[u];
            w[l] -= r_d[l] * backward[face] * w_u;
        }
    }

    fn scale(&self, w: &mut Array1<T>, r: &Array1<T>) {
        ndarray::Zip::from(w)
            .and(&self.r_d)
            .and(r)
            .for_each(|wi, &di, &ri| *wi = di * ri);
    }
}

impl<T: Scalar> LduPreconditioner<T> for DiluPreconditioner<'_, T> {
    fn type_name(&self) -> &'static str {
        "DILU"
    }

    fn matrix(&self) -> &LduMatrix<T> {
        self.matrix
    }

    fn precondition(&self, w: &mut Array1<T>, r: &Array1<T>) {
        self.scale(w, r);
        if let Some((lower, upper)) = self.matrix.off_diag() {
            self.substitute(w, lower, upper);
        }
    }

    fn precondition_t(&self, w: &mut Array1<T>, r: &Array1<T>) -> Result<()> {
        self.scale(w, r);
        if let Some((lower, upper)) = self.matrix.off_diag() {
            self.substitute(w, upper, lower);
        }
        Ok(())
    }
}

pub(crate) fn new_dilu<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduPreconditioner<T> + 'a>> {
    Ok(Box::new(DiluPreconditioner::new(ctx.matrix)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::dic_reciprocal_d;
    use crate::preconditioners::test_matrices::{convection, dense, laplacian};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_matches_dic_on_symmetric() {
        let m = laplacian(6, 3.0);
        let dilu = dilu_reciprocal_d(&m).unwrap();
        let dic = dic_reciprocal_d(&m).unwrap();
        for i in 0..6 {
            assert_relative_eq!(dilu[i], dic[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_exact_on_chain() {
        let m = convection(5, 4.0);
        let p = DiluPreconditioner::new(&m).unwrap();
        let b = array![1.0, -1.0, 2.0, 0.5, 3.0];
        let a = dense(&m);

        let mut x = Array1::zeros(5);
        p.precondition(&mut x, &b);
        let ax = a.dot(&x);
        for i in 0..5 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-12);
        }

        let mut xt = Array1::zeros(5);
        p.precondition_t(&mut xt, &b).unwrap();
        let atx = a.t().dot(&xt);
        for i in 0..5 {
            assert_relative_eq!(atx[i], b[i], epsilon = 1e-12);
        }
    }
}
