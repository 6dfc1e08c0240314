//! Diagonal (Jacobi) preconditioner
//!
//! Scales the residual by the reciprocal of the matrix diagonal. The
//! operation is element-wise, so with the `rayon` feature it runs in
//! parallel for large systems.

use super::LduPreconditioner;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::matrix::LduMatrix;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Minimum system size for the parallel path
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 1000;

/// Diagonal (Jacobi) preconditioner
///
/// M = diag(A), so M^(-1) scales each component by 1/A_ii
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
    /// Reciprocal diagonal
    r_d: Array1<T>,
}

impl<'a, T: Scalar> DiagonalPreconditioner<'a, T> {
    /// Build from the matrix diagonal
    pub fn new(matrix: &'a LduMatrix<T>) -> Result<Self> {
        let r_d = matrix.diag()?.mapv(|d| d.recip());
        Ok(Self { matrix, r_d })
    }

    /// Reciprocal of the diagonal
    pub fn reciprocal_d(&self) -> &Array1<T> {
        &self.r_d
    }

    fn apply_sequential(&self, w: &mut Array1<T>, r: &Array1<T>) {
        ndarray::Zip::from(w)
            .and(&self.r_d)
            .and(r)
            .for_each(|wi, &di, &ri| *wi = di * ri);
    }

    #[cfg(feature = "rayon")]
    fn apply_parallel(&self, w: &mut Array1<T>, r: &Array1<T>) -> bool {
        let (Some(r_d), Some(r)) = (self.r_d.as_slice(), r.as_slice()) else {
            return false;
        };
        let Some(w) = w.as_slice_mut() else {
            return false;
        };
        w.par_iter_mut()
            .zip(r_d.par_iter().zip(r.par_iter()))
            .for_each(|(wi, (&di, &ri))| *wi = di * ri);
        true
    }
}

impl<T: Scalar> LduPreconditioner<T> for DiagonalPreconditioner<'_, T> {
    fn type_name(&self) -> &'static str {
        "diagonal"
    }

    fn matrix(&self) -> &LduMatrix<T> {
        self.matrix
    }

    fn precondition(&self, w: &mut Array1<T>, r: &Array1<T>) {
        #[cfg(feature = "rayon")]
        {
            if r.len() >= PARALLEL_THRESHOLD && self.apply_parallel(w, r) {
                return;
            }
        }
        self.apply_sequential(w, r)
    }

    fn precondition_t(&self, w: &mut Array1<T>, r: &Array1<T>) -> Result<()> {
        self.precondition(w, r);
        Ok(())
    }
}

pub(crate) fn new_diagonal<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn LduPreconditioner<T> + 'a>> {
    Ok(Box::new(DiagonalPreconditioner::new(ctx.matrix)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::test_matrices::convection;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_diagonal_preconditioner() {
        let mut m = convection(3, 1.0);
        m.set_diag(array![2.0, 4.0, 1.0]).unwrap();
        let p = DiagonalPreconditioner::new(&m).unwrap();

        let r = array![2.0, 8.0, 3.0];
        let mut w = Array1::zeros(3);
        p.precondition(&mut w, &r);

        assert_relative_eq!(w[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(w[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(w[2], 3.0, epsilon = 1e-10);

        // the transpose of a diagonal is itself, even for an asymmetric matrix
        let mut wt = Array1::zeros(3);
        p.precondition_t(&mut wt, &r).unwrap();
        assert_eq!(w, wt);
    }

    #[test]
    fn test_diagonal_large_system() {
        let n = 2500;
        let mut m = convection(n, 1.0);
        m.set_diag(Array1::from_shape_fn(n, |i| (i + 1) as f64)).unwrap();
        let p = DiagonalPreconditioner::new(&m).unwrap();

        let r = Array1::from_shape_fn(n, |i| (i + 1) as f64);
        let mut w = Array1::zeros(n);
        p.precondition(&mut w, &r);
        assert!(w.iter().all(|&wi| (wi - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_requires_diagonal() {
        let m = LduMatrix::<f64>::new(convection(3, 1.0).addressing_arc());
        assert!(DiagonalPreconditioner::new(&m).unwrap_err().is_allocation_error());
    }
}
