//! Gauss-Seidel smoothers over the owner-start addressing
//!
//! Cells are visited in increasing order. For cell `c` the upper-triangle
//! contributions come straight from `psi`, while the lower-triangle ones
//! were already folded into the working source `b'` when the owners of `c`
//! were updated.

use super::LduSmoother;
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::interfaces::{Coupling, LduInterfaceFields};
use crate::matrix::LduMatrix;
use crate::solvers::SolverContext;
use crate::traits::Scalar;
use ndarray::Array1;

/// Gauss-Seidel, optionally symmetric (forward + backward) sweeps
#[derive(Debug)]
pub struct GaussSeidelSmoother<'a, T: Scalar> {
    matrix: &'a LduMatrix<T>,
    interfaces: &'a LduInterfaceFields<T>,
    symmetric: bool,
}

impl<'a, T: Scalar> GaussSeidelSmoother<'a, T> {
    /// Forward sweeps only
    pub fn new(matrix: &'a LduMatrix<T>, interfaces: &'a LduInterfaceFields<T>) -> Result<Self> {
        matrix.diag()?;
        interfaces.check_cells(matrix.size())?;
        Ok(Self {
            matrix,
            interfaces,
            symmetric: false,
        })
    }

    /// Forward then backward sweeps
    pub fn symmetric(
        matrix: &'a LduMatrix<T>,
        interfaces: &'a LduInterfaceFields<T>,
    ) -> Result<Self> {
        Ok(Self {
            symmetric: true,
            ..Self::new(matrix, interfaces)?
        })
    }

    fn sweep(&self, psi: &mut Array1<T>, b_prime: &mut Array1<T>) -> Result<()> {
        let diag = self.matrix.diag()?;
        let addr = self.matrix.addressing();
        let upper_addr = addr.upper_addr();
        let n = addr.size();

        let Some((lower, upper)) = self.matrix.off_diag() else {
            for cell in 0..n {
                psi[cell] = b_prime[cell] / diag[cell];
            }
            return Ok(());
        };

        for cell in 0..n {
            let faces = addr.owned_faces(cell);
            let mut psii = b_prime[cell];
            for face in faces.clone() {
                psii -= upper[face] * psi[upper_addr[face]];
            }
            psii /= diag[cell];
            for face in faces {
                b_prime[upper_addr[face]] -= lower[face] * psii;
            }
            psi[cell] = psii;
        }

        if self.symmetric {
            // b' now holds the lower contributions of the forward sweep
            for cell in (0..n).rev() {
                let mut psii = b_prime[cell];
                for face in addr.owned_faces(cell) {
                    psii -= upper[face] * psi[upper_addr[face]];
                }
                psi[cell] = psii / diag[cell];
            }
        }
        Ok(())
    }
}

impl<T: Scalar> LduSmoother<T> for GaussSeidelSmoother<'_, T> {
    fn type_name(&self) -> &'static str {
        if self.symmetric {
            "symGaussSeidel"
        } else {
            "GaussSeidel"
        }
    }

    fn smooth(&self, psi: &mut Array1<T>, source: &Array1<T>, n_sweeps: usize) -> Result<()> {
        self.matrix.check_field("smoother psi", psi)?;
        self.matrix.check_field("smoother source", source)?;

        let mut b_prime = source.clone();
        for _ in 0..n_sweeps {
            b_prime.assign(source);
            // coupled neighbours act as an explicit source
            self.interfaces.apply(Coupling::Boundary, psi, &mut b_prime, true);
            self.sweep(psi, &mut b_prime)?;
        }
        Ok(())
    }
}

pub(crate) fn new_gauss_seidel<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn super::LduSmoother<T> + 'a>> {
    Ok(Box::new(GaussSeidelSmoother::new(ctx.matrix, ctx.interfaces)?))
}

pub(crate) fn new_sym_gauss_seidel<'a, T: Scalar>(
    ctx: &SolverContext<'a, T>,
    _coeffs: &Dictionary,
) -> Result<Box<dyn super::LduSmoother<T> + 'a>> {
    Ok(Box::new(GaussSeidelSmoother::symmetric(ctx.matrix, ctx.interfaces)?))
}
