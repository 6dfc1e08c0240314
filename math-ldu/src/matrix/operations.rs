//! Products, row sums, algebra and under-relaxation of an [`LduMatrix`].

use super::LduMatrix;
use crate::error::{LduError, Result};
use crate::interfaces::{Coupling, LduInterfaceFields};
use crate::traits::Scalar;
use ndarray::{Array1, Zip};
use std::sync::Arc;

impl<T: Scalar> LduMatrix<T> {
    /// Matrix-vector product `ax = A * psi`, including interface coupling.
    pub fn amul(
        &self,
        ax: &mut Array1<T>,
        psi: &Array1<T>,
        interfaces: &LduInterfaceFields<T>,
    ) -> Result<()> {
        self.check_field("Amul result", ax)?;
        self.check_field("Amul psi", psi)?;
        interfaces.check_cells(self.size())?;
        let diag = self.diag()?;

        interfaces.init_matrix_interfaces(psi);

        Zip::from(&mut *ax)
            .and(diag)
            .and(psi)
            .for_each(|a, &d, &p| *a = d * p);

        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                ax[u[face]] += lower[face] * psi[l[face]];
                ax[l[face]] += upper[face] * psi[u[face]];
            }
        }

        interfaces.update_matrix_interfaces(Coupling::Boundary, psi, ax, false);
        Ok(())
    }

    /// Transposed product `tx = A^T * psi`, including interface coupling.
    pub fn tmul(
        &self,
        tx: &mut Array1<T>,
        psi: &Array1<T>,
        interfaces: &LduInterfaceFields<T>,
    ) -> Result<()> {
        self.check_field("Tmul result", tx)?;
        self.check_field("Tmul psi", psi)?;
        interfaces.check_cells(self.size())?;
        let diag = self.diag()?;

        interfaces.init_matrix_interfaces(psi);

        Zip::from(&mut *tx)
            .and(diag)
            .and(psi)
            .for_each(|t, &d, &p| *t = d * p);

        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                tx[u[face]] += upper[face] * psi[l[face]];
                tx[l[face]] += lower[face] * psi[u[face]];
            }
        }

        interfaces.update_matrix_interfaces(Coupling::Internal, psi, tx, false);
        Ok(())
    }

    /// Residual `r = source - A * psi`, including interface coupling.
    pub fn residual(
        &self,
        r: &mut Array1<T>,
        psi: &Array1<T>,
        source: &Array1<T>,
        interfaces: &LduInterfaceFields<T>,
    ) -> Result<()> {
        self.check_field("residual result", r)?;
        self.check_field("residual psi", psi)?;
        self.check_field("residual source", source)?;
        interfaces.check_cells(self.size())?;
        let diag = self.diag()?;

        interfaces.init_matrix_interfaces(psi);

        Zip::from(&mut *r)
            .and(source)
            .and(diag)
            .and(psi)
            .for_each(|ri, &b, &d, &p| *ri = b - d * p);

        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                r[u[face]] -= lower[face] * psi[l[face]];
                r[l[face]] -= upper[face] * psi[u[face]];
            }
        }

        interfaces.update_matrix_interfaces(Coupling::Boundary, psi, r, true);
        Ok(())
    }

    /// Residual as a new array
    pub fn residual_of(
        &self,
        psi: &Array1<T>,
        source: &Array1<T>,
        interfaces: &LduInterfaceFields<T>,
    ) -> Result<Array1<T>> {
        let mut r = Array1::zeros(self.size());
        self.residual(&mut r, psi, source, interfaces)?;
        Ok(r)
    }

    /// Row sums of `A`, including coupled contributions
    pub fn sum_a(&self, sum_a: &mut Array1<T>, interfaces: &LduInterfaceFields<T>) -> Result<()> {
        self.check_field("sumA", sum_a)?;
        interfaces.check_cells(self.size())?;
        sum_a.assign(self.diag()?);

        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                sum_a[u[face]] += lower[face];
                sum_a[l[face]] += upper[face];
            }
        }

        for patch in interfaces.iter() {
            let coeffs = patch.coeffs(Coupling::Boundary);
            for (&fc, &c) in patch.field().face_cells().iter().zip(coeffs) {
                sum_a[fc] -= c;
            }
        }
        Ok(())
    }

    /// Add the off-diagonal coefficients of each row to the diagonal
    pub fn sum_diag(&mut self) {
        self.fold_off_diag_into_diag(T::one());
    }

    /// Subtract the off-diagonal coefficients of each row from the diagonal
    pub fn neg_sum_diag(&mut self) {
        self.fold_off_diag_into_diag(-T::one());
    }

    fn fold_off_diag_into_diag(&mut self, sign: T) {
        let Some((lower, upper)) = self.off_diag() else {
            return;
        };
        let l = self.addressing.lower_addr();
        let u = self.addressing.upper_addr();
        let mut delta = Array1::<T>::zeros(self.size());
        for face in 0..l.len() {
            delta[l[face]] += upper[face];
            delta[u[face]] += lower[face];
        }
        Zip::from(self.diag_mut())
            .and(&delta)
            .for_each(|d, &dd| *d += sign * dd);
    }

    /// Sum of off-diagonal coefficient magnitudes per row, added to `sum_off`
    pub fn sum_mag_off_diag(&self, sum_off: &mut Array1<T>) -> Result<()> {
        self.check_field("sumMagOffDiag", sum_off)?;
        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                sum_off[u[face]] += lower[face].abs();
                sum_off[l[face]] += upper[face].abs();
            }
        }
        Ok(())
    }

    /// `H(psi) = -(sum of off-diagonal row terms)`, the explicit neighbour part
    pub fn h_operator(&self, psi: &Array1<T>) -> Result<Array1<T>> {
        self.check_field("H psi", psi)?;
        let mut h = Array1::zeros(self.size());
        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                h[u[face]] -= lower[face] * psi[l[face]];
                h[l[face]] -= upper[face] * psi[u[face]];
            }
        }
        Ok(h)
    }

    /// `H1 = -(sum of off-diagonal row coefficients)`
    pub fn h1(&self) -> Array1<T> {
        let mut h1 = Array1::zeros(self.size());
        if let Some((lower, upper)) = self.off_diag() {
            let l = self.addressing.lower_addr();
            let u = self.addressing.upper_addr();
            for face in 0..l.len() {
                h1[u[face]] -= lower[face];
                h1[l[face]] -= upper[face];
            }
        }
        h1
    }

    /// `self += other`, preserving symmetry where both operands are symmetric
    pub fn add_matrix(&mut self, other: &LduMatrix<T>) -> Result<()> {
        self.combine(other, T::one())
    }

    /// `self -= other`
    pub fn sub_matrix(&mut self, other: &LduMatrix<T>) -> Result<()> {
        self.combine(other, -T::one())
    }

    fn combine(&mut self, other: &LduMatrix<T>, sign: T) -> Result<()> {
        if !Arc::ptr_eq(&self.addressing, &other.addressing)
            && self.addressing != other.addressing
        {
            return Err(LduError::IncompatibleMatrices {
                reason: "matrices are built on different addressing".to_string(),
            });
        }

        let axpy = |dst: &mut Array1<T>, src: &Array1<T>| {
            Zip::from(dst).and(src).for_each(|d, &s| *d += sign * s);
        };

        if let Some(diag) = &other.diag {
            axpy(self.diag_mut(), diag);
        }

        if let Some((other_lower, other_upper)) = other.off_diag() {
            // materialise the lower side before the upper side changes
            let needs_lower = other.has_lower() || self.has_lower();
            if needs_lower {
                self.lower_mut();
            }
            axpy(self.upper_mut(), other_upper);
            if needs_lower {
                axpy(self.lower_mut(), other_lower);
            }
        }

        if let Some(source) = &other.source {
            axpy(self.source_mut(), source);
        }
        Ok(())
    }

    /// Multiply every allocated array (coefficients and source) by `s`
    pub fn scale(&mut self, s: T) {
        for array in [
            &mut self.diag,
            &mut self.lower,
            &mut self.upper,
            &mut self.source,
        ]
        .into_iter()
        .flatten()
        {
            array.mapv_inplace(|v| v * s);
        }
    }

    /// Negate every allocated array
    pub fn negate(&mut self) {
        self.scale(-T::one());
    }

    /// Under-relax the assembled system against the previous solution.
    ///
    /// The diagonal is made at least as large as the sum of off-diagonal
    /// magnitudes (coupled patches included), divided by `alpha`, and the
    /// source compensated with `(D_new - D_old) * psi_prev`. The solution of
    /// the relaxed system therefore coincides with that of the original one
    /// when `psi_prev` is already converged. Call once per assembly.
    pub fn relax(
        &mut self,
        psi_prev: &Array1<T>,
        alpha: T,
        interfaces: &LduInterfaceFields<T>,
    ) -> Result<()> {
        if !(alpha > T::zero() && alpha <= T::one()) {
            return Err(LduError::InvalidRelaxation {
                alpha: alpha.to_f64_lossy(),
            });
        }
        self.check_field("relax psi", psi_prev)?;
        interfaces.check_cells(self.size())?;

        let d0 = self.diag()?.clone();

        let mut sum_off = Array1::zeros(self.size());
        self.sum_mag_off_diag(&mut sum_off)?;
        for patch in interfaces.iter() {
            let coeffs = patch.coeffs(Coupling::Boundary);
            for (&fc, &c) in patch.field().face_cells().iter().zip(coeffs) {
                sum_off[fc] += c.abs();
            }
        }

        let diag = self.diag_mut();
        Zip::from(&mut *diag)
            .and(&sum_off)
            .for_each(|d, &s| *d = d.abs().max(s) / alpha);
        let d_new = diag.clone();

        Zip::from(self.source_mut())
            .and(&d_new)
            .and(&d0)
            .and(psi_prev)
            .for_each(|b, &dn, &d_old, &p| *b += (dn - d_old) * p);

        log::debug!("relaxed matrix of {} cells with factor {}", self.size(), alpha);
        Ok(())
    }
}
