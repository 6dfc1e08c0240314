//! LDU sparse matrix container
//!
//! The matrix stores up to four optional arrays against a shared
//! [`LduAddressing`]:
//! - `diag[size]`: diagonal coefficients
//! - `upper[n_faces]`: coefficient of `x[upper_addr[f]]` in row `lower_addr[f]`
//! - `lower[n_faces]`: coefficient of `x[lower_addr[f]]` in row `upper_addr[f]`
//! - `source[size]`: right-hand side
//!
//! Arrays are allocated on first mutable access. A matrix with only one
//! off-diagonal side allocated is symmetric: reading the other side returns
//! the allocated one, and the first mutable access to the missing side gives
//! it an independent copy.

mod operations;
mod stream;

use crate::addressing::LduAddressing;
use crate::error::{LduError, Result};
use crate::residuals::ResidualFieldStore;
use crate::traits::Scalar;
use ndarray::Array1;
use std::sync::Arc;

/// Off-diagonal side of the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Coefficients below the diagonal (row = upper cell)
    Lower,
    /// Coefficients above the diagonal (row = lower cell)
    Upper,
}

impl Side {
    /// The opposite side
    pub fn other(self) -> Self {
        match self {
            Side::Lower => Side::Upper,
            Side::Upper => Side::Lower,
        }
    }
}

/// Storage state of an off-diagonal side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoeffState {
    /// Neither this side nor its sibling is allocated
    Unallocated,
    /// Not allocated; reads resolve to the sibling side
    AliasedTo(Side),
    /// Independent storage
    Owned,
}

/// Face-addressed sparse matrix with optional right-hand side.
#[derive(Debug, Clone)]
pub struct LduMatrix<T: Scalar> {
    addressing: Arc<LduAddressing>,
    diag: Option<Array1<T>>,
    lower: Option<Array1<T>>,
    upper: Option<Array1<T>>,
    source: Option<Array1<T>>,
    residual_store: Option<Arc<ResidualFieldStore<T>>>,
}

impl<T: Scalar> LduMatrix<T> {
    /// An empty matrix on the given addressing
    pub fn new(addressing: Arc<LduAddressing>) -> Self {
        Self {
            addressing,
            diag: None,
            lower: None,
            upper: None,
            source: None,
            residual_store: None,
        }
    }

    /// Take over the storage of `other`, leaving every slot of `other` unallocated.
    ///
    /// Used when a temporary matrix is about to be discarded and its arrays
    /// can be repurposed instead of copied.
    pub fn reuse(other: &mut Self) -> Self {
        Self {
            addressing: Arc::clone(&other.addressing),
            diag: other.diag.take(),
            lower: other.lower.take(),
            upper: other.upper.take(),
            source: other.source.take(),
            residual_store: other.residual_store.clone(),
        }
    }

    /// The addressing
    #[inline]
    pub fn addressing(&self) -> &LduAddressing {
        &self.addressing
    }

    /// Shared handle to the addressing
    pub fn addressing_arc(&self) -> Arc<LduAddressing> {
        Arc::clone(&self.addressing)
    }

    /// Number of unknowns
    #[inline]
    pub fn size(&self) -> usize {
        self.addressing.size()
    }

    /// Number of internal faces
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.addressing.n_faces()
    }

    /// True if the diagonal is allocated
    pub fn has_diag(&self) -> bool {
        self.diag.is_some()
    }

    /// True if the upper coefficients are physically allocated
    pub fn has_upper(&self) -> bool {
        self.upper.is_some()
    }

    /// True if the lower coefficients are physically allocated
    pub fn has_lower(&self) -> bool {
        self.lower.is_some()
    }

    /// True if the source is allocated
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Diagonal only
    pub fn diagonal(&self) -> bool {
        self.has_diag() && !self.has_lower() && !self.has_upper()
    }

    /// Diagonal and exactly one off-diagonal side, which the other aliases
    pub fn symmetric(&self) -> bool {
        self.has_diag() && (self.has_lower() != self.has_upper())
    }

    /// Diagonal, lower and upper all allocated
    pub fn asymmetric(&self) -> bool {
        self.has_diag() && self.has_lower() && self.has_upper()
    }

    /// Storage state of one off-diagonal side
    pub fn coeff_state(&self, side: Side) -> CoeffState {
        let (this, sibling) = match side {
            Side::Lower => (&self.lower, &self.upper),
            Side::Upper => (&self.upper, &self.lower),
        };
        match (this, sibling) {
            (Some(_), _) => CoeffState::Owned,
            (None, Some(_)) => CoeffState::AliasedTo(side.other()),
            (None, None) => CoeffState::Unallocated,
        }
    }

    /// Diagonal coefficients
    pub fn diag(&self) -> Result<&Array1<T>> {
        self.diag
            .as_ref()
            .ok_or(LduError::Unallocated { array: "diag" })
    }

    /// Upper coefficients, resolving to the lower ones for a lower-only matrix
    pub fn upper(&self) -> Result<&Array1<T>> {
        self.upper_ref()
            .ok_or(LduError::Unallocated { array: "upper" })
    }

    /// Lower coefficients, resolving to the upper ones for a symmetric matrix
    pub fn lower(&self) -> Result<&Array1<T>> {
        self.lower_ref()
            .ok_or(LduError::Unallocated { array: "lower" })
    }

    /// Right-hand side
    pub fn source(&self) -> Result<&Array1<T>> {
        self.source
            .as_ref()
            .ok_or(LduError::Unallocated { array: "source" })
    }

    #[inline]
    pub(crate) fn upper_ref(&self) -> Option<&Array1<T>> {
        self.upper.as_ref().or(self.lower.as_ref())
    }

    #[inline]
    pub(crate) fn lower_ref(&self) -> Option<&Array1<T>> {
        self.lower.as_ref().or(self.upper.as_ref())
    }

    /// Both off-diagonal sides, or `None` for a matrix without off-diagonals
    #[inline]
    pub(crate) fn off_diag(&self) -> Option<(&Array1<T>, &Array1<T>)> {
        Some((self.lower_ref()?, self.upper_ref()?))
    }

    /// Diagonal, allocated to zero on first access
    pub fn diag_mut(&mut self) -> &mut Array1<T> {
        let n = self.size();
        self.diag.get_or_insert_with(|| Array1::zeros(n))
    }

    /// Upper coefficients, allocated on first access.
    ///
    /// If only the lower side exists, the upper side becomes an independent
    /// copy of it.
    pub fn upper_mut(&mut self) -> &mut Array1<T> {
        let n = self.n_faces();
        let lower = &self.lower;
        self.upper
            .get_or_insert_with(|| lower.clone().unwrap_or_else(|| Array1::zeros(n)))
    }

    /// Lower coefficients, allocated on first access.
    ///
    /// If only the upper side exists, the lower side becomes an independent
    /// copy of it.
    pub fn lower_mut(&mut self) -> &mut Array1<T> {
        let n = self.n_faces();
        let upper = &self.upper;
        self.lower
            .get_or_insert_with(|| upper.clone().unwrap_or_else(|| Array1::zeros(n)))
    }

    /// Right-hand side, allocated to zero on first access
    pub fn source_mut(&mut self) -> &mut Array1<T> {
        let n = self.size();
        self.source.get_or_insert_with(|| Array1::zeros(n))
    }

    /// Replace the diagonal
    pub fn set_diag(&mut self, diag: Array1<T>) -> Result<()> {
        LduError::check_len("diag", self.size(), diag.len())?;
        self.diag = Some(diag);
        Ok(())
    }

    /// Replace the upper coefficients
    pub fn set_upper(&mut self, upper: Array1<T>) -> Result<()> {
        LduError::check_len("upper", self.n_faces(), upper.len())?;
        self.upper = Some(upper);
        Ok(())
    }

    /// Replace the lower coefficients
    pub fn set_lower(&mut self, lower: Array1<T>) -> Result<()> {
        LduError::check_len("lower", self.n_faces(), lower.len())?;
        self.lower = Some(lower);
        Ok(())
    }

    /// Replace the right-hand side
    pub fn set_source(&mut self, source: Array1<T>) -> Result<()> {
        LduError::check_len("source", self.size(), source.len())?;
        self.source = Some(source);
        Ok(())
    }

    /// Attach a diagnostics store receiving residual fields during solves
    pub fn attach_residual_store(&mut self, store: Arc<ResidualFieldStore<T>>) {
        self.residual_store = Some(store);
    }

    /// The attached diagnostics store, if any
    pub fn residual_store(&self) -> Option<&ResidualFieldStore<T>> {
        self.residual_store.as_deref()
    }

    /// Record `residual` into the attached diagnostics store.
    ///
    /// Does nothing without a store. See [`ResidualFieldStore::set_residual_field`].
    pub fn set_residual_field(&self, residual: &Array1<T>, field_name: &str, initial: bool) {
        if let Some(store) = &self.residual_store {
            store.set_residual_field(residual, field_name, initial);
        }
    }

    pub(crate) fn check_field(&self, what: &str, field: &Array1<T>) -> Result<()> {
        LduError::check_len(what, self.size(), field.len())
    }
}
