//! Core traits for LDU linear algebra
//!
//! This module defines the numeric abstractions used throughout the crate:
//! - [`Scalar`]: coefficient type of matrices and solution vectors (`f64`, `f32`)
//! - [`VectorSpace`]: multi-component quantities (residuals, tolerances, field
//!   values) that are compared and reduced component by component

use num_traits::{Float, FromPrimitive, NumAssign, ToPrimitive};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Trait for real scalar types used as matrix coefficients.
///
/// # Implementations
///
/// Provided for:
/// - `f64` (default for finite-volume systems)
/// - `f32` (for memory-constrained applications)
pub trait Scalar:
    Float
    + NumAssign
    + FromPrimitive
    + ToPrimitive
    + Sum
    + Send
    + Sync
    + Debug
    + Display
    + Default
    + Serialize
    + DeserializeOwned
    + VectorSpace<Cmpt = Self>
    + 'static
{
    /// Convert an `f64` constant, saturating to the nearest representable value
    #[inline]
    fn from_f64_lossy(v: f64) -> Self {
        Self::from_f64(v).unwrap_or_else(|| {
            if v.is_sign_negative() {
                Self::min_value()
            } else {
                Self::max_value()
            }
        })
    }

    /// Widen to `f64` for reductions and logging
    #[inline]
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl Scalar for f64 {}

impl Scalar for f32 {
    #[inline]
    fn from_f64_lossy(v: f64) -> Self {
        // a plain cast overflows finite values to infinity
        let r = v as f32;
        if r.is_infinite() && v.is_finite() {
            if v.is_sign_negative() {
                f32::MIN
            } else {
                f32::MAX
            }
        } else {
            r
        }
    }
}

/// A fixed-size, multi-component quantity of [`Scalar`] components.
///
/// Residuals, tolerances and solution values of vector fields are compared
/// component-wise: `a.all_lt(&b)` is true only if every component of `a` is
/// smaller than the matching component of `b`.
pub trait VectorSpace:
    Copy + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Component type
    type Cmpt: Scalar;

    /// Number of components
    const N_COMPONENTS: usize;

    /// Value of component `cmpt`
    fn component(&self, cmpt: usize) -> Self::Cmpt;

    /// Mutable access to component `cmpt`
    fn component_mut(&mut self, cmpt: usize) -> &mut Self::Cmpt;

    /// All components equal to `v`
    fn uniform(v: Self::Cmpt) -> Self;

    /// Zero in every component
    fn zero_value() -> Self {
        Self::uniform(<Self::Cmpt as num_traits::Zero>::zero())
    }

    /// Build a value from a component generator
    fn from_fn(mut f: impl FnMut(usize) -> Self::Cmpt) -> Self {
        let mut v = Self::zero_value();
        for cmpt in 0..Self::N_COMPONENTS {
            *v.component_mut(cmpt) = f(cmpt);
        }
        v
    }

    /// Component-wise maximum
    fn cmpt_max_with(&self, other: &Self) -> Self {
        Self::from_fn(|c| self.component(c).max(other.component(c)))
    }

    /// Component-wise product
    fn cmpt_multiply(&self, other: &Self) -> Self {
        Self::from_fn(|c| self.component(c) * other.component(c))
    }

    /// Largest component
    fn cmpt_max(&self) -> Self::Cmpt {
        (1..Self::N_COMPONENTS).fold(self.component(0), |m, c| m.max(self.component(c)))
    }

    /// Component-wise magnitude
    fn cmpt_mag(&self) -> Self {
        Self::from_fn(|c| self.component(c).abs())
    }

    /// True if every component is strictly less than the matching component of `other`
    fn all_lt(&self, other: &Self) -> bool {
        (0..Self::N_COMPONENTS).all(|c| self.component(c) < other.component(c))
    }

    /// True if every component is strictly greater than the matching component of `other`
    fn all_gt(&self, other: &Self) -> bool {
        (0..Self::N_COMPONENTS).all(|c| self.component(c) > other.component(c))
    }
}

macro_rules! scalar_vector_space {
    ($t:ty) => {
        impl VectorSpace for $t {
            type Cmpt = $t;
            const N_COMPONENTS: usize = 1;

            #[inline]
            fn component(&self, _cmpt: usize) -> $t {
                *self
            }

            #[inline]
            fn component_mut(&mut self, _cmpt: usize) -> &mut $t {
                self
            }

            #[inline]
            fn uniform(v: $t) -> Self {
                v
            }
        }
    };
}

scalar_vector_space!(f64);
scalar_vector_space!(f32);

impl<S, const N: usize> VectorSpace for [S; N]
where
    S: Scalar,
    [S; N]: Serialize + DeserializeOwned,
{
    type Cmpt = S;
    const N_COMPONENTS: usize = N;

    #[inline]
    fn component(&self, cmpt: usize) -> S {
        self[cmpt]
    }

    #[inline]
    fn component_mut(&mut self, cmpt: usize) -> &mut S {
        &mut self[cmpt]
    }

    #[inline]
    fn uniform(v: S) -> Self {
        [v; N]
    }
}

/// Three-component vector quantity (velocity, displacement, ...)
pub type Vector3 = [f64; 3];
