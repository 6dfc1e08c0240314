//! Residual field diagnostics
//!
//! A [`ResidualFieldStore`] collects the residual vectors of selected fields
//! while they are being solved. Entries are opt-in: a field named `p` only
//! has its initial residual recorded if `initialResidual:p` was registered,
//! and its final residual if `residual:p` was registered.

use crate::traits::Scalar;
use ndarray::Array1;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Prefix of entries holding the residual before the first iteration
pub const INITIAL_RESIDUAL_PREFIX: &str = "initialResidual:";

/// Prefix of entries holding the residual at the end of a solve
pub const RESIDUAL_PREFIX: &str = "residual:";

/// Registry of residual fields written during solves.
///
/// Shared between matrices through an `Arc`; all methods take `&self`.
pub struct ResidualFieldStore<T: Scalar> {
    entries: Mutex<BTreeMap<String, Option<Array1<T>>>>,
    first_iteration: AtomicBool,
}

impl<T: Scalar> Default for ResidualFieldStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> ResidualFieldStore<T> {
    /// An empty store. Initial residuals are recorded until
    /// [`set_first_iteration`](Self::set_first_iteration) says otherwise.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            first_iteration: AtomicBool::new(true),
        }
    }

    /// Opt in to recording `name` (e.g. `"residual:p"`)
    pub fn register(&self, name: impl Into<String>) {
        self.lock().entry(name.into()).or_insert(None);
    }

    /// True if `name` was registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Whether the current solve is the first of the outer iteration
    pub fn set_first_iteration(&self, first: bool) {
        self.first_iteration.store(first, Ordering::Relaxed);
    }

    /// See [`set_first_iteration`](Self::set_first_iteration)
    pub fn first_iteration(&self) -> bool {
        self.first_iteration.load(Ordering::Relaxed)
    }

    /// Record the residual of `field_name`.
    ///
    /// Initial residuals go to `initialResidual:<field>` and are only kept
    /// on the first iteration; other residuals go to `residual:<field>`.
    /// Unregistered names are ignored.
    pub fn set_residual_field(&self, residual: &Array1<T>, field_name: &str, initial: bool) {
        if initial && !self.first_iteration() {
            return;
        }
        let prefix = if initial {
            INITIAL_RESIDUAL_PREFIX
        } else {
            RESIDUAL_PREFIX
        };
        let name = format!("{prefix}{field_name}");

        let mut entries = self.lock();
        if let Some(slot) = entries.get_mut(&name) {
            log::debug!("Writing residual field {name}");
            *slot = Some(residual.clone());
        }
    }

    /// The last residual recorded under `name`
    pub fn get(&self, name: &str) -> Option<Array1<T>> {
        self.lock().get(name).cloned().flatten()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Option<Array1<T>>>> {
        // entries are replaced whole, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Scalar> std::fmt::Debug for ResidualFieldStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidualFieldStore")
            .field("names", &self.names())
            .field("first_iteration", &self.first_iteration())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_only_registered_fields_are_written() {
        let store = ResidualFieldStore::<f64>::new();
        store.register("residual:p");

        store.set_residual_field(&array![1.0, 2.0], "p", false);
        store.set_residual_field(&array![3.0], "U", false);

        assert_eq!(store.get("residual:p"), Some(array![1.0, 2.0]));
        assert_eq!(store.get("residual:U"), None);
        assert!(!store.is_registered("residual:U"));
    }

    #[test]
    fn test_initial_residual_requires_first_iteration() {
        let store = ResidualFieldStore::<f64>::new();
        store.register("initialResidual:p");

        store.set_first_iteration(false);
        store.set_residual_field(&array![1.0], "p", true);
        assert_eq!(store.get("initialResidual:p"), None);

        store.set_first_iteration(true);
        store.set_residual_field(&array![2.0], "p", true);
        assert_eq!(store.get("initialResidual:p"), Some(array![2.0]));
    }

    #[test]
    fn test_names_sorted() {
        let store = ResidualFieldStore::<f64>::new();
        store.register("residual:p");
        store.register("initialResidual:p");
        assert_eq!(store.names(), vec!["initialResidual:p", "residual:p"]);
    }
}
