//! Solver control dictionaries
//!
//! Solver settings are read from a JSON object, e.g.
//!
//! ```json
//! {
//!     "solver": "PCG",
//!     "preconditioner": "DIC",
//!     "tolerance": 1e-6,
//!     "relTol": 0.01,
//!     "maxIter": 200
//! }
//! ```
//!
//! A preconditioner or smoother entry may be a plain word or a
//! sub-dictionary naming the type under the same keyword:
//! `"preconditioner": { "preconditioner": "DIC" }`.

use crate::error::{LduError, Result};
use crate::performance::VSMALL;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A named JSON object of solver settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dictionary {
    #[serde(skip)]
    name: String,
    #[serde(flatten)]
    entries: Map<String, Value>,
}

impl Dictionary {
    /// An empty dictionary
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Map::new(),
        }
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self> {
        let name = name.into();
        match value {
            Value::Object(entries) => Ok(Self { name, entries }),
            other => Err(LduError::InvalidKeyword {
                keyword: name.clone(),
                dictionary: name,
                reason: format!("expected a dictionary, found {other}"),
            }),
        }
    }

    /// Parse a JSON string
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let name = name.into();
        let value = serde_json::from_str(json).map_err(|e| LduError::InvalidKeyword {
            keyword: name.clone(),
            dictionary: name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_value(name, value)
    }

    /// Load a JSON file; the dictionary is named after the file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| LduError::InvalidKeyword {
            keyword: name.clone(),
            dictionary: name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json(name, &content)
    }

    /// Builder-style insertion
    pub fn with(mut self, keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(keyword, value);
        self
    }

    /// Insert or overwrite an entry
    pub fn set(&mut self, keyword: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(keyword.into(), value.into());
    }

    /// Dictionary name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if `keyword` is present
    pub fn found(&self, keyword: &str) -> bool {
        self.entries.contains_key(keyword)
    }

    /// Raw entry
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.entries.get(keyword)
    }

    /// Mandatory typed entry
    pub fn lookup<T: DeserializeOwned>(&self, keyword: &str) -> Result<T> {
        let value = self.get(keyword).ok_or_else(|| LduError::MissingKeyword {
            keyword: keyword.to_string(),
            dictionary: self.name.clone(),
        })?;
        self.convert(keyword, value)
    }

    /// Optional typed entry with a default
    pub fn lookup_or_default<T: DeserializeOwned>(&self, keyword: &str, default: T) -> Result<T> {
        match self.get(keyword) {
            Some(value) => self.convert(keyword, value),
            None => Ok(default),
        }
    }

    /// Mandatory sub-dictionary
    pub fn sub_dict(&self, keyword: &str) -> Result<Dictionary> {
        let value = self.lookup::<Value>(keyword)?;
        Self::from_value(format!("{}.{keyword}", self.name), value)
    }

    /// Type name of a selectable entry together with its coefficient dictionary.
    ///
    /// A word selects the type and leaves `self` as the coefficients; a
    /// sub-dictionary must contain `keyword` and becomes the coefficients.
    pub fn selection(&self, keyword: &str) -> Result<(String, Dictionary)> {
        match self.get(keyword) {
            None => Err(LduError::MissingKeyword {
                keyword: keyword.to_string(),
                dictionary: self.name.clone(),
            }),
            Some(Value::String(word)) => Ok((word.clone(), self.clone())),
            Some(Value::Object(_)) => {
                let coeffs = self.sub_dict(keyword)?;
                let word = coeffs.lookup::<String>(keyword)?;
                Ok((word, coeffs))
            }
            Some(other) => Err(LduError::InvalidKeyword {
                keyword: keyword.to_string(),
                dictionary: self.name.clone(),
                reason: format!("expected a word or a dictionary, found {other}"),
            }),
        }
    }

    fn convert<T: DeserializeOwned>(&self, keyword: &str, value: &Value) -> Result<T> {
        T::deserialize(value).map_err(|e| LduError::InvalidKeyword {
            keyword: keyword.to_string(),
            dictionary: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// Iteration controls shared by every solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverControls {
    /// Absolute residual tolerance (`tolerance`)
    pub tolerance: f64,
    /// Residual reduction relative to the initial residual (`relTol`)
    pub rel_tol: f64,
    /// Iteration cap (`maxIter`)
    pub max_iter: usize,
    /// Iterations performed regardless of convergence (`minIter`)
    pub min_iter: usize,
    /// Verbosity: 0 silent, 1 summary, 2 every iteration (`log`)
    pub log_level: u32,
    /// Pivot magnitude below which a solve is flagged singular (`singularityThreshold`)
    pub singularity_threshold: f64,
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            rel_tol: 0.0,
            max_iter: 1000,
            min_iter: 0,
            log_level: 1,
            singularity_threshold: VSMALL,
        }
    }
}

impl SolverControls {
    /// Read the controls from a solver dictionary, defaulting absent keys
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let defaults = Self::default();
        let controls = Self {
            tolerance: dict.lookup_or_default("tolerance", defaults.tolerance)?,
            rel_tol: dict.lookup_or_default("relTol", defaults.rel_tol)?,
            max_iter: dict.lookup_or_default("maxIter", defaults.max_iter)?,
            min_iter: dict.lookup_or_default("minIter", defaults.min_iter)?,
            log_level: dict.lookup_or_default("log", defaults.log_level)?,
            singularity_threshold: dict
                .lookup_or_default("singularityThreshold", defaults.singularity_threshold)?,
        };

        for (keyword, value) in [
            ("tolerance", controls.tolerance),
            ("relTol", controls.rel_tol),
            ("singularityThreshold", controls.singularity_threshold),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(LduError::InvalidKeyword {
                    keyword: keyword.to_string(),
                    dictionary: dict.name().to_string(),
                    reason: format!("must be non-negative, found {value}"),
                });
            }
        }
        Ok(controls)
    }
}
