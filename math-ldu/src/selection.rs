//! Runtime selection of solvers, preconditioners and smoothers
//!
//! Each family has one table for symmetric and one for asymmetric matrices,
//! keyed by the type name used in solver dictionaries. A name registered in
//! only one table cannot be used with the other shape of matrix.
//!
//! # Example
//!
//! ```ignore
//! use math_ldu::{Dictionary, LduInterfaceFields, SelectionTables, SolverContext};
//!
//! let tables = SelectionTables::standard();
//! let dict = Dictionary::new("p")
//!     .with("solver", "PCG")
//!     .with("preconditioner", "DIC")
//!     .with("tolerance", 1e-8);
//! let interfaces = LduInterfaceFields::new();
//! let solver = SolverContext::new("p", &matrix, &interfaces, &dict, &tables).new_solver()?;
//! let performance = solver.solve(&mut psi, &source)?;
//! ```

use crate::dictionary::Dictionary;
use crate::error::{LduError, Result};
use crate::preconditioners::{self, LduPreconditioner};
use crate::smoothers::{self, LduSmoother};
use crate::solvers::{self, LduSolver, SolverContext};
use crate::traits::Scalar;
use std::collections::BTreeMap;

/// Builds a solver from its context
pub type SolverConstructor<T> =
    for<'a> fn(SolverContext<'a, T>) -> Result<Box<dyn LduSolver<T> + 'a>>;

/// Builds a preconditioner from the solver context and its coefficient dictionary
pub type PreconditionerConstructor<T> =
    for<'a> fn(&SolverContext<'a, T>, &Dictionary) -> Result<Box<dyn LduPreconditioner<T> + 'a>>;

/// Builds a smoother from the solver context and its coefficient dictionary
pub type SmootherConstructor<T> =
    for<'a> fn(&SolverContext<'a, T>, &Dictionary) -> Result<Box<dyn LduSmoother<T> + 'a>>;

/// Symmetric and asymmetric registries of one family
#[derive(Debug, Clone)]
struct Table<C> {
    kinds: [&'static str; 2],
    symmetric: BTreeMap<&'static str, C>,
    asymmetric: BTreeMap<&'static str, C>,
}

impl<C: Copy> Table<C> {
    fn new(symmetric_kind: &'static str, asymmetric_kind: &'static str) -> Self {
        Self {
            kinds: [symmetric_kind, asymmetric_kind],
            symmetric: BTreeMap::new(),
            asymmetric: BTreeMap::new(),
        }
    }

    fn side(&self, symmetric: bool) -> &BTreeMap<&'static str, C> {
        if symmetric { &self.symmetric } else { &self.asymmetric }
    }

    fn valid(&self, symmetric: bool) -> Vec<String> {
        self.side(symmetric).keys().map(|k| k.to_string()).collect()
    }

    fn lookup(&self, symmetric: bool, name: String) -> Result<C> {
        match self.side(symmetric).get(name.as_str()) {
            Some(&ctor) => {
                log::debug!("Selecting {} {name}", self.kind(symmetric));
                Ok(ctor)
            }
            None => Err(LduError::UnknownSelection {
                kind: self.kind(symmetric),
                name,
                valid: self.valid(symmetric),
            }),
        }
    }

    fn kind(&self, symmetric: bool) -> &'static str {
        self.kinds[usize::from(!symmetric)]
    }
}

/// Name to constructor registries for every selectable family.
#[derive(Debug, Clone)]
pub struct SelectionTables<T: Scalar> {
    solvers: Table<SolverConstructor<T>>,
    preconditioners: Table<PreconditionerConstructor<T>>,
    smoothers: Table<SmootherConstructor<T>>,
}

impl<T: Scalar> Default for SelectionTables<T> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<T: Scalar> SelectionTables<T> {
    /// Tables with nothing registered
    pub fn empty() -> Self {
        Self {
            solvers: Table::new("symmetric matrix solver", "asymmetric matrix solver"),
            preconditioners: Table::new(
                "symmetric matrix preconditioner",
                "asymmetric matrix preconditioner",
            ),
            smoothers: Table::new("symmetric matrix smoother", "asymmetric matrix smoother"),
        }
    }

    /// Tables holding every built-in type
    pub fn standard() -> Self {
        let mut tables = Self::empty();

        tables.add_symmetric_solver("PCG", solvers::new_pcg);
        tables.add_asymmetric_solver("PBiCG", solvers::new_pbicg);
        for (name, ctor) in [
            ("PBiCGStab", solvers::new_pbicgstab as SolverConstructor<T>),
            ("smoothSolver", solvers::new_smooth_solver),
            ("diagonal", solvers::new_diagonal_solver),
        ] {
            tables.add_symmetric_solver(name, ctor);
            tables.add_asymmetric_solver(name, ctor);
        }

        for (name, ctor) in [
            ("none", preconditioners::new_none as PreconditionerConstructor<T>),
            ("diagonal", preconditioners::new_diagonal),
            ("DILU", preconditioners::new_dilu),
        ] {
            tables.add_symmetric_preconditioner(name, ctor);
            tables.add_asymmetric_preconditioner(name, ctor);
        }
        tables.add_symmetric_preconditioner("DIC", preconditioners::new_dic);

        for (name, ctor) in [
            ("GaussSeidel", smoothers::new_gauss_seidel as SmootherConstructor<T>),
            ("symGaussSeidel", smoothers::new_sym_gauss_seidel),
            ("DILU", smoothers::new_dilu_smoother),
            ("DILUGaussSeidel", smoothers::new_dilu_gauss_seidel),
        ] {
            tables.add_symmetric_smoother(name, ctor);
            tables.add_asymmetric_smoother(name, ctor);
        }
        tables.add_symmetric_smoother("DIC", smoothers::new_dic_smoother);
        tables.add_symmetric_smoother("DICGaussSeidel", smoothers::new_dic_gauss_seidel);

        tables
    }

    pub fn add_symmetric_solver(&mut self, name: &'static str, ctor: SolverConstructor<T>) {
        self.solvers.symmetric.insert(name, ctor);
    }

    pub fn add_asymmetric_solver(&mut self, name: &'static str, ctor: SolverConstructor<T>) {
        self.solvers.asymmetric.insert(name, ctor);
    }

    pub fn add_symmetric_preconditioner(&mut self, name: &'static str, ctor: PreconditionerConstructor<T>) {
        self.preconditioners.symmetric.insert(name, ctor);
    }

    pub fn add_asymmetric_preconditioner(&mut self, name: &'static str, ctor: PreconditionerConstructor<T>) {
        self.preconditioners.asymmetric.insert(name, ctor);
    }

    pub fn add_symmetric_smoother(&mut self, name: &'static str, ctor: SmootherConstructor<T>) {
        self.smoothers.symmetric.insert(name, ctor);
    }

    pub fn add_asymmetric_smoother(&mut self, name: &'static str, ctor: SmootherConstructor<T>) {
        self.smoothers.asymmetric.insert(name, ctor);
    }

    /// Registered solver names for the given matrix shape, sorted
    pub fn solver_names(&self, symmetric: bool) -> Vec<String> {
        self.solvers.valid(symmetric)
    }

    /// Registered preconditioner names for the given matrix shape, sorted
    pub fn preconditioner_names(&self, symmetric: bool) -> Vec<String> {
        self.preconditioners.valid(symmetric)
    }

    /// Registered smoother names for the given matrix shape, sorted
    pub fn smoother_names(&self, symmetric: bool) -> Vec<String> {
        self.smoothers.valid(symmetric)
    }

    /// Construct the solver named by `solver` in the context dictionary.
    ///
    /// A diagonal matrix always gets the diagonal solver.
    pub fn new_solver<'a>(&self, ctx: SolverContext<'a, T>) -> Result<Box<dyn LduSolver<T> + 'a>> {
        let matrix = ctx.matrix;
        if matrix.diagonal() {
            return solvers::new_diagonal_solver(ctx);
        }

        let symmetric = shape(matrix.symmetric(), matrix.asymmetric())?;
        let name = ctx.dict.lookup::<String>("solver")?;
        let ctor = self.solvers.lookup(symmetric, name)?;
        ctor(ctx)
    }

    /// Construct the preconditioner named by `preconditioner` in the context dictionary.
    ///
    /// A missing entry selects `none`.
    pub fn new_preconditioner<'a>(
        &self,
        ctx: &SolverContext<'a, T>,
    ) -> Result<Box<dyn LduPreconditioner<T> + 'a>> {
        let (name, coeffs) = if ctx.dict.found("preconditioner") {
            ctx.dict.selection("preconditioner")?
        } else {
            ("none".to_string(), ctx.dict.clone())
        };

        let symmetric = shape(ctx.matrix.symmetric(), ctx.matrix.asymmetric())?;
        let ctor = self.preconditioners.lookup(symmetric, name)?;
        ctor(ctx, &coeffs)
    }

    /// Construct the smoother named by `smoother` in the context dictionary.
    pub fn new_smoother<'a>(&self, ctx: &SolverContext<'a, T>) -> Result<Box<dyn LduSmoother<T> + 'a>> {
        let (name, coeffs) = ctx.dict.selection("smoother")?;

        let symmetric = shape(ctx.matrix.symmetric(), ctx.matrix.asymmetric())?;
        let ctor = self.smoothers.lookup(symmetric, name)?;
        ctor(ctx, &coeffs)
    }
}

/// `true` for a symmetric matrix, `false` for an asymmetric one
fn shape(symmetric: bool, asymmetric: bool) -> Result<bool> {
    match (symmetric, asymmetric) {
        (true, _) => Ok(true),
        (_, true) => Ok(false),
        _ => Err(LduError::IncompatibleMatrices {
            reason: "matrix is neither symmetric nor asymmetric (no diagonal or no off-diagonal)"
                .to_string(),
        }),
    }
}
