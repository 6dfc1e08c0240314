//! Face-addressed sparse matrices and iterative solvers for finite-volume systems
//!
//! A finite-volume discretisation on an unstructured mesh produces one
//! unknown per cell and one off-diagonal coefficient pair per internal face.
//! This crate stores such systems in LDU form (diagonal, upper and lower
//! coefficient arrays addressed by face) and solves them with
//! runtime-selected Krylov solvers, preconditioners and smoothers.
//!
//! # Features
//!
//! - **LDU storage**: [`LduMatrix`] over shared [`LduAddressing`], with
//!   symmetric matrices storing one off-diagonal array
//! - **Coupled interfaces**: periodic and processor-like couplings folded into
//!   every product, residual and smoother sweep
//! - **Solvers**: PCG, PBiCG, PBiCGStab, smoothSolver, diagonal
//! - **Preconditioners**: none, diagonal, DIC, DILU
//! - **Smoothers**: GaussSeidel, symGaussSeidel, DIC, DILU, DICGaussSeidel, DILUGaussSeidel
//! - **Performance records**: [`SolverPerformance`] with component-wise
//!   convergence for vector fields
//! - **Partitioned solves**: global reductions through a [`Communicator`],
//!   with an MPI implementation behind the `mpi` feature
//!
//! # Example
//!
//! ```ignore
//! use math_ldu::{Dictionary, LduAddressing, LduInterfaceFields, LduMatrix, SelectionTables, SolverContext};
//! use ndarray::Array1;
//! use std::sync::Arc;
//!
//! // three cells in a row
//! let addressing = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2])?);
//! let mut matrix = LduMatrix::new(addressing);
//! matrix.set_diag(Array1::from_elem(3, 2.0))?;
//! matrix.set_upper(Array1::from_elem(2, -1.0))?;
//!
//! let dict = Dictionary::from_json("p", r#"{"solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-8}"#)?;
//! let tables = SelectionTables::standard();
//! let interfaces = LduInterfaceFields::new();
//!
//! let mut psi = Array1::zeros(3);
//! let source = Array1::from_elem(3, 1.0);
//! let performance = math_ldu::solve(
//!     SolverContext::new("p", &matrix, &interfaces, &dict, &tables),
//!     &mut psi,
//!     &source,
//! )?;
//! assert!(performance.converged);
//! ```

pub mod addressing;
pub mod dictionary;
pub mod error;
pub mod interfaces;
pub mod matrix;
#[cfg(feature = "mpi")]
pub mod mpi;
pub mod parallel;
pub mod performance;
pub mod preconditioners;
pub mod residuals;
pub mod selection;
pub mod smoothers;
pub mod solvers;
pub mod traits;

// Re-export main types
pub use addressing::LduAddressing;
pub use dictionary::{Dictionary, SolverControls};
pub use error::{LduError, Result};
pub use interfaces::{CoupledPatch, Coupling, CyclicInterface, InterfaceField, LduInterfaceFields};
pub use matrix::{CoeffState, LduMatrix, Side};
pub use performance::SolverPerformance;
pub use residuals::ResidualFieldStore;
pub use selection::SelectionTables;
pub use traits::{Scalar, Vector3, VectorSpace};

// Re-export parallel support
pub use parallel::{Communicator, ReduceOp, SerialCommunicator, ThreadCommunicator};
#[cfg(feature = "mpi")]
pub use mpi::MpiCommunicator;

// Re-export solvers and strategy traits
pub use preconditioners::{
    DiagonalPreconditioner, DicPreconditioner, DiluPreconditioner, LduPreconditioner,
    NoPreconditioner,
};
pub use smoothers::{CompositeSmoother, FactorisedSmoother, GaussSeidelSmoother, LduSmoother};
pub use solvers::{
    DiagonalSolver, LduSolver, PbicgSolver, PbicgStabSolver, PcgSolver, SmoothSolver,
    SolverContext, solve, solve_segregated,
};
