//! Error types for LDU matrix assembly and solution.
//!
//! Every variant here is a programming-contract or configuration failure
//! detected before (or instead of) iterating. Numerical outcomes such as
//! non-convergence or a singular pivot are not errors: they are reported
//! through [`SolverPerformance`](crate::SolverPerformance).

use thiserror::Error;

/// Errors raised by the LDU matrix, its addressing and the selection layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LduError {
    /// A coefficient array was read before it was allocated.
    #[error("{array}Ptr_ unallocated")]
    Unallocated {
        /// Name of the missing array (`diag`, `upper`, `lower`, `source`)
        array: &'static str,
    },

    /// A runtime-selected type name is not registered.
    #[error("unknown {kind} type {name}, valid {kind} types are: ({})", .valid.join(" "))]
    UnknownSelection {
        /// Family of the selection (`solver`, `preconditioner`, `smoother`)
        kind: &'static str,
        /// The name that was requested
        name: String,
        /// Registered names, sorted
        valid: Vec<String>,
    },

    /// A mandatory dictionary keyword is absent.
    #[error("keyword {keyword} is undefined in dictionary {dictionary}")]
    MissingKeyword {
        /// The missing keyword
        keyword: String,
        /// Name of the dictionary that was searched
        dictionary: String,
    },

    /// A dictionary entry could not be read as the requested type.
    #[error("keyword {keyword} in dictionary {dictionary}: {reason}")]
    InvalidKeyword {
        /// The offending keyword
        keyword: String,
        /// Name of the dictionary
        dictionary: String,
        /// Conversion failure
        reason: String,
    },

    /// An array does not match the size implied by the addressing.
    #[error("size mismatch for {what}: expected {expected}, got {got}")]
    SizeMismatch {
        /// What was being sized (field, coefficient array, interface)
        what: String,
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Face addressing violates the upper-triangular ordering contract.
    #[error("invalid addressing at face {face}: {reason}")]
    InvalidAddressing {
        /// Index of the offending face
        face: usize,
        /// Description of the violation
        reason: String,
    },

    /// A transposed operation was requested on an operator that does not support it.
    #[error("{operator}: transposed operation not supported for asymmetric matrices")]
    TransposeNotSupported {
        /// Name of the preconditioner or smoother
        operator: &'static str,
    },

    /// An operation needs a symmetric matrix but got another shape.
    #[error("{operator} requires a symmetric matrix")]
    NotSymmetric {
        /// Name of the operation
        operator: &'static str,
    },

    /// Operands of a matrix combination are incompatible.
    #[error("incompatible matrices: {reason}")]
    IncompatibleMatrices {
        /// Description of the incompatibility
        reason: String,
    },

    /// Under-relaxation factor out of range.
    #[error("invalid relaxation factor {alpha} (must be in (0, 1])")]
    InvalidRelaxation {
        /// The offending factor
        alpha: f64,
    },

    /// Another partition failed and aborted the communicator group.
    #[error("communicator aborted by rank {rank}")]
    Aborted {
        /// Rank that called abort first
        rank: usize,
    },

    /// The message-passing layer reported a failure.
    #[error("communication failure: {reason}")]
    Communication {
        /// Message from the transport
        reason: String,
    },

    /// The serial matrix stream is malformed.
    #[error("malformed matrix stream: {reason}")]
    Stream {
        /// Description of the parse failure
        reason: String,
    },
}

/// A specialized `Result` type for LDU operations.
pub type Result<T> = std::result::Result<T, LduError>;

impl LduError {
    /// Returns `true` for configuration failures (bad names, missing or malformed keys).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LduError::UnknownSelection { .. }
                | LduError::MissingKeyword { .. }
                | LduError::InvalidKeyword { .. }
        )
    }

    /// Returns `true` for violations of the matrix allocation contract.
    pub fn is_allocation_error(&self) -> bool {
        matches!(self, LduError::Unallocated { .. })
    }

    /// Returns `true` for shape or addressing mismatches.
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            LduError::SizeMismatch { .. }
                | LduError::InvalidAddressing { .. }
                | LduError::IncompatibleMatrices { .. }
        )
    }

    /// Returns `true` if a collective operation failed or was aborted.
    pub fn is_communication_error(&self) -> bool {
        matches!(self, LduError::Aborted { .. } | LduError::Communication { .. })
    }

    pub(crate) fn size_mismatch(what: impl Into<String>, expected: usize, got: usize) -> Self {
        LduError::SizeMismatch {
            what: what.into(),
            expected,
            got,
        }
    }

    pub(crate) fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::size_mismatch(what, expected, got))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unallocated_display() {
        let err = LduError::Unallocated { array: "diag" };
        assert_eq!(err.to_string(), "diagPtr_ unallocated");
        assert!(err.is_allocation_error());
    }

    #[test]
    fn test_unknown_selection_lists_valid_names() {
        let err = LduError::UnknownSelection {
            kind: "solver",
            name: "GMRES".to_string(),
            valid: vec!["PBiCG".to_string(), "PCG".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "unknown solver type GMRES, valid solver types are: (PBiCG PCG)"
        );
        assert!(err.is_config_error());
        assert!(!err.is_dimension_error());
    }

    #[test]
    fn test_aborted_is_communication_error() {
        let err = LduError::Aborted { rank: 3 };
        assert_eq!(err.to_string(), "communicator aborted by rank 3");
        assert!(err.is_communication_error());
        assert!(!err.is_dimension_error());
    }

    #[test]
    fn test_check_len() {
        assert!(LduError::check_len("diag", 3, 3).is_ok());
        let err = LduError::check_len("diag", 3, 4).unwrap_err();
        assert!(err.is_dimension_error());
        assert_eq!(err.to_string(), "size mismatch for diag: expected 3, got 4");
    }
}
