//! Direct solver for diagonal matrices

use super::{LduSolver, SolverContext};
use crate::dictionary::SolverControls;
use crate::error::Result;
use crate::matrix::LduMatrix;
use crate::performance::SolverPerformance;
use crate::traits::Scalar;
use ndarray::{Array1, Zip};

/// `psi = source / diag`, reported as converged in zero iterations
pub struct DiagonalSolver<'a, T: Scalar> {
    field_name: &'a str,
    matrix: &'a LduMatrix<T>,
    controls: SolverControls,
}

impl<'a, T: Scalar> DiagonalSolver<'a, T> {
    pub fn new(ctx: SolverContext<'a, T>) -> Result<Self> {
        Ok(Self {
            field_name: ctx.field_name,
            matrix: ctx.matrix,
            controls: SolverControls::from_dict(ctx.dict)?,
        })
    }
}

impl<T: Scalar> LduSolver<T> for DiagonalSolver<'_, T> {
    fn type_name(&self) -> &'static str {
        "diagonal"
    }

    fn field_name(&self) -> &str {
        self.field_name
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(&self, psi: &mut Array1<T>, source: &Array1<T>) -> Result<SolverPerformance<T>> {
        self.matrix.check_field("psi", psi)?;
        self.matrix.check_field("source", source)?;
        let diag = self.matrix.diag()?;

        Zip::from(psi).and(source).and(diag).for_each(|x, &b, &d| *x = b / d);

        Ok(SolverPerformance::with_residuals(
            self.type_name(),
            self.field_name,
            T::zero(),
            T::zero(),
            0,
            true,
            false,
        ))
    }
}

pub(crate) fn new_diagonal_solver<'a, T: Scalar>(
    ctx: SolverContext<'a, T>,
) -> Result<Box<dyn LduSolver<T> + 'a>> {
    Ok(Box::new(DiagonalSolver::new(ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduAddressing;
    use crate::dictionary::Dictionary;
    use crate::interfaces::LduInterfaceFields;
    use crate::selection::SelectionTables;
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn test_diagonal_solve() {
        let addr = Arc::new(LduAddressing::new(3, vec![], vec![]).unwrap());
        let mut m = LduMatrix::new(addr);
        m.set_diag(array![2.0, 4.0, 0.5]).unwrap();
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = Dictionary::new("rho").with("solver", "diagonal");

        let solver = DiagonalSolver::new(SolverContext::new("rho", &m, &interfaces, &dict, &tables)).unwrap();
        let mut psi = Array1::zeros(3);
        let sp = solver.solve(&mut psi, &array![1.0, 1.0, 1.0]).unwrap();

        assert_eq!(psi, array![0.5, 0.25, 2.0]);
        assert!(sp.converged);
        assert!(!sp.singular());
        assert_eq!(sp.n_iterations, 0);
        assert_eq!(sp.solver_name, "diagonal");
    }

    #[test]
    fn test_size_mismatch() {
        let addr = Arc::new(LduAddressing::new(2, vec![], vec![]).unwrap());
        let mut m = LduMatrix::new(addr);
        m.set_diag(array![1.0, 1.0]).unwrap();
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = Dictionary::new("rho").with("solver", "diagonal");

        let solver = DiagonalSolver::new(SolverContext::new("rho", &m, &interfaces, &dict, &tables)).unwrap();
        let mut psi = Array1::zeros(3);
        let err = solver.solve(&mut psi, &array![1.0, 1.0, 1.0]).unwrap_err();
        assert!(err.is_dimension_error());
    }
}
