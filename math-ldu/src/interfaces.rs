//! Coupled boundary interfaces
//!
//! A coupled interface is a boundary patch whose cells are coupled to cells
//! that are not reachable through the internal faces: a periodic image on the
//! same partition, or cells owned by a neighbouring partition. Each coupled
//! face `k` contributes `-coeffs[k] * psi_neighbour[k]` to row
//! `face_cells[k]` of `A * psi`.
//!
//! The transport of neighbour values is the business of the
//! [`InterfaceField`] implementation; this module only coordinates when the
//! corrections are applied.

use crate::error::{LduError, Result};
use crate::traits::Scalar;
use ndarray::Array1;

/// Which set of interface coefficients to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    /// Boundary coefficients, used by `A * x`
    Boundary,
    /// Internal coefficients, used by `A^T * x`
    Internal,
}

/// A boundary patch that couples its cells to neighbour values.
pub trait InterfaceField<T: Scalar>: Send + Sync {
    /// Type name used in diagnostics
    fn type_name(&self) -> &'static str;

    /// Cells adjacent to the patch faces
    fn face_cells(&self) -> &[usize];

    /// Check every local cell index the interface reads or writes against a
    /// system of `size` cells. Default: the face cells.
    fn check_cells(&self, size: usize) -> Result<()> {
        check_indices(self.type_name(), "face cell", self.face_cells(), size)
    }

    /// Start an update (e.g. post non-blocking sends). Default: nothing to do.
    fn init_matrix_update(&self, _psi: &Array1<T>) {}

    /// Fold the coupling into `result`.
    ///
    /// For each face `k`: `result[face_cells[k]] += coeffs[k] * psi_nbr[k]` if
    /// `add`, otherwise `-=`.
    fn update_matrix(&self, result: &mut Array1<T>, add: bool, psi: &Array1<T>, coeffs: &Array1<T>);
}

/// Periodic coupling between two sets of cells of the same partition.
///
/// Face `k` of the patch couples `face_cells[k]` to `neighbour_cells[k]`.
/// A periodic pair of patches is expressed as two `CyclicInterface`s with the
/// roles swapped.
#[derive(Debug, Clone)]
pub struct CyclicInterface {
    face_cells: Vec<usize>,
    neighbour_cells: Vec<usize>,
}

impl CyclicInterface {
    /// Create a cyclic coupling
    pub fn new(face_cells: Vec<usize>, neighbour_cells: Vec<usize>) -> Result<Self> {
        LduError::check_len("cyclic neighbour cells", face_cells.len(), neighbour_cells.len())?;
        Ok(Self {
            face_cells,
            neighbour_cells,
        })
    }

    /// Cells on the other side of the coupling
    pub fn neighbour_cells(&self) -> &[usize] {
        &self.neighbour_cells
    }
}

impl<T: Scalar> InterfaceField<T> for CyclicInterface {
    fn type_name(&self) -> &'static str {
        "cyclic"
    }

    fn face_cells(&self) -> &[usize] {
        &self.face_cells
    }

    fn check_cells(&self, size: usize) -> Result<()> {
        check_indices("cyclic", "face cell", &self.face_cells, size)?;
        check_indices("cyclic", "neighbour cell", &self.neighbour_cells, size)
    }

    fn update_matrix(&self, result: &mut Array1<T>, add: bool, psi: &Array1<T>, coeffs: &Array1<T>) {
        for (k, (&fc, &nc)) in self.face_cells.iter().zip(&self.neighbour_cells).enumerate() {
            let contribution = coeffs[k] * psi[nc];
            if add {
                result[fc] += contribution;
            } else {
                result[fc] -= contribution;
            }
        }
    }
}

fn check_indices(interface: &str, role: &str, cells: &[usize], size: usize) -> Result<()> {
    match cells.iter().find(|&&c| c >= size) {
        Some(&bad) => Err(LduError::size_mismatch(
            format!("{interface} interface {role} {bad}"),
            size,
            bad,
        )),
        None => Ok(()),
    }
}

/// One coupled patch and its matrix coefficients.
pub struct CoupledPatch<T: Scalar> {
    field: Box<dyn InterfaceField<T>>,
    bou_coeffs: Array1<T>,
    int_coeffs: Array1<T>,
}

impl<T: Scalar> CoupledPatch<T> {
    /// The interface field
    pub fn field(&self) -> &dyn InterfaceField<T> {
        self.field.as_ref()
    }

    /// Coefficients of the given coupling
    pub fn coeffs(&self, coupling: Coupling) -> &Array1<T> {
        match coupling {
            Coupling::Boundary => &self.bou_coeffs,
            Coupling::Internal => &self.int_coeffs,
        }
    }

    /// Mutable boundary coefficients
    pub fn bou_coeffs_mut(&mut self) -> &mut Array1<T> {
        &mut self.bou_coeffs
    }

    /// Mutable internal coefficients
    pub fn int_coeffs_mut(&mut self) -> &mut Array1<T> {
        &mut self.int_coeffs
    }
}

impl<T: Scalar> std::fmt::Debug for CoupledPatch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoupledPatch")
            .field("type", &self.field.type_name())
            .field("n_faces", &self.field.face_cells().len())
            .finish()
    }
}

/// The set of coupled patches of a matrix.
#[derive(Debug, Default)]
pub struct LduInterfaceFields<T: Scalar> {
    patches: Vec<CoupledPatch<T>>,
}

impl<T: Scalar> LduInterfaceFields<T> {
    /// No coupled patches
    pub fn new() -> Self {
        Self {
            patches: Vec::new(),
        }
    }

    /// Add a coupled patch with its boundary and internal coefficients
    pub fn push(
        &mut self,
        field: Box<dyn InterfaceField<T>>,
        bou_coeffs: Array1<T>,
        int_coeffs: Array1<T>,
    ) -> Result<()> {
        let n = field.face_cells().len();
        LduError::check_len("interface boundary coefficients", n, bou_coeffs.len())?;
        LduError::check_len("interface internal coefficients", n, int_coeffs.len())?;
        self.patches.push(CoupledPatch {
            field,
            bou_coeffs,
            int_coeffs,
        });
        Ok(())
    }

    /// Number of coupled patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// True if there is no coupling
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Iterate over the patches
    pub fn iter(&self) -> impl Iterator<Item = &CoupledPatch<T>> {
        self.patches.iter()
    }

    /// Mutable iteration over the patches
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CoupledPatch<T>> {
        self.patches.iter_mut()
    }

    /// Check that every cell a patch touches is a valid index for a system of `size` cells
    pub fn check_cells(&self, size: usize) -> Result<()> {
        self.patches
            .iter()
            .try_for_each(|patch| patch.field.check_cells(size))
    }

    /// Start the interface updates for `psi`
    pub fn init_matrix_interfaces(&self, psi: &Array1<T>) {
        for patch in &self.patches {
            patch.field.init_matrix_update(psi);
        }
    }

    /// Complete the interface updates, folding the coupling into `result`
    pub fn update_matrix_interfaces(
        &self,
        coupling: Coupling,
        psi: &Array1<T>,
        result: &mut Array1<T>,
        add: bool,
    ) {
        for patch in &self.patches {
            patch
                .field
                .update_matrix(result, add, psi, patch.coeffs(coupling));
        }
    }

    /// Blocking update: init followed by update
    pub fn apply(&self, coupling: Coupling, psi: &Array1<T>, result: &mut Array1<T>, add: bool) {
        if self.patches.is_empty() {
            return;
        }
        self.init_matrix_interfaces(psi);
        self.update_matrix_interfaces(coupling, psi, result, add);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn periodic_pair(n: usize, coeff: f64) -> LduInterfaceFields<f64> {
        let mut interfaces = LduInterfaceFields::new();
        interfaces
            .push(
                Box::new(CyclicInterface::new(vec![0], vec![n - 1]).unwrap()),
                array![coeff],
                array![coeff],
            )
            .unwrap();
        interfaces
            .push(
                Box::new(CyclicInterface::new(vec![n - 1], vec![0]).unwrap()),
                array![coeff],
                array![coeff],
            )
            .unwrap();
        interfaces
    }

    #[test]
    fn test_cyclic_update_subtracts() {
        let interfaces = periodic_pair(3, 2.0);
        let psi = array![1.0, 5.0, 3.0];
        let mut result = Array1::zeros(3);

        interfaces.apply(Coupling::Boundary, &psi, &mut result, false);

        assert_relative_eq!(result[0], -6.0);
        assert_relative_eq!(result[1], 0.0);
        assert_relative_eq!(result[2], -2.0);
    }

    #[test]
    fn test_cyclic_update_adds() {
        let interfaces = periodic_pair(3, 2.0);
        let psi = array![1.0, 5.0, 3.0];
        let mut result = array![1.0, 1.0, 1.0];

        interfaces.apply(Coupling::Internal, &psi, &mut result, true);

        assert_relative_eq!(result[0], 7.0);
        assert_relative_eq!(result[2], 3.0);
    }

    #[test]
    fn test_push_validates_lengths() {
        let mut interfaces = LduInterfaceFields::<f64>::new();
        let err = interfaces
            .push(
                Box::new(CyclicInterface::new(vec![0, 1], vec![2, 3]).unwrap()),
                array![1.0],
                array![1.0, 1.0],
            )
            .unwrap_err();
        assert!(err.is_dimension_error());
        assert!(interfaces.is_empty());
    }

    #[test]
    fn test_check_cells() {
        let interfaces = periodic_pair(3, 1.0);
        assert!(interfaces.check_cells(3).is_ok());
        assert!(interfaces.check_cells(2).is_err());
    }

    #[test]
    fn test_check_cells_covers_cyclic_neighbours() {
        let mut interfaces = LduInterfaceFields::<f64>::new();
        interfaces
            .push(
                Box::new(CyclicInterface::new(vec![0], vec![7]).unwrap()),
                array![1.0],
                array![1.0],
            )
            .unwrap();

        let err = interfaces.check_cells(3).unwrap_err();
        assert_eq!(
            err,
            LduError::SizeMismatch {
                what: "cyclic interface neighbour cell 7".to_string(),
                expected: 3,
                got: 7,
            }
        );
    }
}
