//! Face-based (LDU) sparse addressing
//!
//! An unstructured mesh with `size` cells and `M` internal faces is described
//! by two arrays: `lower_addr[f]` (owner cell) and `upper_addr[f]` (neighbour
//! cell) of each face `f`. Every off-diagonal coefficient of an
//! [`LduMatrix`](crate::LduMatrix) is indexed by face.
//!
//! Faces must be in upper-triangular order: `lower < upper` on every face and
//! `lower_addr` non-decreasing. The Gauss-Seidel sweeps and the incomplete
//! factorisations rely on that ordering.

use crate::error::{LduError, Result};

/// Owner/neighbour connectivity of an LDU matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LduAddressing {
    size: usize,
    lower_addr: Vec<usize>,
    upper_addr: Vec<usize>,
    /// `owner_start[c]..owner_start[c + 1]` are the faces owned by cell `c`
    owner_start: Vec<usize>,
}

impl LduAddressing {
    /// Build and validate addressing from owner/neighbour arrays.
    pub fn new(size: usize, lower_addr: Vec<usize>, upper_addr: Vec<usize>) -> Result<Self> {
        LduError::check_len("upperAddr", lower_addr.len(), upper_addr.len())?;

        for (face, (&l, &u)) in lower_addr.iter().zip(upper_addr.iter()).enumerate() {
            if u >= size {
                return Err(LduError::InvalidAddressing {
                    face,
                    reason: format!("upper cell {u} out of range (size {size})"),
                });
            }
            if l >= u {
                return Err(LduError::InvalidAddressing {
                    face,
                    reason: format!("lower cell {l} must be smaller than upper cell {u}"),
                });
            }
            if face > 0 && l < lower_addr[face - 1] {
                return Err(LduError::InvalidAddressing {
                    face,
                    reason: "lower addressing is not in increasing order".to_string(),
                });
            }
        }

        let owner_start = Self::calc_owner_start(size, &lower_addr);

        Ok(Self {
            size,
            lower_addr,
            upper_addr,
            owner_start,
        })
    }

    /// Build addressing from unordered `(a, b)` cell pairs.
    ///
    /// Each pair is oriented so that the smaller index is the owner and the
    /// faces are sorted into upper-triangular order. The returned permutation
    /// maps new face index to the index of the pair in `faces`.
    pub fn from_cell_pairs(size: usize, faces: &[(usize, usize)]) -> Result<(Self, Vec<usize>)> {
        let mut order: Vec<usize> = (0..faces.len()).collect();
        let oriented: Vec<(usize, usize)> = faces
            .iter()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        order.sort_by_key(|&f| oriented[f]);

        let lower = order.iter().map(|&f| oriented[f].0).collect();
        let upper = order.iter().map(|&f| oriented[f].1).collect();

        Ok((Self::new(size, lower, upper)?, order))
    }

    fn calc_owner_start(size: usize, lower_addr: &[usize]) -> Vec<usize> {
        let mut owner_start = vec![lower_addr.len(); size + 1];
        let mut face = 0;
        for (cell, start) in owner_start.iter_mut().take(size).enumerate() {
            while face < lower_addr.len() && lower_addr[face] < cell {
                face += 1;
            }
            *start = face;
        }
        owner_start
    }

    /// Number of unknowns (cells)
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of internal faces (off-diagonal pairs)
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.lower_addr.len()
    }

    /// Owner cell of each face
    #[inline]
    pub fn lower_addr(&self) -> &[usize] {
        &self.lower_addr
    }

    /// Neighbour cell of each face
    #[inline]
    pub fn upper_addr(&self) -> &[usize] {
        &self.upper_addr
    }

    /// Start of each cell's owned faces, length `size + 1`
    #[inline]
    pub fn owner_start_addr(&self) -> &[usize] {
        &self.owner_start
    }

    /// Faces owned by `cell`
    #[inline]
    pub fn owned_faces(&self, cell: usize) -> std::ops::Range<usize> {
        self.owner_start[cell]..self.owner_start[cell + 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_addressing() {
        let addr = LduAddressing::new(4, vec![0, 1, 2], vec![1, 2, 3]).unwrap();
        assert_eq!(addr.size(), 4);
        assert_eq!(addr.n_faces(), 3);
        assert_eq!(addr.owner_start_addr(), &[0, 1, 2, 3, 3]);
        assert_eq!(addr.owned_faces(3), 3..3);
    }

    #[test]
    fn test_owner_start_with_gaps() {
        // cell 1 owns no faces
        let addr = LduAddressing::new(4, vec![0, 0, 2], vec![1, 2, 3]).unwrap();
        assert_eq!(addr.owner_start_addr(), &[0, 2, 2, 3, 3]);
        assert_eq!(addr.owned_faces(0), 0..2);
        assert!(addr.owned_faces(1).is_empty());
    }

    #[test]
    fn test_rejects_unordered_faces() {
        let err = LduAddressing::new(3, vec![1, 0], vec![2, 1]).unwrap_err();
        assert!(matches!(err, LduError::InvalidAddressing { face: 1, .. }));

        let err = LduAddressing::new(3, vec![1], vec![0]).unwrap_err();
        assert!(matches!(err, LduError::InvalidAddressing { face: 0, .. }));

        let err = LduAddressing::new(3, vec![0], vec![3]).unwrap_err();
        assert!(err.is_dimension_error());
    }

    #[test]
    fn test_from_cell_pairs_orders_faces() {
        let (addr, order) = LduAddressing::from_cell_pairs(3, &[(2, 1), (1, 0)]).unwrap();
        assert_eq!(addr.lower_addr(), &[0, 1]);
        assert_eq!(addr.upper_addr(), &[1, 2]);
        assert_eq!(order, vec![1, 0]);
    }
}
