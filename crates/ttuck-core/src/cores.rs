//! TT cores
//!
//! A TT core of dimension n is a 3-way array of shape
//! (r_{n-1}, R_n, r_n): left TT-rank, embedding (Tucker) rank, right TT-rank.

use crate::error::{TtError, TtResult};
use scirs2_core::ndarray_ext::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis};
use scirs2_core::numeric::Float;

/// One link of the tensor-train chain
#[derive(Debug, Clone, PartialEq)]
pub struct TtCore<T> {
    data: Array3<T>,
}

impl<T> TtCore<T>
where
    T: Float + 'static,
{
    /// Wrap an array of shape (left_rank, embedding_rank, right_rank)
    pub fn new(data: Array3<T>) -> TtResult<Self> {
        let (r_left, r_emb, r_right) = data.dim();
        if r_left == 0 || r_emb == 0 || r_right == 0 {
            return Err(TtError::configuration(format!(
                "TT core dimensions must be positive, got ({}, {}, {})",
                r_left, r_emb, r_right
            )));
        }
        Ok(Self { data })
    }

    pub fn zeros(left_rank: usize, embedding_rank: usize, right_rank: usize) -> TtResult<Self> {
        Self::new(Array3::zeros((left_rank, embedding_rank, right_rank)))
    }

    pub fn left_rank(&self) -> usize {
        self.data.dim().0
    }

    pub fn embedding_rank(&self) -> usize {
        self.data.dim().1
    }

    pub fn right_rank(&self) -> usize {
        self.data.dim().2
    }

    /// (left_rank, embedding_rank, right_rank)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// Mutable view; shape cannot change through it
    pub fn view_mut(&mut self) -> ArrayViewMut3<'_, T> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array3<T> {
        &self.data
    }

    pub fn into_array(self) -> Array3<T> {
        self.data
    }

    /// Slice G\[:, k, :\] of shape (left_rank, right_rank)
    pub fn slice(&self, k: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(1), k)
    }

    /// Contract an embedding vector against the middle axis:
    /// M\[a, b\] = Σₖ e\[k\] G\[a, k, b\]
    pub fn contract_embedding(&self, embedding: &[T]) -> TtResult<Array2<T>> {
        let (r_left, r_emb, r_right) = self.data.dim();
        if embedding.len() != r_emb {
            return Err(TtError::configuration(format!(
                "embedding of length {} does not match core embedding rank {}",
                embedding.len(),
                r_emb
            )));
        }
        let mut m = Array2::<T>::zeros((r_left, r_right));
        for (k, &e) in embedding.iter().enumerate() {
            if e == T::zero() {
                continue;
            }
            for a in 0..r_left {
                for b in 0..r_right {
                    m[[a, b]] = m[[a, b]] + e * self.data[[a, k, b]];
                }
            }
        }
        Ok(m)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_dims() {
        let core = TtCore::<f64>::zeros(1, 3, 2).unwrap();
        assert_eq!(core.dim(), (1, 3, 2));
        assert_eq!(core.left_rank(), 1);
        assert_eq!(core.embedding_rank(), 3);
        assert_eq!(core.right_rank(), 2);
        assert!(TtCore::<f64>::zeros(0, 3, 2).is_err());
    }

    #[test]
    fn test_contract_embedding() {
        let data = Array3::from_shape_fn((2, 2, 1), |(a, k, _)| (a * 2 + k) as f64);
        let core = TtCore::new(data).unwrap();
        // G[:, 0, :] = [0, 2], G[:, 1, :] = [1, 3]
        let m = core.contract_embedding(&[1.0, 10.0]).unwrap();
        assert_eq!(m[[0, 0]], 10.0);
        assert_eq!(m[[1, 0]], 32.0);
        assert!(core.contract_embedding(&[1.0]).is_err());
    }

    #[test]
    fn test_slice() {
        let data = Array3::from_shape_fn((1, 2, 2), |(_, k, b)| (k * 10 + b) as f64);
        let core = TtCore::new(data).unwrap();
        assert_eq!(core.slice(1)[[0, 1]], 11.0);
    }
}
