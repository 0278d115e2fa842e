//! Indexed evaluation (gather) of TT-Tucker tensors
//!
//! Entry (i₁, ..., i_N) is the chain product of the projected core slices
//!
//! ```text
//! P_n[i] = Σₖ U_n[i, k] G_n[:, k, :]          (r_{n-1} × r_n)
//! X(i₁, ..., i_N) = P₁[i₁] · P₂[i₂] · ... · P_N[i_N]
//! ```
//!
//! The projections are computed once per pass and shared read-only by every
//! sample; per sample only a running row vector of length r_n is carried.
//!
//! # Complexity
//!
//! - Projection: O(Σₙ Gₙ Rₙ r_{n-1} r_n)
//! - Per sample: O(Σₙ r_{n-1} r_n)

use crate::parallel::{map_samples, ParallelConfig};
use scirs2_core::ndarray_ext::{Array1, Array3, ArrayView1, ArrayView2, Axis};
use scirs2_core::numeric::Float;
use ttuck_core::{TtError, TtResult, TtTucker};

/// Cores contracted against their factor matrices, one (G, r_left, r_right)
/// array per dimension.
#[derive(Debug, Clone)]
pub struct ProjectedCores<T> {
    slices: Vec<Array3<T>>,
}

impl<T> ProjectedCores<T>
where
    T: Float + 'static,
{
    /// Project every core: P_n\[i, a, b\] = Σₖ U_n\[i, k\] G_n\[a, k, b\]
    pub fn new(tensor: &TtTucker<T>) -> Self {
        let slices = tensor
            .cores()
            .iter()
            .zip(tensor.factors().iter())
            .map(|(core, factor)| {
                let (r_left, r_emb, r_right) = core.dim();
                let g = factor.grid_size();
                let u = factor.view();
                let data = core.view();
                let mut p = Array3::<T>::zeros((g, r_left, r_right));
                for i in 0..g {
                    for k in 0..r_emb {
                        let coeff = u[[i, k]];
                        if coeff == T::zero() {
                            continue;
                        }
                        for a in 0..r_left {
                            for b in 0..r_right {
                                p[[i, a, b]] = p[[i, a, b]] + coeff * data[[a, k, b]];
                            }
                        }
                    }
                }
                p
            })
            .collect();
        Self { slices }
    }

    pub fn ndim(&self) -> usize {
        self.slices.len()
    }

    pub fn grid_size(&self, dim: usize) -> usize {
        self.slices[dim].dim().0
    }

    /// Projected slice P_n\[i\] of shape (r_{n-1}, r_n)
    pub fn slice(&self, dim: usize, i: usize) -> ArrayView2<'_, T> {
        self.slices[dim].index_axis(Axis(0), i)
    }

    /// All projections of one dimension, shape (G, r_{n-1}, r_n)
    pub fn dimension(&self, dim: usize) -> &Array3<T> {
        &self.slices[dim]
    }

    /// Check one multi-index against the grid bounds
    pub fn check_index(&self, index: ArrayView1<'_, usize>) -> TtResult<()> {
        if index.len() != self.slices.len() {
            return Err(TtError::configuration(format!(
                "multi-index has {} components, tensor has {} dimensions",
                index.len(),
                self.slices.len()
            )));
        }
        for (dim, &i) in index.iter().enumerate() {
            let bound = self.grid_size(dim);
            if i >= bound {
                return Err(TtError::out_of_range(dim, i, bound));
            }
        }
        Ok(())
    }

    /// Chain product for one already-checked multi-index
    pub(crate) fn chain(&self, index: ArrayView1<'_, usize>) -> T {
        let mut v = Array1::<T>::ones(1);
        for (dim, &i) in index.iter().enumerate() {
            v = v.dot(&self.slice(dim, i));
        }
        v[0]
    }

    /// Left partial products L_n = P₁\[i₁\] ⋯ P_n\[i_n\] for n = 0..N
    /// (L_0 is the boundary vector \[1\])
    pub(crate) fn left_vectors(&self, index: ArrayView1<'_, usize>) -> Vec<Array1<T>> {
        let mut out = Vec::with_capacity(self.slices.len() + 1);
        out.push(Array1::<T>::ones(1));
        for (dim, &i) in index.iter().enumerate() {
            let next = out[dim].dot(&self.slice(dim, i));
            out.push(next);
        }
        out
    }

    /// Right partial products R_n = P_{n+1}\[i_{n+1}\] ⋯ P_N\[i_N\], indexed so
    /// that entry n is the vector to the right of dimension n
    pub(crate) fn right_vectors(&self, index: ArrayView1<'_, usize>) -> Vec<Array1<T>> {
        let n = self.slices.len();
        let mut out = vec![Array1::<T>::ones(1); n];
        for dim in (0..n.saturating_sub(1)).rev() {
            out[dim] = self.slice(dim + 1, index[dim + 1]).dot(&out[dim + 1]);
        }
        out
    }
}

/// Validate every row of an index matrix, reporting the first offender
pub fn check_indices<T>(
    projected: &ProjectedCores<T>,
    indices: ArrayView2<'_, usize>,
) -> TtResult<()>
where
    T: Float + 'static,
{
    if indices.ncols() != projected.ndim() {
        return Err(TtError::configuration(format!(
            "index matrix has {} columns, tensor has {} dimensions",
            indices.ncols(),
            projected.ndim()
        )));
    }
    for row in indices.rows() {
        projected.check_index(row)?;
    }
    Ok(())
}

/// Evaluate a single entry X(i₁, ..., i_N).
///
/// # Errors
///
/// `OutOfRange` if a component exceeds its grid, `Configuration` if the
/// index length differs from the tensor order.
pub fn evaluate_entry<T>(tensor: &TtTucker<T>, index: &[usize]) -> TtResult<T>
where
    T: Float + 'static,
{
    if index.len() != tensor.ndim() {
        return Err(TtError::configuration(format!(
            "multi-index has {} components, tensor has {} dimensions",
            index.len(),
            tensor.ndim()
        )));
    }
    let mut v = Array1::<T>::ones(1);
    for (dim, &i) in index.iter().enumerate() {
        let factor = tensor.factor(dim);
        if i >= factor.grid_size() {
            return Err(TtError::out_of_range(dim, i, factor.grid_size()));
        }
        let row = factor.row(i);
        let m = tensor.core(dim).contract_embedding(&row.to_vec())?;
        v = v.dot(&m);
    }
    Ok(v[0])
}

/// Evaluate a batch of multi-indices, one per row of `indices` (S × N).
///
/// Uses the default [`ParallelConfig`].
///
/// # Example
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use ttuck_core::{CoreInit, TtTucker};
/// use ttuck_kernels::evaluate_batch;
///
/// let t: TtTucker<f64> = TtTucker::<f64>::builder(&[3, 3])
///     .init(CoreInit::Constant(1.0))
///     .build()?;
/// let values = evaluate_batch(&t, array![[0usize, 0], [2, 1]].view())?;
/// assert_eq!(values.to_vec(), vec![1.0, 1.0]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn evaluate_batch<T>(
    tensor: &TtTucker<T>,
    indices: ArrayView2<'_, usize>,
) -> TtResult<Array1<T>>
where
    T: Float + Send + Sync + 'static,
{
    evaluate_batch_with(tensor, indices, &ParallelConfig::default())
}

/// Evaluate a batch with an explicit parallelism threshold
pub fn evaluate_batch_with<T>(
    tensor: &TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    config: &ParallelConfig,
) -> TtResult<Array1<T>>
where
    T: Float + Send + Sync + 'static,
{
    let projected = ProjectedCores::new(tensor);
    evaluate_projected(&projected, indices, config)
}

/// Evaluate a batch against precomputed projections
pub fn evaluate_projected<T>(
    projected: &ProjectedCores<T>,
    indices: ArrayView2<'_, usize>,
    config: &ParallelConfig,
) -> TtResult<Array1<T>>
where
    T: Float + Send + Sync + 'static,
{
    check_indices(projected, indices)?;
    let values = map_samples(indices.nrows(), config, |s| projected.chain(indices.row(s)));
    Ok(Array1::from_vec(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::{array, Array2};
    use ttuck_core::{CoreInit, FactorKind};

    fn sample_tensor() -> TtTucker<f64> {
        TtTucker::<f64>::builder(&[4, 3, 5])
            .tt_ranks(&[2, 3])
            .embedding_rank(2)
            .factor_kind(FactorKind::Legendre)
            .init(CoreInit::from_fn(|d, a, k, b| {
                ((d * 13 + a * 5 + k * 3 + b + 1) as f64 * 0.7).cos()
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_batch_matches_single() {
        let t = sample_tensor();
        let indices = array![[0usize, 0, 0], [3, 2, 4], [1, 1, 2], [2, 0, 3]];
        let batch = evaluate_batch(&t, indices.view()).unwrap();
        for (s, row) in indices.rows().into_iter().enumerate() {
            let single = evaluate_entry(&t, &row.to_vec()).unwrap();
            assert!((batch[s] - single).abs() < 1e-12);
        }
    }

    #[test]
    fn test_out_of_range_reports_first_offender() {
        let t = sample_tensor();
        let indices = array![[0usize, 0, 0], [0, 3, 9]];
        let err = evaluate_batch(&t, indices.view()).unwrap_err();
        assert_eq!(err, TtError::out_of_range(1, 3, 3));

        let err = evaluate_entry(&t, &[4, 0, 0]).unwrap_err();
        assert_eq!(err, TtError::out_of_range(0, 4, 4));
    }

    #[test]
    fn test_wrong_column_count() {
        let t = sample_tensor();
        let indices = Array2::<usize>::zeros((2, 2));
        assert!(matches!(
            evaluate_batch(&t, indices.view()).unwrap_err(),
            TtError::Configuration(_)
        ));
    }

    #[test]
    fn test_empty_batch() {
        let t = sample_tensor();
        let indices = Array2::<usize>::zeros((0, 3));
        assert_eq!(evaluate_batch(&t, indices.view()).unwrap().len(), 0);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let t = sample_tensor();
        let indices = Array2::from_shape_fn((600, 3), |(s, n)| (s * (n + 3) + n) % [4, 3, 5][n]);
        let seq = evaluate_batch_with(&t, indices.view(), &ParallelConfig::sequential()).unwrap();
        let par = evaluate_batch_with(
            &t,
            indices.view(),
            &ParallelConfig::default().with_min_parallel_batch(1),
        )
        .unwrap();
        for (a, b) in seq.iter().zip(par.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_partial_products_bracket_entry() {
        let t = sample_tensor();
        let projected = ProjectedCores::new(&t);
        let index = array![2usize, 1, 4];
        let left = projected.left_vectors(index.view());
        let right = projected.right_vectors(index.view());
        let full = projected.chain(index.view());
        assert_eq!(left.len(), 4);
        assert!((left[3][0] - full).abs() < 1e-12);
        assert!((right[0].dot(&projected.slice(0, 2).row(0)) - full).abs() < 1e-12);
    }
}
