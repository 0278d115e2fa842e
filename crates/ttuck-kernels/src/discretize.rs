//! Mapping real-valued features onto grid indices
//!
//! Discretization is a caller-supplied step in front of the evaluator. The
//! [`AffineGrid`] rescales each feature from \[lower, upper\] onto
//! \[0, G - 1\] and rounds to the nearest node; values outside the range are
//! clamped to the boundary nodes.

use crate::gather::evaluate_batch;
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView2};
use scirs2_core::numeric::Float;
use ttuck_core::{TtError, TtResult, TtTucker};

/// Maps real feature values to grid indices, one dimension at a time
pub trait Discretizer {
    /// Number of feature dimensions handled
    fn ndim(&self) -> usize;

    /// Grid index of `value` in dimension `dim`
    fn index(&self, dim: usize, value: f64) -> TtResult<usize>;

    /// Discretize a (samples × N) feature matrix
    fn discretize(&self, inputs: ArrayView2<'_, f64>) -> TtResult<Array2<usize>> {
        if inputs.ncols() != self.ndim() {
            return Err(TtError::configuration(format!(
                "input matrix has {} columns, discretizer handles {} dimensions",
                inputs.ncols(),
                self.ndim()
            )));
        }
        let mut out = Array2::<usize>::zeros(inputs.dim());
        for ((s, dim), &value) in inputs.indexed_iter() {
            out[[s, dim]] = self.index(dim, value)?;
        }
        Ok(out)
    }
}

/// Affine rescale-and-round discretization with clamping
#[derive(Debug, Clone, PartialEq)]
pub struct AffineGrid {
    lower: Vec<f64>,
    upper: Vec<f64>,
    grid_sizes: Vec<usize>,
}

impl AffineGrid {
    /// Per-dimension ranges \[lower\[n\], upper\[n\]\] onto grids of `grid_sizes[n]` nodes
    pub fn new(lower: &[f64], upper: &[f64], grid_sizes: &[usize]) -> TtResult<Self> {
        let n = grid_sizes.len();
        if lower.len() != n || upper.len() != n {
            return Err(TtError::configuration(format!(
                "affine grid needs {} bounds per side, got {} lower and {} upper",
                n,
                lower.len(),
                upper.len()
            )));
        }
        for dim in 0..n {
            if grid_sizes[dim] == 0 {
                return Err(TtError::configuration(format!(
                    "grid size of dimension {} must be positive",
                    dim
                )));
            }
            if !(lower[dim].is_finite() && upper[dim].is_finite()) || lower[dim] >= upper[dim] {
                return Err(TtError::configuration(format!(
                    "dimension {}: invalid range [{}, {}]",
                    dim, lower[dim], upper[dim]
                )));
            }
        }
        Ok(Self {
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            grid_sizes: grid_sizes.to_vec(),
        })
    }

    /// Same range in every dimension
    pub fn uniform(lower: f64, upper: f64, grid_sizes: &[usize]) -> TtResult<Self> {
        let n = grid_sizes.len();
        Self::new(&vec![lower; n], &vec![upper; n], grid_sizes)
    }

    /// Same range in every dimension, grid sizes taken from `tensor`
    pub fn for_tensor<T>(tensor: &TtTucker<T>, lower: f64, upper: f64) -> TtResult<Self>
    where
        T: Float + 'static,
    {
        Self::uniform(lower, upper, &tensor.grid_sizes())
    }

    pub fn grid_sizes(&self) -> &[usize] {
        &self.grid_sizes
    }

    /// Real coordinate of grid node `i` in dimension `dim`
    pub fn node(&self, dim: usize, i: usize) -> f64 {
        let g = self.grid_sizes[dim];
        if g <= 1 {
            return 0.5 * (self.lower[dim] + self.upper[dim]);
        }
        self.lower[dim] + (self.upper[dim] - self.lower[dim]) * i as f64 / (g - 1) as f64
    }
}

impl Discretizer for AffineGrid {
    fn ndim(&self) -> usize {
        self.grid_sizes.len()
    }

    fn index(&self, dim: usize, value: f64) -> TtResult<usize> {
        let g = *self.grid_sizes.get(dim).ok_or_else(|| {
            TtError::configuration(format!(
                "dimension {} outside discretizer with {} dimensions",
                dim,
                self.grid_sizes.len()
            ))
        })?;
        if value.is_nan() {
            return Err(TtError::configuration(format!(
                "NaN feature value in dimension {}",
                dim
            )));
        }
        if g == 1 {
            return Ok(0);
        }
        let t = (value - self.lower[dim]) / (self.upper[dim] - self.lower[dim]);
        let pos = (t * (g - 1) as f64).round();
        Ok(pos.clamp(0.0, (g - 1) as f64) as usize)
    }
}

/// Evaluate the tensor at real-valued feature vectors (rows of `inputs`)
///
/// # Example
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use ttuck_core::{CoreInit, FactorKind, TtTucker};
/// use ttuck_kernels::{evaluate, AffineGrid};
///
/// let t: TtTucker<f64> = TtTucker::<f64>::builder(&[5, 5])
///     .embedding_rank(2)
///     .factor_kind(FactorKind::Legendre)
///     .init(CoreInit::Constant(1.0))
///     .build()?;
/// let grid = AffineGrid::for_tensor(&t, 0.0, 1.0)?;
/// // node 0 of Legendre rank 2 is [1, -1], so every core slice sums to 0
/// let y = evaluate(&t, array![[0.0, 0.0], [1.0, 1.0]].view(), &grid)?;
/// assert_eq!(y.to_vec(), vec![0.0, 4.0]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn evaluate<T, D>(
    tensor: &TtTucker<T>,
    inputs: ArrayView2<'_, f64>,
    discretizer: &D,
) -> TtResult<Array1<T>>
where
    T: Float + Send + Sync + 'static,
    D: Discretizer + ?Sized,
{
    if discretizer.ndim() != tensor.ndim() {
        return Err(TtError::configuration(format!(
            "discretizer handles {} dimensions, tensor has {}",
            discretizer.ndim(),
            tensor.ndim()
        )));
    }
    let indices = discretizer.discretize(inputs)?;
    evaluate_batch(tensor, indices.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    #[test]
    fn test_affine_rounding_and_clamping() {
        let grid = AffineGrid::uniform(-1.0, 1.0, &[5]).unwrap();
        assert_eq!(grid.index(0, -1.0).unwrap(), 0);
        assert_eq!(grid.index(0, 0.0).unwrap(), 2);
        assert_eq!(grid.index(0, 0.26).unwrap(), 3);
        assert_eq!(grid.index(0, 1.0).unwrap(), 4);
        assert_eq!(grid.index(0, 7.5).unwrap(), 4);
        assert_eq!(grid.index(0, -3.0).unwrap(), 0);
        assert!(grid.index(0, f64::NAN).is_err());
        assert!(grid.index(1, 0.0).is_err());
        assert_eq!(grid.node(0, 3), 0.5);
    }

    #[test]
    fn test_discretize_matrix() {
        let grid = AffineGrid::new(&[0.0, 10.0], &[1.0, 20.0], &[3, 11]).unwrap();
        let inputs = array![[0.5, 10.0], [1.0, 14.6]];
        let idx = grid.discretize(inputs.view()).unwrap();
        assert_eq!(idx, array![[1usize, 0], [2, 5]]);
        assert!(grid.discretize(array![[0.5]].view()).is_err());
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(AffineGrid::new(&[1.0], &[1.0], &[4]).is_err());
        assert!(AffineGrid::new(&[0.0], &[f64::INFINITY], &[4]).is_err());
        assert!(AffineGrid::new(&[0.0], &[1.0], &[0]).is_err());
        assert!(AffineGrid::new(&[0.0, 0.0], &[1.0], &[4, 4]).is_err());
    }

    #[test]
    fn test_single_node_grid() {
        let grid = AffineGrid::uniform(0.0, 1.0, &[1]).unwrap();
        assert_eq!(grid.index(0, 0.9).unwrap(), 0);
        assert_eq!(grid.node(0, 0), 0.5);
    }
}
