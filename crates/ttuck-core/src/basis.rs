//! Factor bank: per-dimension factor matrices
//!
//! A factor matrix U of shape (G × R) maps a grid position i ∈ [0, G) to the
//! row vector U\[i, :\] of R basis coefficients. The TT core of the same
//! dimension is contracted against that row along its middle axis.
//!
//! # Kinds
//!
//! - **Legendre**: `U[i, k] = P_k(x_i)` with x evenly spaced over \[-1, 1\]
//! - **Chebyshev**: `U[i, k] = T_k(x_i)` on the same nodes
//! - **Cosine**: DCT-II basis `U[i, k] = cos(π k (i + ½) / G)`
//! - **Identity**: `U = I_G` (no Tucker compression, R = G)
//! - **Custom**: any caller-supplied matrix
//!
//! Column 0 of every polynomial/cosine kind is the constant function and
//! column 1 (where present) is the linear/first oscillating term, which is
//! the ordering the exponential-machine reading of the weight core relies on.

use crate::error::{TtError, TtResult};
use scirs2_core::ndarray_ext::{Array2, ArrayView1, ArrayView2, ArrayViewMut2};
use scirs2_core::numeric::Float;
use serde::{Deserialize, Serialize};

/// Basis family used to fill a factor matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorKind {
    /// Legendre polynomials P₀, P₁, ... on evenly spaced nodes of \[-1, 1\]
    Legendre,
    /// Chebyshev polynomials of the first kind on evenly spaced nodes of \[-1, 1\]
    Chebyshev,
    /// DCT-II cosine basis
    Cosine,
    /// Identity matrix (embedding rank equals grid size)
    Identity,
    /// Caller-supplied matrix
    Custom,
}

impl FactorKind {
    /// Whether column 0 of this kind is constant by construction
    pub fn has_constant_first_column(self) -> bool {
        matches!(
            self,
            FactorKind::Legendre | FactorKind::Chebyshev | FactorKind::Cosine
        )
    }
}

/// Grid coordinate of index `i` on `grid_size` evenly spaced nodes of \[-1, 1\].
///
/// A single-node grid sits at 0.
pub fn grid_node(i: usize, grid_size: usize) -> f64 {
    if grid_size <= 1 {
        0.0
    } else {
        -1.0 + 2.0 * i as f64 / (grid_size - 1) as f64
    }
}

/// Evaluate P₀(x), ..., P_{n-1}(x) by the three-term recurrence
fn legendre_row(x: f64, n: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(n);
    let (mut p_prev, mut p) = (0.0, 1.0);
    for k in 0..n {
        row.push(p);
        let kf = k as f64;
        let p_next = ((2.0 * kf + 1.0) * x * p - kf * p_prev) / (kf + 1.0);
        p_prev = p;
        p = p_next;
    }
    row
}

/// Evaluate T₀(x), ..., T_{n-1}(x) by the three-term recurrence
fn chebyshev_row(x: f64, n: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(n);
    let (mut t_prev, mut t) = (x, 1.0);
    for _ in 0..n {
        row.push(t);
        let t_next = 2.0 * x * t - t_prev;
        t_prev = t;
        t = t_next;
    }
    row
}

/// Factor matrix of one feature dimension
///
/// Shape (grid_size × embedding_rank). A matrix with `trainable == false` is
/// frozen: the fitting loop never hands it to an optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorMatrix<T> {
    data: Array2<T>,
    kind: FactorKind,
    trainable: bool,
}

impl<T> FactorMatrix<T>
where
    T: Float + 'static,
{
    /// Build a (grid_size × embedding_rank) factor matrix of the given kind.
    ///
    /// The result is frozen; use [`FactorMatrix::with_trainable`] to unfreeze it.
    ///
    /// # Errors
    ///
    /// - `grid_size` or `embedding_rank` is zero
    /// - `embedding_rank` exceeds the `grid_size` basis degrees a grid supports
    /// - `Identity` with `embedding_rank != grid_size`
    /// - `Custom` (use [`FactorMatrix::custom`])
    ///
    /// # Example
    ///
    /// ```
    /// use ttuck_core::{FactorKind, FactorMatrix};
    ///
    /// let u = FactorMatrix::<f64>::build(FactorKind::Legendre, 5, 2).unwrap();
    /// assert_eq!(u.shape(), (5, 2));
    /// assert_eq!(u.row(0).to_vec(), vec![1.0, -1.0]);
    /// ```
    pub fn build(kind: FactorKind, grid_size: usize, embedding_rank: usize) -> TtResult<Self> {
        if grid_size == 0 {
            return Err(TtError::configuration("grid size must be positive"));
        }
        if embedding_rank == 0 {
            return Err(TtError::configuration("embedding rank must be positive"));
        }

        let values: Vec<f64> = match kind {
            FactorKind::Legendre | FactorKind::Chebyshev | FactorKind::Cosine => {
                if embedding_rank > grid_size {
                    return Err(TtError::configuration(format!(
                        "{:?} basis on {} grid points supports at most {} degrees, requested {}",
                        kind, grid_size, grid_size, embedding_rank
                    )));
                }
                let mut values = Vec::with_capacity(grid_size * embedding_rank);
                for i in 0..grid_size {
                    let row = match kind {
                        FactorKind::Legendre => {
                            legendre_row(grid_node(i, grid_size), embedding_rank)
                        }
                        FactorKind::Chebyshev => {
                            chebyshev_row(grid_node(i, grid_size), embedding_rank)
                        }
                        _ => (0..embedding_rank)
                            .map(|k| {
                                (std::f64::consts::PI * k as f64 * (i as f64 + 0.5)
                                    / grid_size as f64)
                                    .cos()
                            })
                            .collect(),
                    };
                    values.extend(row);
                }
                values
            }
            FactorKind::Identity => {
                if embedding_rank != grid_size {
                    return Err(TtError::configuration(format!(
                        "identity factor requires embedding rank {} == grid size {}",
                        embedding_rank, grid_size
                    )));
                }
                (0..grid_size * grid_size)
                    .map(|idx| {
                        if idx / grid_size == idx % grid_size {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
            FactorKind::Custom => {
                return Err(TtError::configuration(
                    "custom factors must be supplied with FactorMatrix::custom",
                ))
            }
        };

        let converted = values
            .into_iter()
            .map(|v| {
                T::from(v).ok_or_else(|| {
                    TtError::configuration(format!("basis value {} not representable", v))
                })
            })
            .collect::<TtResult<Vec<T>>>()?;

        let data = Array2::from_shape_vec((grid_size, embedding_rank), converted)
            .map_err(|e| TtError::configuration(format!("factor reshape failed: {}", e)))?;

        Ok(Self {
            data,
            kind,
            trainable: false,
        })
    }

    /// Wrap a caller-supplied matrix
    pub fn custom(data: Array2<T>, trainable: bool) -> TtResult<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(TtError::configuration(format!(
                "custom factor must be non-empty, got shape {:?}",
                data.shape()
            )));
        }
        Ok(Self {
            data,
            kind: FactorKind::Custom,
            trainable,
        })
    }

    /// Rebuild from stored parts (kind is kept as recorded)
    pub(crate) fn from_parts(data: Array2<T>, kind: FactorKind, trainable: bool) -> Self {
        Self {
            data,
            kind,
            trainable,
        }
    }

    /// Set the trainable flag
    pub fn with_trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    /// (grid_size, embedding_rank)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn grid_size(&self) -> usize {
        self.data.nrows()
    }

    pub fn embedding_rank(&self) -> usize {
        self.data.ncols()
    }

    pub fn kind(&self) -> FactorKind {
        self.kind
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Embedding row of grid position `i` (unchecked beyond ndarray's own bounds check)
    pub fn row(&self, i: usize) -> ArrayView1<'_, T> {
        self.data.row(i)
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Mutable view; shape cannot change through it
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array2<T> {
        &self.data
    }

    /// Mean of U\[:, j\] · U\[:, k\] over the grid (uniform measure)
    pub fn column_gram(&self) -> Array2<T> {
        let (g, r) = self.data.dim();
        let inv_g = T::one() / T::from(g).unwrap_or_else(T::one);
        Array2::from_shape_fn((r, r), |(j, k)| {
            let mut acc = T::zero();
            for i in 0..g {
                acc = acc + self.data[[i, j]] * self.data[[i, k]];
            }
            acc * inv_g
        })
    }

    /// Check the ordered-basis convention used for order attribution.
    ///
    /// Column 0 must be a nonzero constant and every later column must have
    /// zero mean over the grid, so that embedding index 0 means "not in the
    /// interaction subset" and indices ≥ 1 mean "in the subset".
    pub fn check_ordered_basis(&self) -> TtResult<()> {
        let (g, r) = self.data.dim();
        let tol = T::epsilon().sqrt();
        let first = self.data[[0, 0]];
        let scale = first.abs().max(T::one());

        if first == T::zero() {
            return Err(TtError::configuration(
                "basis column 0 must be a nonzero constant",
            ));
        }
        for i in 1..g {
            if (self.data[[i, 0]] - first).abs() > tol * scale {
                return Err(TtError::configuration(format!(
                    "basis column 0 is not constant (row {} differs)",
                    i
                )));
            }
        }

        let inv_g = T::one() / T::from(g).unwrap_or_else(T::one);
        for k in 1..r {
            let column = self.data.column(k);
            let mean = column.iter().fold(T::zero(), |acc, &v| acc + v) * inv_g;
            let rms = (column.iter().fold(T::zero(), |acc, &v| acc + v * v) * inv_g).sqrt();
            if mean.abs() > tol * rms.max(T::one()) {
                return Err(TtError::configuration(format!(
                    "basis column {} has nonzero mean over the grid",
                    k
                )));
            }
        }
        Ok(())
    }
}
