//! Variance decomposition by interaction order
//!
//! A TT-Tucker tensor whose factor matrices follow the ordered-basis
//! convention (column 0 constant, later columns mean-zero over the grid) is
//! an ANOVA expansion: every embedding multi-index k belongs to the subset
//! α = {n : kₙ ≥ 1}, and the terms with the same α form that subset's
//! component. The variance of order m is the summed variance of all
//! components with |α| = m.
//!
//! Enumerating the 2^N subsets is never necessary. Walking the chain left
//! to right, we keep one r × r Gram accumulator per order reached so far:
//!
//! ```text
//! M'_m = Cᵀ M_m C + Σ_{j,l ≥ 1} Γ[j, l] D_jᵀ M_{m−1} D_l
//! ```
//!
//! where C = u₀ G\[:, 0, :\] is the "not in subset" slice, D_j = G\[:, j, :\]
//! the "in subset" slices and Γ the factor's column Gram matrix. After the
//! last core M_0 is the squared mean and M_m the variance of order m.
//!
//! The grid variant runs the same recursion on the grid-projected slices
//! P\[i\] under the uniform measure (C = mean of P\[i\], D_i = P\[i\] − C,
//! Γ = I / G) and needs no assumption on the basis.

use scirs2_core::ndarray_ext::{Array2, Axis};
use scirs2_core::numeric::Float;
use tracing::{debug, warn};
use ttuck_core::{TtResult, TtTucker};
use ttuck_kernels::ProjectedCores;

/// Unnormalized variance split of a tensor
#[derive(Debug, Clone, PartialEq)]
pub struct OrderVariances<T> {
    /// `variances[m - 1]` is the variance of interaction order m
    pub variances: Vec<T>,
    /// Sum of all order variances
    pub total_variance: T,
    /// Squared mean of the tensor over the grid
    pub mean_squared: T,
}

impl<T: Float> OrderVariances<T> {
    /// Variance fractions per order; all zeros for a constant tensor
    pub fn fractions(&self) -> Vec<T> {
        if self.total_variance <= T::zero() {
            return vec![T::zero(); self.variances.len()];
        }
        self.variances
            .iter()
            .map(|&v| v / self.total_variance)
            .collect()
    }

    /// Σ m · fraction(m)
    pub fn mean_dimension(&self) -> T {
        self.fractions()
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (m, &f)| acc + T::from(m + 1).unwrap_or_else(T::zero) * f)
    }

    /// Mean of the squared tensor over the grid
    pub fn second_moment(&self) -> T {
        self.mean_squared + self.total_variance
    }
}

/// Slices of one dimension split into the constant part and the parts that
/// put the dimension into the interaction subset
struct Layer<T> {
    constant: Array2<T>,
    deviations: Vec<Array2<T>>,
    /// mixed\[j\] = Σ_l Γ\[j, l\] D_l
    mixed: Vec<Array2<T>>,
}

impl<T> Layer<T>
where
    T: Float + 'static,
{
    /// Σ_j D_jᵀ M mixed_j
    fn spread(&self, m: &Array2<T>) -> Array2<T> {
        let (_, r_right) = self.constant.dim();
        let mut out = Array2::<T>::zeros((r_right, r_right));
        for (d, e) in self.deviations.iter().zip(self.mixed.iter()) {
            let term = d.t().dot(m).dot(e);
            out.zip_mut_with(&term, |o, &t| *o = *o + t);
        }
        out
    }
}

/// Coefficient layers read straight from the cores
fn coefficient_layers<T>(tensor: &TtTucker<T>) -> Vec<Layer<T>>
where
    T: Float + 'static,
{
    tensor
        .cores()
        .iter()
        .zip(tensor.factors().iter())
        .map(|(core, factor)| {
            let u0 = factor.view()[[0, 0]];
            let constant = core.slice(0).mapv(|v| v * u0);
            let gram = factor.column_gram();
            let r_emb = core.embedding_rank();
            let deviations: Vec<Array2<T>> = (1..r_emb).map(|j| core.slice(j).to_owned()).collect();
            let mixed = (1..r_emb)
                .map(|j| {
                    let mut acc = Array2::<T>::zeros(constant.dim());
                    for (l, d) in (1..r_emb).zip(deviations.iter()) {
                        let w = gram[[j, l]];
                        acc.zip_mut_with(d, |a, &v| *a = *a + w * v);
                    }
                    acc
                })
                .collect();
            Layer {
                constant,
                deviations,
                mixed,
            }
        })
        .collect()
}

/// Layers from the grid-projected slices under the uniform measure
fn grid_layers<T>(tensor: &TtTucker<T>) -> Vec<Layer<T>>
where
    T: Float + 'static,
{
    let projected = ProjectedCores::new(tensor);
    (0..projected.ndim())
        .map(|dim| {
            let slices = projected.dimension(dim);
            let g = projected.grid_size(dim);
            let inv_g = T::one() / T::from(g).unwrap_or_else(T::one);
            let constant = slices.sum_axis(Axis(0)).mapv(|v| v * inv_g);
            let deviations: Vec<Array2<T>> = (0..g)
                .map(|i| &projected.slice(dim, i) - &constant)
                .collect();
            let mixed = deviations.iter().map(|d| d.mapv(|v| v * inv_g)).collect();
            Layer {
                constant,
                deviations,
                mixed,
            }
        })
        .collect()
}

/// Run the per-order Gram recursion through the chain
fn accumulate<T>(layers: &[Layer<T>]) -> OrderVariances<T>
where
    T: Float + 'static,
{
    let mut acc: Vec<Array2<T>> = vec![Array2::<T>::ones((1, 1))];
    for layer in layers {
        let c = &layer.constant;
        let mut next: Vec<Array2<T>> = acc.iter().map(|m| c.t().dot(m).dot(c)).collect();
        next.push(Array2::<T>::zeros(next[0].dim()));
        for (order, m) in acc.iter().enumerate() {
            let spread = layer.spread(m);
            next[order + 1].zip_mut_with(&spread, |n, &s| *n = *n + s);
        }
        acc = next;
    }

    // Round-off can leave tiny negative values on empty orders
    let scalar = |m: &Array2<T>| {
        m.iter()
            .next()
            .copied()
            .unwrap_or_else(T::zero)
            .max(T::zero())
    };
    let mean_squared = acc.first().map(scalar).unwrap_or_else(T::zero);
    let variances: Vec<T> = acc.iter().skip(1).map(scalar).collect();
    let total_variance = variances.iter().fold(T::zero(), |a, &v| a + v);
    OrderVariances {
        variances,
        total_variance,
        mean_squared,
    }
}

/// Check every factor against the ordered-basis convention
fn check_factors<T>(tensor: &TtTucker<T>) -> TtResult<()>
where
    T: Float + 'static,
{
    for (dim, factor) in tensor.factors().iter().enumerate() {
        if let Err(err) = factor.check_ordered_basis() {
            warn!(
                dim,
                kind = ?factor.kind(),
                error = %err,
                "factor is not an ordered basis; use grid_dimension_distribution instead"
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Variance of each interaction order from the core coefficients.
///
/// # Errors
///
/// `Configuration` when a factor matrix does not have a constant column 0
/// and mean-zero later columns. The problem is logged at `warn!` first.
pub fn order_variances<T>(tensor: &TtTucker<T>) -> TtResult<OrderVariances<T>>
where
    T: Float + 'static,
{
    check_factors(tensor)?;
    let result = accumulate(&coefficient_layers(tensor));
    debug!(
        ndim = tensor.ndim(),
        total_variance = result.total_variance.to_f64().unwrap_or(f64::NAN),
        "order variances computed from coefficients"
    );
    Ok(result)
}

/// Variance of each interaction order under the uniform grid measure,
/// for any factor bank
pub fn grid_order_variances<T>(tensor: &TtTucker<T>) -> OrderVariances<T>
where
    T: Float + 'static,
{
    accumulate(&grid_layers(tensor))
}

/// Fraction of the output variance carried by each interaction order.
///
/// Entry m − 1 belongs to order m; the N entries are nonnegative and sum
/// to 1, or are all zero when the tensor is constant.
///
/// # Example
///
/// ```rust
/// use ttuck_analysis::dimension_distribution;
/// use ttuck_core::{CoreInit, FactorKind, TtTucker};
///
/// let t: TtTucker<f64> = TtTucker::<f64>::builder(&[8, 8, 8, 8])
///     .uniform_rank(2)
///     .embedding_rank(2)
///     .factor_kind(FactorKind::Legendre)
///     .init(CoreInit::random_normal(0.5))
///     .build()?;
///
/// let d = dimension_distribution(&t)?;
/// assert_eq!(d.len(), 4);
/// assert!(d.iter().all(|&v| v >= 0.0));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn dimension_distribution<T>(tensor: &TtTucker<T>) -> TtResult<Vec<T>>
where
    T: Float + 'static,
{
    Ok(order_variances(tensor)?.fractions())
}

/// [`dimension_distribution`] computed from the grid-projected cores
pub fn grid_dimension_distribution<T>(tensor: &TtTucker<T>) -> Vec<T>
where
    T: Float + 'static,
{
    grid_order_variances(tensor).fractions()
}

/// Average interaction order weighted by variance
pub fn mean_dimension<T>(tensor: &TtTucker<T>) -> TtResult<T>
where
    T: Float + 'static,
{
    Ok(order_variances(tensor)?.mean_dimension())
}
