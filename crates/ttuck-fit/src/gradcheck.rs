//! Gradient checking utilities
//!
//! Verifies a [`GradientOracle`] against finite differences of the training
//! loss, one trainable parameter entry at a time. Useful when plugging in an
//! external gradient source.
//!
//! # Finite Difference Methods
//!
//! - **Central difference**: `f'(x) ≈ [f(x+h) - f(x-h)] / (2h)` (more accurate)
//! - **Forward difference**: `f'(x) ≈ [f(x+h) - f(x)] / h` (faster)
//!
//! # Example
//!
//! ```rust
//! use scirs2_core::ndarray_ext::array;
//! use ttuck_core::{CoreInit, FactorKind, TtTucker};
//! use ttuck_fit::gradcheck::{check_gradients, GradCheckConfig};
//! use ttuck_fit::AnalyticGradient;
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[4, 4])
//!     .uniform_rank(2)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.5))
//!     .build()?;
//! let idx = array![[0usize, 1], [3, 2], [2, 2]];
//! let y = array![1.0, 2.0, -1.0];
//!
//! let oracle = AnalyticGradient::default();
//! let result = check_gradients(&oracle, &t, idx.view(), y.view(), &GradCheckConfig::default())?;
//! assert!(result.passed);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::metrics::loss;
use crate::oracle::GradientOracle;
use anyhow::{anyhow, Context, Result};
use scirs2_core::ndarray_ext::{ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;
use tracing::{debug, warn};
use ttuck_core::TtTucker;

/// Gradient checking configuration
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Step size for finite differences (default: 1e-5)
    pub epsilon: f64,

    /// Relative tolerance for gradient comparison (default: 1e-3)
    pub rtol: f64,

    /// Absolute tolerance for gradient comparison (default: 1e-5)
    pub atol: f64,

    /// Use central difference (more accurate but 2x slower)
    pub use_central_diff: bool,

    /// Log every mismatching entry
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

/// Result of gradient checking
#[derive(Debug, Clone)]
pub struct GradCheckResult {
    /// Maximum absolute difference between analytical and numerical gradients
    pub max_abs_diff: f64,

    /// Maximum relative difference
    pub max_rel_diff: f64,

    /// Whether the gradient check passed
    pub passed: bool,

    /// Number of entries checked
    pub num_elements: usize,

    /// Number of entries that failed the check
    pub num_failures: usize,
}

/// Compare an oracle's gradients with finite differences of the loss.
///
/// Every entry of every trainable parameter is perturbed, so keep the
/// tensor small.
pub fn check_gradients<T, O>(
    oracle: &O,
    tensor: &TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    targets: ArrayView1<'_, T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Float + Send + Sync + 'static,
    O: GradientOracle<T> + ?Sized,
{
    let (_, analytical) = oracle
        .loss_and_gradients(tensor, indices, targets)
        .context("oracle failed at the check point")?;
    analytical
        .check_against(tensor)
        .context("oracle gradients do not match the trainable parameters")?;

    let eps = T::from(config.epsilon).ok_or_else(|| anyhow!("Failed to convert epsilon"))?;
    let base = if config.use_central_diff {
        None
    } else {
        Some(loss(tensor, indices, targets)?)
    };

    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut num_elements = 0;
    let mut num_failures = 0;

    for (id, grad) in analytical.iter() {
        for (pos, &a_val) in grad.indexed_iter() {
            let perturbed = |delta: T| -> Result<T> {
                let mut t = tensor.clone();
                let mut view = t.parameter_view_mut(id)?;
                let slot = view
                    .get_mut(&pos)
                    .ok_or_else(|| anyhow!("Index error at {:?}", pos))?;
                *slot = *slot + delta;
                Ok(loss(&t, indices, targets)?)
            };

            let plus = perturbed(eps)?;
            let numerical = match base {
                None => (plus - perturbed(-eps)?) / (eps + eps),
                Some(f0) => (plus - f0) / eps,
            };

            let a = a_val.to_f64().ok_or_else(|| anyhow!("Conversion error"))?;
            let n = numerical
                .to_f64()
                .ok_or_else(|| anyhow!("Conversion error"))?;
            let abs_diff = (a - n).abs();
            let rel_diff = if n.abs() > f64::EPSILON {
                abs_diff / n.abs()
            } else {
                abs_diff
            };

            max_abs_diff = max_abs_diff.max(abs_diff);
            max_rel_diff = max_rel_diff.max(rel_diff);
            num_elements += 1;

            if abs_diff > config.atol && rel_diff > config.rtol {
                num_failures += 1;
                if config.verbose {
                    warn!(
                        param = ?id,
                        index = ?pos,
                        analytical = a,
                        numerical = n,
                        "gradient mismatch"
                    );
                }
            }
        }
    }

    let passed = num_failures == 0;
    debug!(
        oracle = oracle.name(),
        passed,
        num_elements,
        num_failures,
        max_abs_diff,
        max_rel_diff,
        "gradient check finished"
    );

    Ok(GradCheckResult {
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements,
        num_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::AnalyticGradient;
    use scirs2_core::ndarray_ext::array;
    use ttuck_core::{CoreInit, FactorKind, TtResult};
    use ttuck_kernels::Gradients;

    fn tensor(trainable: bool) -> TtTucker<f64> {
        TtTucker::<f64>::builder(&[4, 3, 4])
            .tt_ranks(&[2, 3])
            .embedding_rank(3)
            .factor_kind(FactorKind::Chebyshev)
            .trainable_factors(trainable)
            .init(CoreInit::from_fn(|d, a, k, b| {
                ((d * 5 + a * 3 + k * 7 + b + 1) as f64 * 0.61).cos() * 0.8
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_analytic_gradient_passes() {
        let idx = array![[0usize, 1, 2], [3, 2, 1], [1, 0, 3], [2, 2, 0]];
        let y = array![0.5, -1.0, 2.0, 1.5];
        for trainable in [false, true] {
            let t = tensor(trainable);
            let oracle = AnalyticGradient::default();
            let config = GradCheckConfig::default();
            let result = check_gradients(&oracle, &t, idx.view(), y.view(), &config).unwrap();
            assert!(result.passed, "max abs diff {}", result.max_abs_diff);
            let expected: usize = t
                .trainable_parameters()
                .iter()
                .map(|&id| t.parameter_view(id).unwrap().len())
                .sum();
            assert_eq!(result.num_elements, expected);
        }
    }

    #[test]
    fn test_forward_difference_passes_loosely() {
        let t = tensor(false);
        let idx = array![[0usize, 1, 2], [3, 2, 1]];
        let y = array![1.0, 2.0];
        let config = GradCheckConfig {
            use_central_diff: false,
            epsilon: 1e-7,
            rtol: 1e-2,
            atol: 1e-4,
            ..GradCheckConfig::default()
        };
        let oracle = AnalyticGradient::default();
        let result = check_gradients(&oracle, &t, idx.view(), y.view(), &config).unwrap();
        assert!(result.passed);
    }

    #[test]
    fn test_wrong_oracle_fails() {
        let t = tensor(false);
        let idx = array![[0usize, 1, 2], [3, 2, 1]];
        let y = array![1.0, 2.0];
        let wrong = |t: &TtTucker<f64>,
                     i: ArrayView2<'_, usize>,
                     y: ArrayView1<'_, f64>|
         -> TtResult<(f64, Gradients<f64>)> {
            let (l, mut g) = AnalyticGradient::default().loss_and_gradients(t, i, y)?;
            g.scale(-1.0);
            Ok((l, g))
        };
        let config = GradCheckConfig::default();
        let result = check_gradients(&wrong, &t, idx.view(), y.view(), &config).unwrap();
        assert!(!result.passed);
        assert!(result.num_failures > 0);
    }
}
