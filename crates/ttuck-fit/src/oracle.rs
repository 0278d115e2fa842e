//! Gradient oracles
//!
//! The fitting loop never differentiates anything itself. It asks a
//! [`GradientOracle`] for the loss and the gradient of the loss with respect
//! to every trainable parameter, then hands those gradients to the
//! optimizers. [`AnalyticGradient`] is the closed-form chain-rule oracle for
//! the squared relative error; any closure with the right signature is an
//! oracle too, which is how an external autodiff engine plugs in.

use crate::metrics::{degenerate, squared_norms};
use scirs2_core::ndarray_ext::{ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;
use ttuck_core::{TtError, TtResult, TtTucker};
use ttuck_kernels::{chain_gradient, evaluate_batch_with, Gradients, ParallelConfig};

/// Source of loss values and parameter gradients
pub trait GradientOracle<T: Float> {
    /// Loss at `tensor` and its gradient for every trainable parameter.
    ///
    /// Gradients must cover exactly `tensor.trainable_parameters()`, each
    /// with its parameter's shape.
    fn loss_and_gradients(
        &self,
        tensor: &TtTucker<T>,
        indices: ArrayView2<'_, usize>,
        targets: ArrayView1<'_, T>,
    ) -> TtResult<(T, Gradients<T>)>;

    /// Name used in log output
    fn name(&self) -> &str {
        "custom"
    }
}

impl<T, F> GradientOracle<T> for F
where
    T: Float,
    F: Fn(&TtTucker<T>, ArrayView2<'_, usize>, ArrayView1<'_, T>) -> TtResult<(T, Gradients<T>)>,
{
    fn loss_and_gradients(
        &self,
        tensor: &TtTucker<T>,
        indices: ArrayView2<'_, usize>,
        targets: ArrayView1<'_, T>,
    ) -> TtResult<(T, Gradients<T>)> {
        self(tensor, indices, targets)
    }
}

/// Closed-form gradient of the squared relative error
///
/// With residuals rₛ = yₛ − pₛ the loss is Σr²/‖y‖² and its derivative with
/// respect to prediction pₛ is −2rₛ/‖y‖², which [`chain_gradient`] pushes
/// back through the TT chain.
#[derive(Debug, Clone, Default)]
pub struct AnalyticGradient {
    parallel: ParallelConfig,
}

impl AnalyticGradient {
    pub fn new(parallel: ParallelConfig) -> Self {
        Self { parallel }
    }
}

impl<T> GradientOracle<T> for AnalyticGradient
where
    T: Float + Send + Sync + 'static,
{
    fn loss_and_gradients(
        &self,
        tensor: &TtTucker<T>,
        indices: ArrayView2<'_, usize>,
        targets: ArrayView1<'_, T>,
    ) -> TtResult<(T, Gradients<T>)> {
        if targets.len() != indices.nrows() {
            return Err(TtError::configuration(format!(
                "{} targets for {} samples",
                targets.len(),
                indices.nrows()
            )));
        }
        let predicted = evaluate_batch_with(tensor, indices, &self.parallel)?;
        let (residual, norm) = squared_norms(targets, predicted.view());
        if norm == T::zero() {
            if residual == T::zero() {
                return Ok((T::zero(), Gradients::zeros_for(tensor)?));
            }
            return Err(degenerate(residual));
        }

        let two = T::one() + T::one();
        let weights = (&predicted - &targets).mapv(|r| two * r / norm);
        let grads = chain_gradient(tensor, indices, weights.view(), &self.parallel)?;
        Ok((residual / norm, grads))
    }

    fn name(&self) -> &str {
        "analytic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::loss;
    use scirs2_core::ndarray_ext::array;
    use ttuck_core::{CoreInit, FactorKind, ParamId};

    fn tensor() -> TtTucker<f64> {
        TtTucker::<f64>::builder(&[3, 4])
            .uniform_rank(2)
            .embedding_rank(2)
            .factor_kind(FactorKind::Legendre)
            .init(CoreInit::from_fn(|d, a, k, b| 0.3 + 0.1 * (d + a + 2 * k + b) as f64))
            .build()
            .unwrap()
    }

    #[test]
    fn test_loss_matches_metric() {
        let t = tensor();
        let idx = array![[0usize, 1], [2, 3], [1, 0]];
        let y = array![1.0, -2.0, 0.5];
        let (l, grads) = AnalyticGradient::default()
            .loss_and_gradients(&t, idx.view(), y.view())
            .unwrap();
        assert!((l - loss(&t, idx.view(), y.view()).unwrap()).abs() < 1e-14);
        assert_eq!(grads.params(), vec![ParamId::Core(0), ParamId::Core(1)]);
    }

    #[test]
    fn test_zero_targets() {
        let t = tensor();
        let idx = array![[0usize, 0]];
        let err = AnalyticGradient::default()
            .loss_and_gradients(&t, idx.view(), array![0.0].view())
            .unwrap_err();
        assert!(matches!(err, TtError::DegenerateNorm { .. }));
    }

    #[test]
    fn test_closure_oracle() {
        let t = tensor();
        let oracle = |t: &TtTucker<f64>,
                      _: ArrayView2<'_, usize>,
                      _: ArrayView1<'_, f64>|
         -> TtResult<(f64, Gradients<f64>)> { Ok((42.0, Gradients::zeros_for(t)?)) };
        let (l, g) = oracle
            .loss_and_gradients(&t, array![[0usize, 0]].view(), array![1.0].view())
            .unwrap();
        assert_eq!(l, 42.0);
        assert_eq!(g.len(), 2);
        assert_eq!(GradientOracle::<f64>::name(&oracle), "custom");
    }
}
