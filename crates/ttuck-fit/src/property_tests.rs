//! Property-based tests for the loss and the optimizer loop

use super::*;
use proptest::prelude::*;
use scirs2_core::ndarray_ext::{Array1, Array2};
use ttuck_core::{CoreInit, FactorKind, TtTucker};
use ttuck_kernels::evaluate_batch;

fn seeded(grids: &[usize], seed: f64) -> TtTucker<f64> {
    TtTucker::<f64>::builder(grids)
        .uniform_rank(2)
        .embedding_rank(2)
        .factor_kind(FactorKind::Legendre)
        .init(CoreInit::from_fn(move |d, a, k, b| {
            ((d * 13 + a * 7 + k * 3 + b + 1) as f64 * seed).cos()
        }))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Relative error is scale invariant: e(cy, cp) = e(y, p)
    #[test]
    fn test_relative_error_scale_invariant(
        y in prop::collection::vec(-5.0f64..5.0, 1..20),
        noise in prop::collection::vec(-1.0f64..1.0, 20),
        c in 0.1f64..10.0,
    ) {
        prop_assume!(y.iter().any(|v| v.abs() > 1e-3));
        let y = Array1::from_vec(y);
        let p = Array1::from_shape_fn(y.len(), |s| y[s] + noise[s]);
        let e = relative_error(y.view(), p.view()).unwrap();
        let scaled = relative_error((&y * c).view(), (&p * c).view()).unwrap();
        prop_assert!((e - scaled).abs() <= 1e-10 * e.max(1.0));
        prop_assert!(e >= 0.0);
    }

    /// The tensor a fit returns always has a finite loss equal to the reported one
    #[test]
    fn test_fit_reports_loss_of_final_tensor(
        seed in 0.1f64..3.0,
        steps in 1usize..15,
    ) {
        let grids = [3, 4, 3];
        let idx = Array2::from_shape_fn((12, 3), |(s, n)| (s * (n + 1) + n) % grids[n]);
        let y = Array1::from_shape_fn(12, |s| 1.0 + 0.25 * s as f64);
        let config = FitConfig::default().max_iterations(steps).tolerance(1e-14);
        let result = fit(seeded(&grids, seed), idx.view(), y.view(), &config).unwrap();

        prop_assert!(result.iterations_run <= steps);
        prop_assert!(result.final_loss.is_finite());
        let p = evaluate_batch(&result.final_tensor, idx.view()).unwrap();
        let e = relative_error(y.view(), p.view()).unwrap();
        prop_assert!((e * e - result.final_loss).abs() <= 1e-10);
    }
}
