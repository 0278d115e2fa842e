//! Property-based tests for evaluation and chain gradients

use super::*;
use proptest::prelude::*;
use scirs2_core::ndarray_ext::{Array1, Array2};
use ttuck_core::{CoreInit, FactorKind, ParamId, TtTucker};

fn seeded(grids: &[usize], rank: usize, seed: f64) -> TtTucker<f64> {
    TtTucker::<f64>::builder(grids)
        .uniform_rank(rank)
        .embedding_rank(2)
        .factor_kind(FactorKind::Legendre)
        .init(CoreInit::from_fn(move |d, a, k, b| {
            ((d * 17 + a * 5 + k * 3 + b + 1) as f64 * seed).sin()
        }))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// With all TT-ranks 1 the entry is a product of per-dimension scalars
    #[test]
    fn test_rank_one_is_product(
        grids in prop::collection::vec(2usize..7, 1..5),
        seed in 0.1f64..3.0,
        picks in prop::collection::vec(0usize..100, 5),
    ) {
        let t = seeded(&grids, 1, seed);
        let index: Vec<usize> = grids
            .iter()
            .zip(picks.iter())
            .map(|(&g, &p)| p % g)
            .collect();

        let mut expected = 1.0;
        for (n, &i) in index.iter().enumerate() {
            let u = t.factor(n).row(i);
            let g = t.core(n).as_array();
            expected *= (0..2).map(|k| u[k] * g[[0, k, 0]]).sum::<f64>();
        }
        let value = evaluate_entry(&t, &index).unwrap();
        prop_assert!((value - expected).abs() <= 1e-12 * expected.abs().max(1.0));
    }

    /// Index 0 in every dimension is always a valid, finite entry
    #[test]
    fn test_origin_is_finite(
        grids in prop::collection::vec(1usize..6, 1..6),
        rank in 1usize..4,
        seed in 0.1f64..3.0,
    ) {
        let t = seeded(&grids, rank, seed);
        let origin = Array2::<usize>::zeros((1, grids.len()));
        let y = evaluate_batch(&t, origin.view()).unwrap();
        prop_assert!(y[0].is_finite());
    }

    /// Each core enters linearly: ⟨G_n, ∂Φ/∂G_n⟩ = Φ for every n
    #[test]
    fn test_core_gradient_euler_identity(
        grids in prop::collection::vec(2usize..6, 2..5),
        rank in 1usize..3,
        seed in 0.1f64..3.0,
        batch in 1usize..20,
    ) {
        let t = seeded(&grids, rank, seed);
        let indices = Array2::from_shape_fn((batch, grids.len()), |(s, n)| (s * 3 + n) % grids[n]);
        let weights = Array1::from_shape_fn(batch, |s| 1.0 - 0.1 * s as f64);

        let phi = evaluate_batch(&t, indices.view()).unwrap().dot(&weights);
        let config = ParallelConfig::default();
        let grads = chain_gradient(&t, indices.view(), weights.view(), &config).unwrap();
        for n in 0..grids.len() {
            let g = grads.get(ParamId::Core(n)).unwrap();
            let inner: f64 = g
                .iter()
                .zip(t.core(n).as_array().iter())
                .map(|(a, b)| a * b)
                .sum();
            prop_assert!((inner - phi).abs() <= 1e-9 * phi.abs().max(1.0));
        }
    }
}
