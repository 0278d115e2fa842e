//! Full workflow: discretize, fit, persist, analyze

use anyhow::Result;
use scirs2_core::ndarray_ext::{Array1, Array2};
use ttuck::logging::{init_tracing, TracingConfig};
use ttuck::prelude::*;

#[test]
fn fit_persist_and_analyze() -> Result<()> {
    init_tracing(TracingConfig {
        filter: "warn".to_string(),
        ..TracingConfig::default()
    })?;

    // Three features on [0, 1], y = 1 + 2x₁ + x₂x₃
    let grid = AffineGrid::uniform(0.0, 1.0, &[6, 6, 6])?;
    let samples = 216;
    let inputs = Array2::from_shape_fn((samples, 3), |(s, n)| {
        let stride = [36, 6, 1][n];
        ((s / stride) % 6) as f64 / 5.0
    });
    let y = Array1::from_shape_fn(samples, |s| {
        1.0 + 2.0 * inputs[[s, 0]] + inputs[[s, 1]] * inputs[[s, 2]]
    });

    let t: TtTucker<f64> = TtTucker::<f64>::builder(&[6, 6, 6])
        .uniform_rank(3)
        .embedding_rank(2)
        .factor_kind(FactorKind::Legendre)
        .init(CoreInit::from_fn(|d, a, k, b| {
            0.4 * ((d * 9 + a * 4 + k * 3 + b + 1) as f64).sin()
        }))
        .build()?;
    let config = FitConfig::default().max_iterations(400).tolerance(1e-10);
    let result = fit_inputs(t, inputs.view(), &grid, y.view(), &config)?.into_result()?;
    assert!(result.final_loss < result.loss_history[0]);

    let json = result.final_tensor.snapshot()?.to_json()?;
    let restored = TtTucker::<f64>::from_snapshot(&TtTuckerSnapshot::from_json(&json)?)?;
    assert_eq!(
        evaluate(&restored, inputs.view(), &grid)?,
        evaluate(&result.final_tensor, inputs.view(), &grid)?
    );

    let d = dimension_distribution(&restored)?;
    assert_eq!(d.len(), 3);
    assert!(d.iter().all(|&v| v >= 0.0));
    let g = grid_dimension_distribution(&restored);
    for (a, b) in d.iter().zip(g.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}
