//! # ttuck-fit
//!
//! Fitting TT-Tucker tensors to data.
//!
//! **Key Features:**
//! - **Relative-error loss** - ‖y − p‖² / ‖y‖², plus RMSE and R² for reporting
//! - **Gradient oracles** - closed-form chain-rule gradients, or any closure
//! - **Optimizers** - SGD (momentum, Nesterov) and bias-corrected Adam
//! - **Optimizer loop** - relative-improvement convergence, iteration and
//!   wall-clock budgets, cancellation, validation tracking
//! - **Gradient checking** - finite-difference verification of any oracle
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::{Array1, Array2};
//! use ttuck_core::{CoreInit, FactorKind, TtTucker};
//! use ttuck_fit::{fit, relative_error, FitConfig};
//! use ttuck_kernels::evaluate_batch;
//!
//! // f(i, j) = 1 + i + j on a 6 x 6 grid
//! let idx = Array2::from_shape_fn((36, 2), |(s, n)| if n == 0 { s / 6 } else { s % 6 });
//! let y = Array1::from_shape_fn(36, |s| 1.0 + (s / 6 + s % 6) as f64);
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[6, 6])
//!     .uniform_rank(2)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.5))
//!     .build()?;
//!
//! let config = FitConfig::default().max_iterations(100);
//! let result = fit(t, idx.view(), y.view(), &config)?.into_result()?;
//! let p = evaluate_batch(&result.final_tensor, idx.view())?;
//! assert!(relative_error(y.view(), p.view())?.is_finite());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Logging
//!
//! The loop reports through `tracing`: `info!` progress every
//! `FitConfig::log_every` iterations, `debug!` at start and finish, `warn!`
//! on divergence, cancellation and budget exhaustion. Install a subscriber
//! (see the `ttuck` meta crate) to see them.

#![deny(warnings)]

pub mod fit;
pub mod gradcheck;
pub mod metrics;
pub mod optimizers;
pub mod oracle;

#[cfg(test)]
mod property_tests;

pub use fit::{
    fit, fit_inputs, fit_with_oracle, FitConfig, FitControl, FitResult, FitState, IterationHook,
    StopHandle, TerminationReason, ValidationSet,
};
pub use gradcheck::{check_gradients, GradCheckConfig, GradCheckResult};
pub use metrics::{loss, loss_on_inputs, r_squared, relative_error, rmse};
pub use optimizers::{build_optimizer, Adam, Optimizer, OptimizerConfig, OptimizerKind, Sgd};
pub use oracle::{AnalyticGradient, GradientOracle};
