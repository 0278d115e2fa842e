//! # ttuck - TT-Tucker exponential machines
//!
//! Fit a function of N discrete features with a tensor train whose cores
//! are contracted against per-dimension basis matrices, then ask which
//! feature interactions carry the variance.
//!
//! This is the **meta crate** that re-exports all ttuck components.
//!
//! ## Quick Start
//!
//! ```
//! use scirs2_core::ndarray_ext::{Array1, Array2};
//! use ttuck::prelude::*;
//!
//! // y = x₁ + x₂ on a 6 × 6 Legendre grid
//! let idx = Array2::from_shape_fn((36, 2), |(s, n)| if n == 0 { s / 6 } else { s % 6 });
//! let y = Array1::from_shape_fn(36, |s| grid_node(s / 6, 6) + grid_node(s % 6, 6));
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[6, 6])
//!     .uniform_rank(2)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.5))
//!     .build()?;
//!
//! let config = FitConfig::default().max_iterations(200);
//! let result = fit(t, idx.view(), y.view(), &config)?.into_result()?;
//! let d = dimension_distribution(&result.final_tensor)?;
//! assert_eq!(d.len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! - [`core`]: factor bank, TT cores, the TT-Tucker tensor, snapshots, errors
//! - [`kernels`]: indexed evaluation, chain gradients, discretization
//! - [`fit`]: relative-error loss, optimizers, the optimizer loop
//! - [`analysis`]: dimension distribution by interaction order
//! - [`logging`]: `tracing-subscriber` setup
//!
//! ## Features
//!
//! - `tracing` (default): [`logging::init_tracing`] installs a subscriber
//! - `parallel` (default): Rayon-parallel batch evaluation and gradients

#![deny(warnings)]

pub mod logging;

pub use ttuck_analysis as analysis;
pub use ttuck_core as core;
pub use ttuck_fit as fit;
pub use ttuck_kernels as kernels;

pub mod prelude {
    //! Prelude module for convenient imports

    // Tensor types
    pub use crate::core::{
        grid_node, CoreInit, FactorKind, FactorMatrix, ParamId, TtCore, TtError, TtResult,
        TtTucker, TtTuckerSnapshot,
    };

    // Evaluation
    pub use crate::kernels::{evaluate, evaluate_batch, evaluate_entry, AffineGrid, Discretizer};

    // Fitting
    pub use crate::fit::{
        fit, fit_inputs, fit_with_oracle, relative_error, AnalyticGradient, FitConfig, FitControl,
        FitResult, GradientOracle, OptimizerKind, StopHandle, TerminationReason,
    };

    // Analysis
    pub use crate::analysis::{dimension_distribution, grid_dimension_distribution, mean_dimension};
}
