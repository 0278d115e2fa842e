//! # ttuck-kernels
//!
//! Numerical kernels for TT-Tucker tensors: indexed evaluation (gather),
//! closed-form chain gradients, and discretization of real-valued inputs.
//!
//! **Key Features:**
//! - **Projected gather** - each core is contracted against its factor once
//!   per pass; samples then only chain small (r × r) slices
//! - **Batched evaluation** - per-sample maps over a shared read-only
//!   projection, parallel above [`ParallelConfig::min_parallel_batch`]
//! - **Chain gradients** - exact gradients of Σₛ wₛ X(iₛ) for cores and
//!   trainable factors, with per-worker partial sums
//! - **Discretization** - [`Discretizer`] trait and [`AffineGrid`]
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::array;
//! use ttuck_core::{CoreInit, FactorKind, TtTucker};
//! use ttuck_kernels::{chain_gradient, evaluate_batch, ParallelConfig};
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[8, 8, 8])
//!     .uniform_rank(2)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.3))
//!     .build()?;
//!
//! let indices = array![[0usize, 0, 0], [7, 3, 5]];
//! let y = evaluate_batch(&t, indices.view())?;
//! assert_eq!(y.len(), 2);
//!
//! // d/dθ (y₀ - y₁)
//! let w = array![1.0, -1.0];
//! let grads = chain_gradient(&t, indices.view(), w.view(), &ParallelConfig::default())?;
//! assert_eq!(grads.len(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): Rayon-parallel batch passes

#![deny(warnings)]

pub mod discretize;
pub mod gather;
pub mod grad;
pub mod parallel;

#[cfg(test)]
mod property_tests;

pub use discretize::{evaluate, AffineGrid, Discretizer};
pub use gather::{
    check_indices, evaluate_batch, evaluate_batch_with, evaluate_entry, evaluate_projected,
    ProjectedCores,
};
pub use grad::{chain_gradient, Gradients};
pub use parallel::ParallelConfig;
