//! # ttuck-analysis
//!
//! Sobol-type sensitivity analysis of TT-Tucker models: how much of the
//! output variance comes from interactions of 1, 2, ..., N features.
//!
//! Two methods are provided:
//!
//! - [`dimension_distribution`] reads the split straight from the core
//!   coefficients. It requires every factor matrix to follow the ordered
//!   basis convention (column 0 constant, later columns mean-zero over the
//!   grid), which holds for rank-2 Legendre, Chebyshev and any Cosine bank.
//! - [`grid_dimension_distribution`] works from the grid-projected cores
//!   under the uniform measure and accepts any factor bank.
//!
//! Both cost O(N² r³ R) for TT-rank r and embedding rank (or grid size) R;
//! the 2^N interaction subsets are never enumerated.
//!
//! ## Quick Start
//!
//! ```rust
//! use ttuck_analysis::{dimension_distribution, mean_dimension};
//! use ttuck_core::{CoreInit, FactorKind, TtTucker};
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[10; 6])
//!     .uniform_rank(3)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.5))
//!     .build()?;
//!
//! let d = dimension_distribution(&t)?;
//! assert_eq!(d.len(), 6);
//! let total: f64 = d.iter().sum();
//! assert!(total == 0.0 || (total - 1.0).abs() < 1e-9);
//! assert!(mean_dimension(&t)? <= 6.0);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(warnings)]

pub mod sobol;


pub use sobol::{
    dimension_distribution, grid_dimension_distribution, grid_order_variances, mean_dimension,
    order_variances, OrderVariances,
};
