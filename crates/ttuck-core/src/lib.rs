//! # ttuck-core
//!
//! TT-Tucker tensor types for exponential machines.
//!
//! A TT-Tucker tensor represents a function of N discrete features, each on
//! its own grid, as a tensor train whose cores are contracted against small
//! per-dimension factor matrices:
//!
//! ```text
//! X(i₁, ..., i_N) = Σ U₁[i₁, k₁] ⋯ U_N[i_N, k_N] · W(k₁, ..., k_N)
//! W(k₁, ..., k_N) = G₁[k₁] × G₂[k₂] × ... × G_N[k_N]
//! ```
//!
//! With a rank-2 Legendre factor bank (constant and linear terms) the weight
//! tensor W holds one coefficient per subset of features, i.e. all 2^N
//! interaction weights of an exponential machine, stored in O(N r²) numbers.
//!
//! ## Contents
//!
//! - [`FactorMatrix`] / [`FactorKind`]: the factor bank
//! - [`TtCore`]: one 3-way link of the chain
//! - [`TtTucker`] / [`TtTuckerBuilder`]: the tensor and its construction
//! - [`WeightCore`]: the TT part alone, for reading interaction weights
//! - [`TtTuckerSnapshot`]: exact persistence via serde
//! - [`TtError`]: the error taxonomy shared by the whole stack
//!
//! ## Quick Start
//!
//! ```
//! use ttuck_core::{CoreInit, FactorKind, TtTucker};
//!
//! let t: TtTucker<f64> = TtTucker::<f64>::builder(&[16, 16, 16, 16, 16])
//!     .uniform_rank(2)
//!     .embedding_rank(2)
//!     .factor_kind(FactorKind::Legendre)
//!     .init(CoreInit::random_normal(0.5))
//!     .build()?;
//!
//! let w = t.weight_core();
//! let w_123 = w.entry(&[1, 1, 1, 0, 0])?; // weight of the {x1, x2, x3} interaction
//! assert!(w_123.is_finite());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## SciRS2 Integration
//!
//! Arrays come from `scirs2_core::ndarray_ext`, numeric traits from
//! `scirs2_core::numeric`, random numbers from `scirs2_core::random`.

#![deny(warnings)]

pub mod basis;
pub mod cores;
pub mod error;
pub mod init;
pub mod snapshot;
pub mod tensor;


pub use basis::{grid_node, FactorKind, FactorMatrix};
pub use cores::TtCore;
pub use error::{cast, TtError, TtResult};
pub use init::CoreInit;
pub use snapshot::TtTuckerSnapshot;
pub use tensor::{ParamId, TtTucker, TtTuckerBuilder, WeightCore};
