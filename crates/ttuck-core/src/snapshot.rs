//! Persistence of fitted TT-Tucker tensors
//!
//! A snapshot stores the shape metadata (grid sizes, rank chain, embedding
//! ranks) and the row-major contents of every core and factor matrix, which
//! is enough to rebuild the tensor exactly.

use crate::basis::{FactorKind, FactorMatrix};
use crate::cores::TtCore;
use crate::error::{TtError, TtResult};
use crate::tensor::TtTucker;
use scirs2_core::ndarray_ext::{Array2, Array3};
use scirs2_core::numeric::Float;
use serde::{Deserialize, Serialize};

/// Serializable form of a [`TtTucker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtTuckerSnapshot {
    /// Grid size per dimension
    pub grid_sizes: Vec<usize>,
    /// Rank chain \[1, r₁, ..., r_{N-1}, 1\]
    pub rank_chain: Vec<usize>,
    /// Embedding rank per dimension
    pub embedding_ranks: Vec<usize>,
    /// Core entries, row-major (left, embedding, right)
    pub cores: Vec<Vec<f64>>,
    /// Factor entries, row-major (grid, embedding)
    pub factors: Vec<Vec<f64>>,
    pub factor_kinds: Vec<FactorKind>,
    pub trainable: Vec<bool>,
}

impl TtTuckerSnapshot {
    pub fn to_json(&self) -> TtResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> TtResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn to_f64<T: Float>(values: impl Iterator<Item = T>) -> TtResult<Vec<f64>> {
    values
        .map(|v| {
            v.to_f64()
                .ok_or_else(|| TtError::Serialization("value not representable as f64".into()))
        })
        .collect()
}

fn from_f64<T: Float>(values: &[f64]) -> TtResult<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            T::from(v).ok_or_else(|| {
                TtError::Serialization(format!("value {} not representable in target type", v))
            })
        })
        .collect()
}

impl<T> TtTucker<T>
where
    T: Float + 'static,
{
    /// Capture the tensor's shape metadata and contents
    pub fn snapshot(&self) -> TtResult<TtTuckerSnapshot> {
        Ok(TtTuckerSnapshot {
            grid_sizes: self.grid_sizes(),
            rank_chain: self.rank_chain(),
            embedding_ranks: self.embedding_ranks(),
            cores: self
                .cores()
                .iter()
                .map(|c| to_f64(c.as_array().iter().copied()))
                .collect::<TtResult<_>>()?,
            factors: self
                .factors()
                .iter()
                .map(|f| to_f64(f.as_array().iter().copied()))
                .collect::<TtResult<_>>()?,
            factor_kinds: self.factors().iter().map(|f| f.kind()).collect(),
            trainable: self.factors().iter().map(|f| f.is_trainable()).collect(),
        })
    }

    /// Rebuild a tensor from a snapshot, checking every recorded shape
    pub fn from_snapshot(snapshot: &TtTuckerSnapshot) -> TtResult<Self> {
        let n = snapshot.grid_sizes.len();
        if snapshot.rank_chain.len() != n + 1
            || snapshot.embedding_ranks.len() != n
            || snapshot.cores.len() != n
            || snapshot.factors.len() != n
            || snapshot.factor_kinds.len() != n
            || snapshot.trainable.len() != n
        {
            return Err(TtError::Serialization(format!(
                "snapshot metadata inconsistent with {} dimensions",
                n
            )));
        }

        let mut cores = Vec::with_capacity(n);
        let mut factors = Vec::with_capacity(n);
        for dim in 0..n {
            let shape = (
                snapshot.rank_chain[dim],
                snapshot.embedding_ranks[dim],
                snapshot.rank_chain[dim + 1],
            );
            let core = Array3::from_shape_vec(shape, from_f64(&snapshot.cores[dim])?)
                .map_err(|e| TtError::Serialization(format!("core {}: {}", dim, e)))?;
            cores.push(TtCore::new(core)?);

            let factor = Array2::from_shape_vec(
                (snapshot.grid_sizes[dim], snapshot.embedding_ranks[dim]),
                from_f64(&snapshot.factors[dim])?,
            )
            .map_err(|e| TtError::Serialization(format!("factor {}: {}", dim, e)))?;
            factors.push(FactorMatrix::from_parts(
                factor,
                snapshot.factor_kinds[dim],
                snapshot.trainable[dim],
            ));
        }

        Self::from_parts(cores, factors)
    }
}
