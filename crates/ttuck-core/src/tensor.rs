//! TT-Tucker tensor
//!
//! An N-way tensor of shape (G₁ × ... × G_N) represented by N TT cores and N
//! factor matrices. The entry at (i₁, ..., i_N) is
//!
//! ```text
//! X(i₁, ..., i_N) = M₁(i₁) · M₂(i₂) · ... · M_N(i_N)
//! M_n(i) = Σₖ U_n[i, k] G_n[:, k, :]
//! ```
//!
//! with boundary ranks r₀ = r_N = 1. The full tensor is never materialized.
//!
//! # Structure
//!
//! - Core n has shape (r_{n-1}, R_n, r_n)
//! - Factor n has shape (G_n, R_n)
//! - r₁, ..., r_{N-1} are the TT-ranks, R_n the embedding (Tucker) ranks

use crate::basis::{FactorKind, FactorMatrix};
use crate::cores::TtCore;
use crate::error::{TtError, TtResult};
use crate::init::CoreInit;
use scirs2_core::ndarray_ext::{Array2, Array3, ArrayViewD, ArrayViewMutD};
use scirs2_core::numeric::Float;

/// Identifies one parameter array of a [`TtTucker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// TT core of the given dimension
    Core(usize),
    /// Factor matrix of the given dimension
    Factor(usize),
}

/// TT-Tucker tensor: TT cores plus per-dimension factor matrices
#[derive(Debug, Clone, PartialEq)]
pub struct TtTucker<T> {
    cores: Vec<TtCore<T>>,
    factors: Vec<FactorMatrix<T>>,
}

impl<T> TtTucker<T>
where
    T: Float + 'static,
{
    /// Start building a tensor over the given grid sizes
    pub fn builder(grid_sizes: &[usize]) -> TtTuckerBuilder {
        TtTuckerBuilder::new(grid_sizes)
    }

    /// Assemble from explicit cores and factors, validating the chain.
    ///
    /// # Errors
    ///
    /// `Configuration` when a grid is empty, the boundary ranks are not 1,
    /// adjacent ranks do not match, or a core's embedding rank differs from its
    /// factor's column count.
    pub fn from_parts(cores: Vec<TtCore<T>>, factors: Vec<FactorMatrix<T>>) -> TtResult<Self> {
        let tensor = Self { cores, factors };
        tensor.validate()?;
        Ok(tensor)
    }

    fn validate(&self) -> TtResult<()> {
        let n = self.cores.len();
        if n == 0 {
            return Err(TtError::configuration(
                "TT-Tucker tensor needs at least one dimension",
            ));
        }
        if self.factors.len() != n {
            return Err(TtError::configuration(format!(
                "{} cores but {} factor matrices",
                n,
                self.factors.len()
            )));
        }
        if let Some(dim) = self.factors.iter().position(|f| f.grid_size() == 0) {
            return Err(TtError::configuration(format!("dimension {} has an empty grid", dim)));
        }
        if self.cores[0].left_rank() != 1 {
            return Err(TtError::configuration(format!(
                "first core must have left rank 1, got {}",
                self.cores[0].left_rank()
            )));
        }
        if self.cores[n - 1].right_rank() != 1 {
            return Err(TtError::configuration(format!(
                "last core must have right rank 1, got {}",
                self.cores[n - 1].right_rank()
            )));
        }
        for i in 0..n - 1 {
            let r_right = self.cores[i].right_rank();
            let r_left_next = self.cores[i + 1].left_rank();
            if r_right != r_left_next {
                return Err(TtError::configuration(format!(
                    "rank mismatch between cores {} and {}: {} vs {}",
                    i,
                    i + 1,
                    r_right,
                    r_left_next
                )));
            }
        }
        for (i, (core, factor)) in self.cores.iter().zip(self.factors.iter()).enumerate() {
            if core.embedding_rank() != factor.embedding_rank() {
                return Err(TtError::configuration(format!(
                    "dimension {}: core embedding rank {} does not match factor columns {}",
                    i,
                    core.embedding_rank(),
                    factor.embedding_rank()
                )));
            }
        }
        Ok(())
    }

    /// Number of feature dimensions N
    pub fn ndim(&self) -> usize {
        self.cores.len()
    }

    pub fn grid_sizes(&self) -> Vec<usize> {
        self.factors.iter().map(|f| f.grid_size()).collect()
    }

    /// Interior TT-ranks \[r₁, ..., r_{N-1}\]
    pub fn tt_ranks(&self) -> Vec<usize> {
        self.cores[..self.cores.len() - 1]
            .iter()
            .map(|c| c.right_rank())
            .collect()
    }

    /// Full rank chain \[1, r₁, ..., r_{N-1}, 1\]
    pub fn rank_chain(&self) -> Vec<usize> {
        let mut chain = Vec::with_capacity(self.cores.len() + 1);
        chain.push(self.cores[0].left_rank());
        chain.extend(self.cores.iter().map(|c| c.right_rank()));
        chain
    }

    pub fn embedding_ranks(&self) -> Vec<usize> {
        self.cores.iter().map(|c| c.embedding_rank()).collect()
    }

    pub fn cores(&self) -> &[TtCore<T>] {
        &self.cores
    }

    pub fn factors(&self) -> &[FactorMatrix<T>] {
        &self.factors
    }

    pub fn core(&self, n: usize) -> &TtCore<T> {
        &self.cores[n]
    }

    pub fn factor(&self, n: usize) -> &FactorMatrix<T> {
        &self.factors[n]
    }

    /// Replace core `n` with an array of identical shape
    pub fn set_core(&mut self, n: usize, data: Array3<T>) -> TtResult<()> {
        let current = self
            .cores
            .get(n)
            .ok_or_else(|| TtError::configuration(format!("no core at dimension {}", n)))?;
        if current.dim() != data.dim() {
            return Err(TtError::configuration(format!(
                "core {} has shape {:?}, replacement has {:?}",
                n,
                current.dim(),
                data.dim()
            )));
        }
        self.cores[n] = TtCore::new(data)?;
        Ok(())
    }

    /// Replace factor `n`; its column count must match core `n`
    pub fn set_factor(&mut self, n: usize, factor: FactorMatrix<T>) -> TtResult<()> {
        let core = self
            .cores
            .get(n)
            .ok_or_else(|| TtError::configuration(format!("no factor at dimension {}", n)))?;
        if core.embedding_rank() != factor.embedding_rank() {
            return Err(TtError::configuration(format!(
                "dimension {}: core embedding rank {} does not match factor columns {}",
                n,
                core.embedding_rank(),
                factor.embedding_rank()
            )));
        }
        self.factors[n] = factor;
        Ok(())
    }

    /// Replace every factor matrix with one built from `kind`.
    ///
    /// Grid sizes and embedding ranks are kept. With `trainable == false` the
    /// new factors are excluded from gradient updates.
    pub fn set_factors(&mut self, kind: FactorKind, trainable: bool) -> TtResult<()> {
        let rebuilt = self
            .factors
            .iter()
            .map(|f| {
                FactorMatrix::build(kind, f.grid_size(), f.embedding_rank())
                    .map(|u| u.with_trainable(trainable))
            })
            .collect::<TtResult<Vec<_>>>()?;
        self.factors = rebuilt;
        Ok(())
    }

    /// Parameters an optimizer may update: every core, plus unfrozen factors
    pub fn trainable_parameters(&self) -> Vec<ParamId> {
        let mut params: Vec<ParamId> = (0..self.cores.len()).map(ParamId::Core).collect();
        params.extend(
            self.factors
                .iter()
                .enumerate()
                .filter(|(_, f)| f.is_trainable())
                .map(|(n, _)| ParamId::Factor(n)),
        );
        params
    }

    /// Shape of a parameter array
    pub fn parameter_shape(&self, id: ParamId) -> TtResult<Vec<usize>> {
        Ok(self.parameter_view(id)?.shape().to_vec())
    }

    pub fn parameter_view(&self, id: ParamId) -> TtResult<ArrayViewD<'_, T>> {
        match id {
            ParamId::Core(n) => self
                .cores
                .get(n)
                .map(|c| c.view().into_dyn())
                .ok_or_else(|| TtError::configuration(format!("no core at dimension {}", n))),
            ParamId::Factor(n) => self
                .factors
                .get(n)
                .map(|f| f.view().into_dyn())
                .ok_or_else(|| TtError::configuration(format!("no factor at dimension {}", n))),
        }
    }

    /// Mutable access for optimizers. Frozen factors are refused.
    pub fn parameter_view_mut(&mut self, id: ParamId) -> TtResult<ArrayViewMutD<'_, T>> {
        match id {
            ParamId::Core(n) => self
                .cores
                .get_mut(n)
                .map(|c| c.view_mut().into_dyn())
                .ok_or_else(|| TtError::configuration(format!("no core at dimension {}", n))),
            ParamId::Factor(n) => {
                let factor = self
                    .factors
                    .get_mut(n)
                    .ok_or_else(|| {
                        TtError::configuration(format!("no factor at dimension {}", n))
                    })?;
                if !factor.is_trainable() {
                    return Err(TtError::configuration(format!(
                        "factor {} is frozen and cannot be updated",
                        n
                    )));
                }
                Ok(factor.view_mut().into_dyn())
            }
        }
    }

    /// Total number of stored scalars (cores and factors)
    pub fn num_parameters(&self) -> usize {
        let core_params: usize = self.cores.iter().map(|c| c.as_array().len()).sum();
        let factor_params: usize = self.factors.iter().map(|f| f.as_array().len()).sum();
        core_params + factor_params
    }

    /// Size of the represented full tensor divided by the stored parameters
    pub fn compression_ratio(&self) -> f64 {
        let full_size: f64 = self.grid_sizes().iter().map(|&g| g as f64).product();
        full_size / self.num_parameters() as f64
    }

    pub fn is_finite(&self) -> bool {
        self.cores.iter().all(|c| c.is_finite())
            && self
                .factors
                .iter()
                .all(|f| f.as_array().iter().all(|v| v.is_finite()))
    }

    /// The TT part alone: the chain of cores without the factor layer
    pub fn weight_core(&self) -> WeightCore<T> {
        WeightCore {
            cores: self.cores.iter().map(|c| c.as_array().clone()).collect(),
        }
    }
}

/// Chain of TT cores with the Tucker factors stripped away.
///
/// Entry (k₁, ..., k_N) is the coefficient of the product basis function
/// U₁\[:, k₁\] ⊗ ... ⊗ U_N\[:, k_N\]. With a rank-2 Legendre basis, index 0 is
/// the constant term and index 1 the linear term, so the entry at a 0/1
/// pattern is the exponential-machine weight w_α of the subset of 1s.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightCore<T> {
    cores: Vec<Array3<T>>,
}

impl<T> WeightCore<T>
where
    T: Float + 'static,
{
    pub fn cores(&self) -> &[Array3<T>] {
        &self.cores
    }

    pub fn into_cores(self) -> Vec<Array3<T>> {
        self.cores
    }

    /// Embedding ranks (the weight tensor's shape)
    pub fn shape(&self) -> Vec<usize> {
        self.cores.iter().map(|c| c.dim().1).collect()
    }

    /// Coefficient at an embedding multi-index
    pub fn entry(&self, index: &[usize]) -> TtResult<T> {
        if index.len() != self.cores.len() {
            return Err(TtError::configuration(format!(
                "index has {} components, weight core has {} dimensions",
                index.len(),
                self.cores.len()
            )));
        }
        let mut v = vec![T::one()];
        for (dim, (core, &k)) in self.cores.iter().zip(index.iter()).enumerate() {
            let (r_left, r_emb, r_right) = core.dim();
            if k >= r_emb {
                return Err(TtError::out_of_range(dim, k, r_emb));
            }
            let mut next = vec![T::zero(); r_right];
            for (a, &va) in v.iter().enumerate().take(r_left) {
                for (b, slot) in next.iter_mut().enumerate() {
                    *slot = *slot + va * core[[a, k, b]];
                }
            }
            v = next;
        }
        Ok(v[0])
    }

    /// Sum of squared coefficients, by left-to-right Gram contraction
    pub fn squared_norm(&self) -> T {
        let mut w = Array2::<T>::eye(1);
        for core in &self.cores {
            let (r_left, r_emb, r_right) = core.dim();
            let mut next = Array2::<T>::zeros((r_right, r_right));
            for i in 0..r_right {
                for j in 0..r_right {
                    let mut sum = T::zero();
                    for alpha in 0..r_left {
                        for beta in 0..r_left {
                            let w_val = w[[alpha, beta]];
                            for k in 0..r_emb {
                                sum = sum + w_val * core[[alpha, k, i]] * core[[beta, k, j]];
                            }
                        }
                    }
                    next[[i, j]] = sum;
                }
            }
            w = next;
        }
        w[[0, 0]]
    }
}

/// Builder for randomly (or caller-) initialized TT-Tucker tensors
#[derive(Debug, Clone)]
pub struct TtTuckerBuilder {
    grid_sizes: Vec<usize>,
    tt_ranks: Option<Vec<usize>>,
    uniform_rank: usize,
    embedding_ranks: Option<Vec<usize>>,
    factor_kinds: Option<Vec<FactorKind>>,
    trainable_factors: bool,
    init: CoreInit,
}

impl TtTuckerBuilder {
    pub fn new(grid_sizes: &[usize]) -> Self {
        Self {
            grid_sizes: grid_sizes.to_vec(),
            tt_ranks: None,
            uniform_rank: 1,
            embedding_ranks: None,
            factor_kinds: None,
            trainable_factors: false,
            init: CoreInit::default(),
        }
    }

    /// Same TT-rank on every interior bond
    pub fn uniform_rank(mut self, rank: usize) -> Self {
        self.uniform_rank = rank;
        self.tt_ranks = None;
        self
    }

    /// Interior TT-ranks \[r₁, ..., r_{N-1}\]
    pub fn tt_ranks(mut self, ranks: &[usize]) -> Self {
        self.tt_ranks = Some(ranks.to_vec());
        self
    }

    /// Same embedding rank in every dimension
    pub fn embedding_rank(mut self, rank: usize) -> Self {
        self.embedding_ranks = Some(vec![rank; self.grid_sizes.len()]);
        self
    }

    pub fn embedding_ranks(mut self, ranks: &[usize]) -> Self {
        self.embedding_ranks = Some(ranks.to_vec());
        self
    }

    /// Same factor kind in every dimension
    pub fn factor_kind(mut self, kind: FactorKind) -> Self {
        self.factor_kinds = Some(vec![kind; self.grid_sizes.len()]);
        self
    }

    pub fn factor_kinds(mut self, kinds: &[FactorKind]) -> Self {
        self.factor_kinds = Some(kinds.to_vec());
        self
    }

    pub fn trainable_factors(mut self, trainable: bool) -> Self {
        self.trainable_factors = trainable;
        self
    }

    pub fn init(mut self, init: CoreInit) -> Self {
        self.init = init;
        self
    }

    /// Build the tensor.
    ///
    /// Defaults: uniform TT-rank 1, identity factors (embedding rank equal to
    /// grid size). Dimensions with a single grid point get embedding rank 1.
    ///
    /// # Example
    ///
    /// ```
    /// use ttuck_core::{CoreInit, FactorKind, TtTucker};
    ///
    /// let t: TtTucker<f64> = TtTucker::<f64>::builder(&[32, 32, 32])
    ///     .uniform_rank(3)
    ///     .embedding_rank(2)
    ///     .factor_kind(FactorKind::Legendre)
    ///     .init(CoreInit::Constant(0.1))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(t.rank_chain(), vec![1, 3, 3, 1]);
    /// assert_eq!(t.embedding_ranks(), vec![2, 2, 2]);
    /// ```
    pub fn build<T>(&self) -> TtResult<TtTucker<T>>
    where
        T: Float + 'static,
    {
        let n = self.grid_sizes.len();
        if n == 0 {
            return Err(TtError::configuration("at least one grid dimension is required"));
        }
        if let Some(&g) = self.grid_sizes.iter().find(|&&g| g == 0) {
            return Err(TtError::configuration(format!("grid size {} is not positive", g)));
        }

        let interior = match &self.tt_ranks {
            Some(ranks) => {
                if ranks.len() != n - 1 {
                    return Err(TtError::configuration(format!(
                        "expected {} interior TT-ranks, got {}",
                        n - 1,
                        ranks.len()
                    )));
                }
                ranks.clone()
            }
            None => vec![self.uniform_rank; n - 1],
        };
        if interior.iter().any(|&r| r == 0) {
            return Err(TtError::configuration("TT-ranks must be positive"));
        }
        let mut chain = Vec::with_capacity(n + 1);
        chain.push(1);
        chain.extend(interior);
        chain.push(1);

        let kinds = match &self.factor_kinds {
            Some(kinds) if kinds.len() != n => {
                return Err(TtError::configuration(format!(
                    "expected {} factor kinds, got {}",
                    n,
                    kinds.len()
                )))
            }
            Some(kinds) => kinds.clone(),
            None => vec![FactorKind::Identity; n],
        };

        let embedding = match &self.embedding_ranks {
            Some(ranks) if ranks.len() != n => {
                return Err(TtError::configuration(format!(
                    "expected {} embedding ranks, got {}",
                    n,
                    ranks.len()
                )))
            }
            Some(ranks) => ranks.clone(),
            None => kinds
                .iter()
                .zip(self.grid_sizes.iter())
                .map(|(kind, &g)| match kind {
                    FactorKind::Identity => g,
                    _ => g.min(2),
                })
                .collect(),
        };

        let mut cores = Vec::with_capacity(n);
        let mut factors = Vec::with_capacity(n);
        for dim in 0..n {
            let grid = self.grid_sizes[dim];
            let r_emb = if grid == 1 { 1 } else { embedding[dim] };
            let factor = FactorMatrix::build(kinds[dim], grid, r_emb)?
                .with_trainable(self.trainable_factors);
            let data = self.init.core::<T>(dim, (chain[dim], r_emb, chain[dim + 1]))?;
            cores.push(TtCore::new(data)?);
            factors.push(factor);
        }

        TtTucker::from_parts(cores, factors)
    }
}
