//! Closed-form gradients of weighted sums of tensor entries
//!
//! For a batch of multi-indices and per-sample weights wₛ this computes the
//! gradient of
//!
//! ```text
//! Φ = Σₛ wₛ X(iₛ)
//! ```
//!
//! with respect to every trainable parameter. Any loss that depends on the
//! tensor only through its batch predictions reduces to this form with
//! wₛ = ∂loss/∂pₛ.
//!
//! With left partial products L and right partial products R around
//! dimension n:
//!
//! ```text
//! ∂Φ/∂G_n[a, k, b] = Σₛ wₛ L[a] U_n[iₙ, k] R[b]
//! ∂Φ/∂U_n[iₙ, k]   = Σₛ wₛ Σ_{a,b} L[a] G_n[a, k, b] R[b]
//! ```

use crate::gather::{check_indices, ProjectedCores};
use crate::parallel::{fold_samples, ParallelConfig};
use scirs2_core::ndarray_ext::{Array2, Array3, ArrayD, ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;
use ttuck_core::{ParamId, TtError, TtResult, TtTucker};

/// Gradient arrays keyed by parameter, in the tensor's parameter order
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients<T> {
    entries: Vec<(ParamId, ArrayD<T>)>,
}

impl<T> Gradients<T>
where
    T: Float + 'static,
{
    /// Zero gradients for every trainable parameter of `tensor`
    pub fn zeros_for(tensor: &TtTucker<T>) -> TtResult<Self> {
        let entries = tensor
            .trainable_parameters()
            .into_iter()
            .map(|id| Ok((id, ArrayD::zeros(tensor.parameter_shape(id)?))))
            .collect::<TtResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<(ParamId, ArrayD<T>)>) -> Self {
        Self { entries }
    }

    /// Insert or replace the gradient of one parameter
    pub fn insert(&mut self, id: ParamId, grad: ArrayD<T>) {
        match self.entries.iter_mut().find(|(p, _)| *p == id) {
            Some((_, slot)) => *slot = grad,
            None => self.entries.push((id, grad)),
        }
    }

    pub fn get(&self, id: ParamId) -> Option<&ArrayD<T>> {
        self.entries.iter().find(|(p, _)| *p == id).map(|(_, g)| g)
    }

    pub fn get_mut(&mut self, id: ParamId) -> Option<&mut ArrayD<T>> {
        self.entries
            .iter_mut()
            .find(|(p, _)| *p == id)
            .map(|(_, g)| g)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &ArrayD<T>)> {
        self.entries.iter().map(|(p, g)| (*p, g))
    }

    pub fn params(&self) -> Vec<ParamId> {
        self.entries.iter().map(|(p, _)| *p).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Multiply every gradient by `factor`
    pub fn scale(&mut self, factor: T) {
        for (_, g) in self.entries.iter_mut() {
            g.mapv_inplace(|v| v * factor);
        }
    }

    pub fn is_finite(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, g)| g.iter().all(|v| v.is_finite()))
    }

    /// Sum of squares over all entries of all gradients
    pub fn squared_norm(&self) -> T {
        self.entries
            .iter()
            .flat_map(|(_, g)| g.iter())
            .fold(T::zero(), |acc, &v| acc + v * v)
    }

    /// Check that the gradients cover exactly the trainable parameters of
    /// `tensor`, each with the parameter's shape.
    pub fn check_against(&self, tensor: &TtTucker<T>) -> TtResult<()> {
        let trainable = tensor.trainable_parameters();
        for (id, grad) in &self.entries {
            if !trainable.contains(id) {
                return Err(TtError::configuration(format!(
                    "gradient supplied for non-trainable parameter {:?}",
                    id
                )));
            }
            let shape = tensor.parameter_shape(*id)?;
            if grad.shape() != shape.as_slice() {
                return Err(TtError::configuration(format!(
                    "gradient for {:?} has shape {:?}, parameter has {:?}",
                    id,
                    grad.shape(),
                    shape
                )));
            }
        }
        if let Some(missing) = trainable.iter().find(|id| self.get(**id).is_none()) {
            return Err(TtError::configuration(format!(
                "no gradient for trainable parameter {:?}",
                missing
            )));
        }
        Ok(())
    }
}

/// Per-worker partial sums
struct Partial<T> {
    cores: Vec<Array3<T>>,
    factors: Vec<Option<Array2<T>>>,
}

impl<T> Partial<T>
where
    T: Float + 'static,
{
    fn zeros(tensor: &TtTucker<T>) -> Self {
        Self {
            cores: tensor
                .cores()
                .iter()
                .map(|c| Array3::zeros(c.dim()))
                .collect(),
            factors: tensor
                .factors()
                .iter()
                .map(|f| f.is_trainable().then(|| Array2::zeros(f.shape())))
                .collect(),
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.cores.iter_mut().zip(other.cores) {
            a.zip_mut_with(&b, |x, &y| *x = *x + y);
        }
        for (a, b) in self.factors.iter_mut().zip(other.factors) {
            if let (Some(a), Some(b)) = (a.as_mut(), b) {
                a.zip_mut_with(&b, |x, &y| *x = *x + y);
            }
        }
        self
    }

    fn accumulate(
        &mut self,
        tensor: &TtTucker<T>,
        projected: &ProjectedCores<T>,
        index: ArrayView1<'_, usize>,
        weight: T,
    ) {
        let left = projected.left_vectors(index);
        let right = projected.right_vectors(index);

        for dim in 0..tensor.ndim() {
            let i = index[dim];
            let l = &left[dim];
            let r = &right[dim];
            let u = tensor.factor(dim).row(i);
            let core = tensor.core(dim).view();
            let (r_left, r_emb, r_right) = core.dim();

            let d_core = &mut self.cores[dim];
            for a in 0..r_left {
                let wl = weight * l[a];
                for b in 0..r_right {
                    let outer = wl * r[b];
                    for k in 0..r_emb {
                        d_core[[a, k, b]] = d_core[[a, k, b]] + outer * u[k];
                    }
                }
            }

            if let Some(d_factor) = self.factors[dim].as_mut() {
                for k in 0..r_emb {
                    let mut sum = T::zero();
                    for a in 0..r_left {
                        for b in 0..r_right {
                            sum = sum + l[a] * core[[a, k, b]] * r[b];
                        }
                    }
                    d_factor[[i, k]] = d_factor[[i, k]] + weight * sum;
                }
            }
        }
    }

    fn into_gradients(self) -> Gradients<T> {
        let mut entries: Vec<(ParamId, ArrayD<T>)> = self
            .cores
            .into_iter()
            .enumerate()
            .map(|(n, g)| (ParamId::Core(n), g.into_dyn()))
            .collect();
        entries.extend(
            self.factors
                .into_iter()
                .enumerate()
                .filter_map(|(n, g)| g.map(|g| (ParamId::Factor(n), g.into_dyn()))),
        );
        Gradients { entries }
    }
}

/// Gradient of Σₛ wₛ X(iₛ) with respect to all trainable parameters.
///
/// `indices` is (S × N), `weights` has length S. Frozen factors get no entry.
///
/// # Errors
///
/// `Configuration` on a weight/sample count mismatch, `OutOfRange` on a bad
/// index.
pub fn chain_gradient<T>(
    tensor: &TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    weights: ArrayView1<'_, T>,
    config: &ParallelConfig,
) -> TtResult<Gradients<T>>
where
    T: Float + Send + Sync + 'static,
{
    if weights.len() != indices.nrows() {
        return Err(TtError::configuration(format!(
            "{} weights for {} samples",
            weights.len(),
            indices.nrows()
        )));
    }
    let projected = ProjectedCores::new(tensor);
    check_indices(&projected, indices)?;

    let partial = fold_samples(
        indices.nrows(),
        config,
        || Partial::zeros(tensor),
        |mut acc, s| {
            let w = weights[s];
            if w != T::zero() {
                acc.accumulate(tensor, &projected, indices.row(s), w);
            }
            acc
        },
        Partial::merge,
    );
    Ok(partial.into_gradients())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::evaluate_batch;
    use scirs2_core::ndarray_ext::{array, Array1};
    use ttuck_core::{CoreInit, FactorKind};

    fn tensor(trainable: bool) -> TtTucker<f64> {
        TtTucker::<f64>::builder(&[4, 3, 5])
            .tt_ranks(&[2, 2])
            .embedding_rank(3)
            .factor_kind(FactorKind::Legendre)
            .trainable_factors(trainable)
            .init(CoreInit::from_fn(|d, a, k, b| {
                ((d * 11 + a * 7 + k * 3 + b + 2) as f64 * 0.45).sin()
            }))
            .build()
            .unwrap()
    }

    fn weighted_sum(t: &TtTucker<f64>, idx: ArrayView2<usize>, w: &Array1<f64>) -> f64 {
        evaluate_batch(t, idx).unwrap().dot(w)
    }

    #[test]
    fn test_matches_finite_differences() {
        let t = tensor(true);
        let idx = array![[0usize, 1, 2], [3, 2, 4], [1, 0, 0]];
        let w = array![0.5, -1.5, 2.0];
        let sequential = ParallelConfig::sequential();
        let grads = chain_gradient(&t, idx.view(), w.view(), &sequential).unwrap();
        grads.check_against(&t).unwrap();
        assert_eq!(grads.len(), 6);

        let eps = 1e-6;
        for (id, grad) in grads.iter() {
            for (pos, &g) in grad.indexed_iter() {
                let mut plus = t.clone();
                plus.parameter_view_mut(id).unwrap()[&pos] += eps;
                let mut minus = t.clone();
                minus.parameter_view_mut(id).unwrap()[&pos] -= eps;
                let up = weighted_sum(&plus, idx.view(), &w);
                let down = weighted_sum(&minus, idx.view(), &w);
                let fd = (up - down) / (2.0 * eps);
                assert!(
                    (fd - g).abs() < 1e-6,
                    "{:?} {:?}: fd {} vs analytic {}",
                    id,
                    pos,
                    fd,
                    g
                );
            }
        }
    }

    #[test]
    fn test_frozen_factors_have_no_gradient() {
        let t = tensor(false);
        let idx = array![[0usize, 0, 0]];
        let w = array![1.0];
        let grads = chain_gradient(&t, idx.view(), w.view(), &ParallelConfig::default()).unwrap();
        assert_eq!(
            grads.params(),
            vec![ParamId::Core(0), ParamId::Core(1), ParamId::Core(2)]
        );
        assert!(grads.get(ParamId::Factor(0)).is_none());
    }

    #[test]
    fn test_parallel_reduction_matches_sequential() {
        let t = tensor(true);
        let idx = Array2::from_shape_fn((700, 3), |(s, n)| (s * 7 + n * 3) % [4, 3, 5][n]);
        let w = Array1::from_shape_fn(700, |s| ((s % 13) as f64 - 6.0) / 10.0);
        let seq = chain_gradient(&t, idx.view(), w.view(), &ParallelConfig::sequential()).unwrap();
        let par = chain_gradient(
            &t,
            idx.view(),
            w.view(),
            &ParallelConfig::default().with_min_parallel_batch(1),
        )
        .unwrap();
        for ((_, a), (_, b)) in seq.iter().zip(par.iter()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_weight_count_mismatch() {
        let t = tensor(false);
        let idx = array![[0usize, 0, 0], [1, 1, 1]];
        let w = array![1.0];
        assert!(matches!(
            chain_gradient(&t, idx.view(), w.view(), &ParallelConfig::default()),
            Err(TtError::Configuration(_))
        ));
    }

    #[test]
    fn test_check_against_rejects_bad_shapes() {
        let t = tensor(false);
        let mut grads = Gradients::zeros_for(&t).unwrap();
        grads.check_against(&t).unwrap();
        grads.insert(ParamId::Core(1), ArrayD::zeros(vec![2, 2]));
        assert!(grads.check_against(&t).is_err());

        let mut grads = Gradients::zeros_for(&t).unwrap();
        grads.insert(ParamId::Factor(0), ArrayD::zeros(vec![4, 3]));
        assert!(grads.check_against(&t).is_err());

        let grads = Gradients::<f64>::from_entries(vec![]);
        assert!(grads.check_against(&t).is_err());
    }
}
