//! Initial values for TT cores
//!
//! Random number generation goes through `scirs2_core::random`; callers
//! that need reproducible cores pass their own value source with
//! [`CoreInit::from_fn`].

use crate::error::{cast, TtError, TtResult};
use scirs2_core::ndarray_ext::Array3;
use scirs2_core::numeric::Float;
use scirs2_core::random::{thread_rng, Distribution, RandNormal as Normal};
use std::fmt;
use std::sync::Arc;

/// Value source signature: (dimension, left, embedding, right) -> value
pub type InitFn = dyn Fn(usize, usize, usize, usize) -> f64 + Send + Sync;

/// Initialization strategy for TT cores
#[derive(Clone)]
pub enum CoreInit {
    /// Entries drawn from N(0, std²)
    RandomNormal { std: f64 },
    /// Every entry equal to the given value
    Constant(f64),
    /// Entries supplied by the caller
    FromFn(Arc<InitFn>),
}

impl CoreInit {
    pub fn random_normal(std: f64) -> Self {
        CoreInit::RandomNormal { std }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize, usize, usize, usize) -> f64 + Send + Sync + 'static,
    {
        CoreInit::FromFn(Arc::new(f))
    }

    /// Produce the core of dimension `dim` with shape (r_left, r_emb, r_right)
    pub fn core<T>(&self, dim: usize, shape: (usize, usize, usize)) -> TtResult<Array3<T>>
    where
        T: Float + 'static,
    {
        match self {
            CoreInit::RandomNormal { std } => {
                if *std <= 0.0 || !std.is_finite() {
                    return Err(TtError::configuration(format!(
                        "random init std must be positive and finite, got {}",
                        std
                    )));
                }
                let normal = Normal::new(0.0, *std)
                    .map_err(|e| TtError::configuration(format!("normal distribution: {}", e)))?;
                let mut rng = thread_rng();
                let values = (0..shape.0 * shape.1 * shape.2)
                    .map(|_| cast::<T>(normal.sample(&mut rng), "random init value"))
                    .collect::<TtResult<Vec<T>>>()?;
                Array3::from_shape_vec(shape, values)
                    .map_err(|e| TtError::configuration(format!("core reshape failed: {}", e)))
            }
            CoreInit::Constant(value) => {
                let v = cast::<T>(*value, "constant init value")?;
                Ok(Array3::from_elem(shape, v))
            }
            CoreInit::FromFn(f) => {
                let mut out = Array3::<T>::zeros(shape);
                for ((a, k, b), slot) in out.indexed_iter_mut() {
                    *slot = cast::<T>(f(dim, a, k, b), "init value")?;
                }
                Ok(out)
            }
        }
    }
}

impl Default for CoreInit {
    fn default() -> Self {
        CoreInit::RandomNormal { std: 1.0 }
    }
}

impl fmt::Debug for CoreInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreInit::RandomNormal { std } => write!(f, "RandomNormal {{ std: {} }}", std),
            CoreInit::Constant(v) => write!(f, "Constant({})", v),
            CoreInit::FromFn(_) => write!(f, "FromFn(..)"),
        }
    }
}
