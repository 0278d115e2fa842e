//! First-order optimizers for TT-Tucker parameters
//!
//! Each trainable parameter array (a core, or an unfrozen factor matrix) gets
//! its own optimizer instance holding that array's state.
//!
//! # Optimizers
//!
//! - **Sgd**: gradient descent with optional (Nesterov) momentum
//! - **Adam**: Adaptive Moment Estimation with bias correction
//!
//! # Example
//!
//! ```rust
//! use scirs2_core::ndarray_ext::ArrayD;
//! use ttuck_fit::optimizers::{Adam, Optimizer, OptimizerConfig};
//!
//! let mut params = ArrayD::<f64>::ones(vec![2, 3]);
//! let grads = ArrayD::<f64>::ones(vec![2, 3]);
//!
//! let mut optimizer = Adam::new(OptimizerConfig::adam().learning_rate(0.1));
//! optimizer.step(params.view_mut(), &grads)?;
//! assert!((params[[0, 0]] - 0.9).abs() < 1e-6);
//! # Ok::<(), anyhow::Error>(())
//! ```

use scirs2_core::ndarray_ext::{ArrayD, ArrayViewMutD, Zip};
use scirs2_core::numeric::Float;
use serde::{Deserialize, Serialize};
use ttuck_core::{cast, TtError, TtResult};

/// Which update rule the fitting loop uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

/// Configuration for optimizers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Momentum coefficient (for SGD)
    pub momentum: f64,
    /// Nesterov momentum (for SGD)
    pub nesterov: bool,
    /// Beta1 for Adam
    pub beta1: f64,
    /// Beta2 for Adam
    pub beta2: f64,
    /// Epsilon for numerical stability
    pub epsilon: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam()
    }
}

impl OptimizerConfig {
    /// Create SGD configuration
    pub fn sgd() -> Self {
        Self {
            learning_rate: 0.01,
            momentum: 0.0,
            nesterov: false,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    /// Create Adam configuration
    pub fn adam() -> Self {
        Self {
            learning_rate: 0.01,
            ..Self::sgd()
        }
    }

    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn momentum(mut self, m: f64) -> Self {
        self.momentum = m;
        self
    }

    /// Enable Nesterov momentum
    pub fn nesterov(mut self) -> Self {
        self.nesterov = true;
        self
    }

    pub fn beta1(mut self, b1: f64) -> Self {
        self.beta1 = b1;
        self
    }

    pub fn beta2(mut self, b2: f64) -> Self {
        self.beta2 = b2;
        self
    }

    pub fn epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    /// Reject settings no update rule can work with
    pub fn validate(&self) -> TtResult<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(TtError::configuration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(TtError::configuration(format!(
                "momentum must lie in [0, 1), got {}",
                self.momentum
            )));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(TtError::configuration(format!(
                "Adam betas must lie in [0, 1), got ({}, {})",
                self.beta1, self.beta2
            )));
        }
        if self.epsilon <= 0.0 || !self.epsilon.is_finite() {
            return Err(TtError::configuration(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Optimizer trait for parameter updates
pub trait Optimizer<T: Float>: Send {
    /// Perform single optimization step, updating `params` in place
    fn step(&mut self, params: ArrayViewMutD<'_, T>, gradients: &ArrayD<T>) -> TtResult<()>;

    /// Reset optimizer state
    fn reset(&mut self);

    /// Number of steps performed
    fn num_steps(&self) -> usize;
}

fn check_shape<T>(params: &ArrayViewMutD<'_, T>, gradients: &ArrayD<T>) -> TtResult<()> {
    if params.shape() != gradients.shape() {
        return Err(TtError::configuration(format!(
            "gradient shape {:?} does not match parameter shape {:?}",
            gradients.shape(),
            params.shape()
        )));
    }
    Ok(())
}

/// Gradient descent with optional momentum
#[derive(Debug, Clone)]
pub struct Sgd<T: Float> {
    config: OptimizerConfig,
    velocity: Option<ArrayD<T>>,
    step_count: usize,
}

impl<T: Float + 'static> Sgd<T> {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            velocity: None,
            step_count: 0,
        }
    }
}

impl<T: Float + Send + 'static> Optimizer<T> for Sgd<T> {
    fn step(&mut self, params: ArrayViewMutD<'_, T>, gradients: &ArrayD<T>) -> TtResult<()> {
        check_shape(&params, gradients)?;
        let lr: T = cast(self.config.learning_rate, "learning rate")?;

        if self.config.momentum > 0.0 {
            let momentum: T = cast(self.config.momentum, "momentum")?;
            let nesterov = self.config.nesterov;
            // v = momentum * v + grad
            let velocity = self
                .velocity
                .get_or_insert_with(|| ArrayD::zeros(gradients.raw_dim()));
            check_shape(&velocity.view_mut(), gradients)?;
            Zip::from(params)
                .and(velocity)
                .and(gradients)
                .for_each(|p, v, &g| {
                    *v = momentum * *v + g;
                    let direction = if nesterov { g + momentum * *v } else { *v };
                    *p = *p - lr * direction;
                });
        } else {
            Zip::from(params)
                .and(gradients)
                .for_each(|p, &g| *p = *p - lr * g);
        }

        self.step_count += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.velocity = None;
        self.step_count = 0;
    }

    fn num_steps(&self) -> usize {
        self.step_count
    }
}

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Debug, Clone)]
pub struct Adam<T: Float> {
    config: OptimizerConfig,
    m: Option<ArrayD<T>>, // First moment estimate
    v: Option<ArrayD<T>>, // Second moment estimate
    step_count: usize,
}

impl<T: Float + 'static> Adam<T> {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            m: None,
            v: None,
            step_count: 0,
        }
    }
}

impl<T: Float + Send + 'static> Optimizer<T> for Adam<T> {
    fn step(&mut self, params: ArrayViewMutD<'_, T>, gradients: &ArrayD<T>) -> TtResult<()> {
        check_shape(&params, gradients)?;
        let lr: T = cast(self.config.learning_rate, "learning rate")?;
        let beta1: T = cast(self.config.beta1, "beta1")?;
        let beta2: T = cast(self.config.beta2, "beta2")?;
        let epsilon: T = cast(self.config.epsilon, "epsilon")?;

        let m = self.m.get_or_insert_with(|| ArrayD::zeros(gradients.raw_dim()));
        let v = self.v.get_or_insert_with(|| ArrayD::zeros(gradients.raw_dim()));
        if m.shape() != gradients.shape() || v.shape() != gradients.shape() {
            return Err(TtError::configuration(
                "optimizer state was built for a parameter of another shape",
            ));
        }

        self.step_count += 1;

        // Bias correction
        let t = self.step_count as i32;
        let bias1: T = cast(1.0 - self.config.beta1.powi(t), "beta1 bias correction")?;
        let bias2: T = cast(1.0 - self.config.beta2.powi(t), "beta2 bias correction")?;
        let one = T::one();

        Zip::from(params)
            .and(m)
            .and(v)
            .and(gradients)
            .for_each(|p, m, v, &g| {
                *m = beta1 * *m + (one - beta1) * g;
                *v = beta2 * *v + (one - beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p = *p - lr * m_hat / (v_hat.sqrt() + epsilon);
            });

        Ok(())
    }

    fn reset(&mut self) {
        self.m = None;
        self.v = None;
        self.step_count = 0;
    }

    fn num_steps(&self) -> usize {
        self.step_count
    }
}

/// Fresh optimizer of the given kind
pub fn build_optimizer<T>(kind: OptimizerKind, config: OptimizerConfig) -> Box<dyn Optimizer<T>>
where
    T: Float + Send + 'static,
{
    match kind {
        OptimizerKind::Sgd => Box::new(Sgd::<T>::new(config)),
        OptimizerKind::Adam => Box::new(Adam::<T>::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgd_plain_step() {
        let mut params = ArrayD::<f64>::from_elem(vec![3], 1.0);
        let grads = ArrayD::<f64>::from_elem(vec![3], 2.0);
        let mut opt = Sgd::new(OptimizerConfig::sgd().learning_rate(0.25));
        opt.step(params.view_mut(), &grads).unwrap();
        assert!(params.iter().all(|&p| (p - 0.5).abs() < 1e-12));
        assert_eq!(opt.num_steps(), 1);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut params = ArrayD::<f64>::zeros(vec![1]);
        let grads = ArrayD::<f64>::from_elem(vec![1], 1.0);
        let mut opt = Sgd::new(OptimizerConfig::sgd().learning_rate(1.0).momentum(0.5));
        opt.step(params.view_mut(), &grads).unwrap();
        assert!((params[[0]] + 1.0).abs() < 1e-12);
        // v = 0.5 * 1 + 1
        opt.step(params.view_mut(), &grads).unwrap();
        assert!((params[[0]] + 2.5).abs() < 1e-12);

        opt.reset();
        assert_eq!(opt.num_steps(), 0);
    }

    #[test]
    fn test_adam_first_step_is_lr_sized() {
        // bias-corrected first step moves every coordinate by ~lr * sign(g)
        let mut params = ArrayD::<f64>::zeros(vec![2, 2]);
        let grads = ArrayD::from_shape_vec(vec![2, 2], vec![3.0, -0.1, 20.0, -7.0]).unwrap();
        let mut opt = Adam::new(OptimizerConfig::adam().learning_rate(0.01));
        opt.step(params.view_mut(), &grads).unwrap();
        for (p, g) in params.iter().zip(grads.iter()) {
            assert!((p + 0.01 * g.signum()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        // f(x) = (x - 3)²
        let mut x = ArrayD::<f64>::zeros(vec![1]);
        let mut opt = Adam::new(OptimizerConfig::adam().learning_rate(0.1));
        for _ in 0..500 {
            let g = x.mapv(|v| 2.0 * (v - 3.0));
            opt.step(x.view_mut(), &g).unwrap();
        }
        assert!((x[[0]] - 3.0).abs() < 1e-2);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut params = ArrayD::<f64>::zeros(vec![2]);
        let grads = ArrayD::<f64>::zeros(vec![3]);
        let mut opt = build_optimizer::<f64>(OptimizerKind::Adam, OptimizerConfig::default());
        assert!(opt.step(params.view_mut(), &grads).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(OptimizerConfig::default().validate().is_ok());
        let zero_lr = OptimizerConfig::sgd().learning_rate(0.0);
        assert!(zero_lr.validate().is_err());
        assert!(OptimizerConfig::sgd().momentum(1.0).validate().is_err());
        assert!(OptimizerConfig::adam().beta2(1.5).validate().is_err());
        assert!(OptimizerConfig::adam().epsilon(0.0).validate().is_err());
    }

    #[test]
    fn test_config_serde() {
        let config: OptimizerConfig = serde_json::from_str(r#"{"learning_rate": 0.05}"#).unwrap();
        assert_eq!(config, OptimizerConfig::adam().learning_rate(0.05));
    }
}
