//! The optimizer loop
//!
//! [`fit_with_oracle`] drives a TT-Tucker tensor towards the training
//! targets. Each iteration asks the oracle for the loss and gradients at the
//! current parameters, decides whether to stop, and otherwise applies one
//! optimizer step to every trainable parameter array.
//!
//! Stop conditions, in the order they are checked:
//!
//! 1. non-finite loss or a numerical oracle error → [`TerminationReason::Aborted`]
//! 2. relative loss decrease below `tolerance` → [`TerminationReason::Converged`]
//! 3. `max_iterations` steps taken → [`TerminationReason::MaxIterReached`]
//! 4. a [`StopHandle`] was triggered → [`TerminationReason::Cancelled`]
//! 5. the wall-clock budget ran out → [`TerminationReason::TimeBudgetExhausted`]
//!
//! The returned tensor is the lowest-loss state the loop evaluated, whatever
//! the reason for stopping.

use crate::metrics::relative_error;
use crate::optimizers::{build_optimizer, Optimizer, OptimizerConfig, OptimizerKind};
use crate::oracle::{AnalyticGradient, GradientOracle};
use scirs2_core::ndarray_ext::{ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ttuck_core::{ParamId, TtError, TtResult, TtTucker};
use ttuck_kernels::{check_indices, evaluate_projected, Discretizer, ParallelConfig, ProjectedCores};

/// Settings for one fit call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Stop once |loss_prev − loss| / loss_prev falls below this
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Overrides the learning rate in `optimizer_config`
    pub learning_rate: f64,
    /// Progress is logged every this many iterations
    pub log_every: usize,
    pub optimizer: OptimizerKind,
    pub optimizer_config: OptimizerConfig,
    /// Wall-clock limit checked between iterations
    pub time_budget: Option<Duration>,
    /// Validation error is computed every this many iterations
    pub validate_every: Option<usize>,
    #[serde(skip)]
    pub parallel: ParallelConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 10_000,
            learning_rate: 1e-2,
            log_every: 500,
            optimizer: OptimizerKind::Adam,
            optimizer_config: OptimizerConfig::adam(),
            time_budget: None,
            validate_every: None,
            parallel: ParallelConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn log_every(mut self, k: usize) -> Self {
        self.log_every = k;
        self
    }

    /// Optimizer kind with its default hyperparameters
    pub fn optimizer(mut self, kind: OptimizerKind) -> Self {
        self.optimizer = kind;
        self.optimizer_config = match kind {
            OptimizerKind::Sgd => OptimizerConfig::sgd(),
            OptimizerKind::Adam => OptimizerConfig::adam(),
        };
        self
    }

    pub fn optimizer_config(mut self, config: OptimizerConfig) -> Self {
        self.optimizer_config = config;
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn validate_every(mut self, k: usize) -> Self {
        self.validate_every = Some(k);
        self
    }

    pub fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Hyperparameters actually handed to the optimizers
    pub fn effective_optimizer_config(&self) -> OptimizerConfig {
        self.optimizer_config
            .clone()
            .learning_rate(self.learning_rate)
    }

    /// Reject settings the loop cannot run with.
    ///
    /// # Errors
    ///
    /// `Configuration` for a non-positive tolerance or learning rate, zero
    /// `max_iterations`, `log_every` or `validate_every`, or invalid
    /// optimizer hyperparameters.
    pub fn validate(&self) -> TtResult<()> {
        if self.tolerance <= 0.0 || !self.tolerance.is_finite() {
            return Err(TtError::configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(TtError::configuration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iterations == 0 {
            return Err(TtError::configuration("max_iterations must be at least 1"));
        }
        if self.log_every == 0 {
            return Err(TtError::configuration("log_every must be at least 1"));
        }
        if self.validate_every == Some(0) {
            return Err(TtError::configuration("validate_every must be at least 1"));
        }
        self.effective_optimizer_config().validate()
    }
}

/// Cloneable flag another thread can use to stop a running fit.
///
/// The loop checks it between iterations, so the fit returns after the
/// step in flight completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a fit stopped
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationReason {
    /// Relative loss improvement fell below the tolerance
    Converged,
    /// Iteration budget exhausted; not an error
    MaxIterReached,
    /// Stopped through a [`StopHandle`]
    Cancelled,
    /// Wall-clock budget exhausted
    TimeBudgetExhausted,
    /// Numerical failure (`DegenerateNorm` or `NumericalDivergence`)
    Aborted(TtError),
}

impl TerminationReason {
    pub fn is_aborted(&self) -> bool {
        matches!(self, TerminationReason::Aborted(_))
    }
}

/// Held-out data evaluated between iterations
#[derive(Debug, Clone, Copy)]
pub struct ValidationSet<'a, T> {
    pub indices: ArrayView2<'a, usize>,
    pub targets: ArrayView1<'a, T>,
}

impl<'a, T> ValidationSet<'a, T> {
    pub fn new(indices: ArrayView2<'a, usize>, targets: ArrayView1<'a, T>) -> Self {
        Self { indices, targets }
    }
}

/// Callback run after every loss evaluation
pub type IterationHook<'a, T> = dyn Fn(&FitState<T>) + 'a;

/// Optional hooks into a running fit
#[derive(Clone)]
pub struct FitControl<'a, T> {
    pub stop: Option<StopHandle>,
    pub validation: Option<ValidationSet<'a, T>>,
    /// Sees the state after each recorded loss, before the stop checks
    pub on_iteration: Option<&'a IterationHook<'a, T>>,
}

impl<T> Default for FitControl<'_, T> {
    fn default() -> Self {
        Self {
            stop: None,
            validation: None,
            on_iteration: None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FitControl<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitControl")
            .field("stop", &self.stop)
            .field("validation", &self.validation)
            .field("on_iteration", &self.on_iteration.map(|_| ".."))
            .finish()
    }
}

impl<'a, T> FitControl<'a, T> {
    pub fn with_stop(mut self, handle: StopHandle) -> Self {
        self.stop = Some(handle);
        self
    }

    pub fn with_validation(mut self, validation: ValidationSet<'a, T>) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_hook(mut self, hook: &'a IterationHook<'a, T>) -> Self {
        self.on_iteration = Some(hook);
        self
    }
}

/// Outcome of a fit
#[derive(Debug, Clone)]
pub struct FitResult<T> {
    /// Lowest-loss parameters seen
    pub final_tensor: TtTucker<T>,
    /// Optimizer steps taken
    pub iterations_run: usize,
    /// Loss of `final_tensor`
    pub final_loss: T,
    pub termination: TerminationReason,
    /// Loss of every evaluated state, starting with the initial tensor
    pub loss_history: Vec<T>,
    /// (iteration, validation relative error)
    pub validation_history: Vec<(usize, T)>,
    pub elapsed: Duration,
}

impl<T> FitResult<T> {
    pub fn converged(&self) -> bool {
        self.termination == TerminationReason::Converged
    }

    /// `Err` for an aborted fit, the result itself otherwise
    pub fn into_result(self) -> TtResult<Self> {
        match &self.termination {
            TerminationReason::Aborted(err) => Err(err.clone()),
            _ => Ok(self),
        }
    }
}

/// Loop bookkeeping carried from one iteration to the next
#[derive(Debug)]
pub struct FitState<T> {
    iteration: usize,
    loss: T,
    previous_loss: Option<T>,
    started: Instant,
    best: TtTucker<T>,
    best_loss: T,
    loss_history: Vec<T>,
    validation_history: Vec<(usize, T)>,
}

impl<T> FitState<T>
where
    T: Float + 'static,
{
    fn new(tensor: TtTucker<T>) -> Self {
        Self {
            iteration: 0,
            loss: T::nan(),
            previous_loss: None,
            started: Instant::now(),
            best: tensor,
            best_loss: T::nan(),
            loss_history: Vec::new(),
            validation_history: Vec::new(),
        }
    }

    /// Optimizer steps taken so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Loss of the current parameters
    pub fn loss(&self) -> T {
        self.loss
    }

    pub fn previous_loss(&self) -> Option<T> {
        self.previous_loss
    }

    pub fn best_loss(&self) -> T {
        self.best_loss
    }

    pub fn best_tensor(&self) -> &TtTucker<T> {
        &self.best
    }

    pub fn loss_history(&self) -> &[T] {
        &self.loss_history
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn record(&mut self, tensor: &TtTucker<T>, loss: T) {
        self.previous_loss = self.loss_history.last().copied();
        self.loss = loss;
        if self.loss_history.is_empty() || loss < self.best_loss {
            self.best.clone_from(tensor);
            self.best_loss = loss;
        }
        self.loss_history.push(loss);
    }

    fn converged(&self, tolerance: T) -> bool {
        if self.loss == T::zero() {
            return true;
        }
        match self.previous_loss {
            Some(prev) if prev > T::zero() => (prev - self.loss).abs() / prev < tolerance,
            _ => false,
        }
    }

    fn finish(self, termination: TerminationReason) -> FitResult<T> {
        FitResult {
            final_tensor: self.best,
            iterations_run: self.iteration,
            final_loss: self.best_loss,
            termination,
            loss_history: self.loss_history,
            validation_history: self.validation_history,
            elapsed: self.started.elapsed(),
        }
    }
}

fn as_f64<T: Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn check_samples<T>(
    projected: &ProjectedCores<T>,
    indices: ArrayView2<'_, usize>,
    targets: ArrayView1<'_, T>,
    what: &str,
) -> TtResult<()>
where
    T: Float + 'static,
{
    if targets.len() != indices.nrows() {
        return Err(TtError::configuration(format!(
            "{} {} targets for {} samples",
            targets.len(),
            what,
            indices.nrows()
        )));
    }
    check_indices(projected, indices)
}

/// Fit with the closed-form gradient of the squared relative error.
///
/// # Example
///
/// ```rust
/// use scirs2_core::ndarray_ext::{Array1, Array2};
/// use ttuck_core::{CoreInit, FactorKind, TtTucker};
/// use ttuck_fit::{fit, FitConfig, TerminationReason};
///
/// let t: TtTucker<f64> = TtTucker::<f64>::builder(&[4, 4])
///     .uniform_rank(2)
///     .embedding_rank(2)
///     .factor_kind(FactorKind::Legendre)
///     .init(CoreInit::random_normal(0.5))
///     .build()?;
/// let idx = Array2::from_shape_fn((16, 2), |(s, n)| if n == 0 { s / 4 } else { s % 4 });
/// let y = Array1::from_shape_fn(16, |s| 1.0 + (s / 4) as f64);
///
/// let result = fit(t, idx.view(), y.view(), &FitConfig::default().max_iterations(50))?;
/// assert!(result.iterations_run <= 50);
/// assert!(!matches!(result.termination, TerminationReason::Aborted(_)));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn fit<T>(
    tensor: TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    targets: ArrayView1<'_, T>,
    config: &FitConfig,
) -> TtResult<FitResult<T>>
where
    T: Float + Send + Sync + 'static,
{
    let oracle = AnalyticGradient::new(config.parallel);
    let control = FitControl::default();
    fit_with_oracle(tensor, indices, targets, config, &oracle, &control)
}

/// Fit on real-valued features mapped to grid indices by `discretizer`
pub fn fit_inputs<T, D>(
    tensor: TtTucker<T>,
    inputs: ArrayView2<'_, f64>,
    discretizer: &D,
    targets: ArrayView1<'_, T>,
    config: &FitConfig,
) -> TtResult<FitResult<T>>
where
    T: Float + Send + Sync + 'static,
    D: Discretizer + ?Sized,
{
    let indices = discretizer.discretize(inputs)?;
    fit(tensor, indices.view(), targets, config)
}

/// Fit with a caller-supplied gradient oracle and loop controls.
///
/// # Errors
///
/// Invalid settings, mismatched sample counts, out-of-range indices, an
/// all-zero validation target and non-numerical oracle failures are
/// returned as `Err` before or instead of fitting. Numerical failures end
/// the fit with [`TerminationReason::Aborted`] and the best tensor seen.
pub fn fit_with_oracle<T, O>(
    tensor: TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    targets: ArrayView1<'_, T>,
    config: &FitConfig,
    oracle: &O,
    control: &FitControl<'_, T>,
) -> TtResult<FitResult<T>>
where
    T: Float + Send + Sync + 'static,
    O: GradientOracle<T> + ?Sized,
{
    config.validate()?;
    if indices.nrows() == 0 {
        return Err(TtError::configuration("empty training set"));
    }
    let projected = ProjectedCores::new(&tensor);
    check_samples(&projected, indices, targets, "training")?;
    if let Some(validation) = &control.validation {
        check_samples(
            &projected,
            validation.indices,
            validation.targets,
            "validation",
        )?;
        if validation.targets.iter().all(|&y| y == T::zero()) {
            return Err(TtError::configuration("validation targets are all zero"));
        }
    }

    let tolerance: T = ttuck_core::cast(config.tolerance, "tolerance")?;
    let optimizer_config = config.effective_optimizer_config();
    let mut optimizers: Vec<(ParamId, Box<dyn Optimizer<T>>)> = tensor
        .trainable_parameters()
        .into_iter()
        .map(|id| (id, build_optimizer(config.optimizer, optimizer_config.clone())))
        .collect();

    debug!(
        oracle = oracle.name(),
        samples = indices.nrows(),
        parameters = optimizers.len(),
        optimizer = ?config.optimizer,
        "starting fit"
    );

    let mut state = FitState::new(tensor.clone());
    let mut tensor = tensor;

    let termination = loop {
        let (loss, grads) = match oracle.loss_and_gradients(&tensor, indices, targets) {
            Ok(value) => value,
            Err(err) if err.is_numerical() => {
                warn!(iteration = state.iteration, error = %err, "fit aborted");
                break TerminationReason::Aborted(err);
            }
            Err(err) => return Err(err),
        };
        if !loss.is_finite() {
            let err = TtError::divergence(state.iteration, format!("loss became {}", as_f64(loss)));
            warn!(iteration = state.iteration, error = %err, "fit diverged");
            break TerminationReason::Aborted(err);
        }
        state.record(&tensor, loss);
        if let Some(hook) = control.on_iteration {
            hook(&state);
        }

        if state.converged(tolerance) {
            debug!(
                iteration = state.iteration,
                loss = as_f64(loss),
                "converged"
            );
            break TerminationReason::Converged;
        }
        if state.iteration >= config.max_iterations {
            break TerminationReason::MaxIterReached;
        }
        if control.stop.as_ref().is_some_and(StopHandle::is_stopped) {
            warn!(iteration = state.iteration, "fit cancelled");
            break TerminationReason::Cancelled;
        }
        if let Some(budget) = config.time_budget {
            if state.elapsed() >= budget {
                warn!(
                    iteration = state.iteration,
                    budget_ms = budget.as_millis() as u64,
                    "time budget exhausted"
                );
                break TerminationReason::TimeBudgetExhausted;
            }
        }
        if !grads.is_finite() {
            let err = TtError::divergence(state.iteration, "non-finite gradient");
            warn!(iteration = state.iteration, error = %err, "fit diverged");
            break TerminationReason::Aborted(err);
        }
        grads.check_against(&tensor)?;

        for (id, optimizer) in optimizers.iter_mut() {
            let grad = grads
                .get(*id)
                .ok_or_else(|| TtError::configuration(format!("missing gradient for {:?}", id)))?;
            optimizer.step(tensor.parameter_view_mut(*id)?, grad)?;
        }
        state.iteration += 1;

        let validation_error = match (&control.validation, config.validate_every) {
            (Some(validation), Some(every)) if state.iteration % every == 0 => {
                let predicted = evaluate_projected(
                    &ProjectedCores::new(&tensor),
                    validation.indices,
                    &config.parallel,
                )?;
                let error = relative_error(validation.targets, predicted.view())?;
                state.validation_history.push((state.iteration, error));
                Some(as_f64(error))
            }
            _ => None,
        };

        if state.iteration % config.log_every == 0 {
            info!(
                iteration = state.iteration,
                loss = as_f64(loss),
                elapsed_ms = state.elapsed().as_millis() as u64,
                validation_error,
                "fit progress"
            );
        }
    };

    let result = state.finish(termination);
    debug!(
        iterations = result.iterations_run,
        loss = as_f64(result.final_loss),
        termination = ?result.termination,
        "fit finished"
    );
    Ok(result)
}
