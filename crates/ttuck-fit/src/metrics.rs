//! Error metrics and the training loss
//!
//! The training loss is the squared relative error
//!
//! ```text
//! loss = ‖y - p‖² / ‖y‖²
//! ```
//!
//! which is smooth in the predictions and has gradient −2(y − p)/‖y‖².

use scirs2_core::ndarray_ext::{ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;
use ttuck_core::{TtError, TtResult, TtTucker};
use ttuck_kernels::{evaluate, evaluate_batch, Discretizer};

fn check_lengths(target: usize, predicted: usize) -> TtResult<()> {
    if target != predicted {
        return Err(TtError::configuration(format!(
            "{} targets but {} predictions",
            target, predicted
        )));
    }
    Ok(())
}

/// (‖y − p‖², ‖y‖²)
pub(crate) fn squared_norms<T: Float>(
    target: ArrayView1<'_, T>,
    predicted: ArrayView1<'_, T>,
) -> (T, T) {
    target
        .iter()
        .zip(predicted.iter())
        .fold((T::zero(), T::zero()), |(res, norm), (&y, &p)| {
            let r = y - p;
            (res + r * r, norm + y * y)
        })
}

pub(crate) fn degenerate<T: Float>(residual_sq: T) -> TtError {
    TtError::DegenerateNorm {
        residual_norm: residual_sq.sqrt().to_f64().unwrap_or(f64::NAN),
    }
}

/// Relative error ‖y − p‖ / ‖y‖.
///
/// An all-zero target gives 0 when the prediction is also all zero.
///
/// # Errors
///
/// - `Configuration` when the lengths differ
/// - `DegenerateNorm` when ‖y‖ = 0 but ‖y − p‖ > 0
///
/// # Example
///
/// ```
/// use scirs2_core::ndarray_ext::array;
/// use ttuck_fit::relative_error;
///
/// let e: f64 = relative_error(array![3.0, 4.0].view(), array![3.0, 0.0].view())?;
/// assert!((e - 0.8).abs() < 1e-12);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn relative_error<T: Float>(
    target: ArrayView1<'_, T>,
    predicted: ArrayView1<'_, T>,
) -> TtResult<T> {
    check_lengths(target.len(), predicted.len())?;
    let (residual, norm) = squared_norms(target, predicted);
    if norm == T::zero() {
        if residual == T::zero() {
            return Ok(T::zero());
        }
        return Err(degenerate(residual));
    }
    Ok((residual / norm).sqrt())
}

/// Training loss: squared relative error of the tensor's predictions at
/// the given multi-indices.
pub fn loss<T>(
    tensor: &TtTucker<T>,
    indices: ArrayView2<'_, usize>,
    targets: ArrayView1<'_, T>,
) -> TtResult<T>
where
    T: Float + Send + Sync + 'static,
{
    let predicted = evaluate_batch(tensor, indices)?;
    let e = relative_error(targets, predicted.view())?;
    Ok(e * e)
}

/// Training loss on real-valued inputs mapped through `discretizer`
pub fn loss_on_inputs<T, D>(
    tensor: &TtTucker<T>,
    inputs: ArrayView2<'_, f64>,
    discretizer: &D,
    targets: ArrayView1<'_, T>,
) -> TtResult<T>
where
    T: Float + Send + Sync + 'static,
    D: Discretizer + ?Sized,
{
    let predicted = evaluate(tensor, inputs, discretizer)?;
    let e = relative_error(targets, predicted.view())?;
    Ok(e * e)
}

/// Root mean squared error; 0 for empty batches
pub fn rmse<T: Float>(target: ArrayView1<'_, T>, predicted: ArrayView1<'_, T>) -> TtResult<T> {
    check_lengths(target.len(), predicted.len())?;
    if target.is_empty() {
        return Ok(T::zero());
    }
    let (residual, _) = squared_norms(target, predicted);
    let n = T::from(target.len())
        .ok_or_else(|| TtError::configuration("batch size not representable"))?;
    Ok((residual / n).sqrt())
}

/// Coefficient of determination 1 − SS_res / SS_tot.
///
/// A constant target gives 1 for an exact prediction and `DegenerateNorm`
/// otherwise.
pub fn r_squared<T: Float>(
    target: ArrayView1<'_, T>,
    predicted: ArrayView1<'_, T>,
) -> TtResult<T> {
    check_lengths(target.len(), predicted.len())?;
    if target.is_empty() {
        return Err(TtError::configuration("r_squared of an empty batch"));
    }
    let n = T::from(target.len())
        .ok_or_else(|| TtError::configuration("batch size not representable"))?;
    let mean = target.iter().fold(T::zero(), |acc, &y| acc + y) / n;
    let ss_tot = target
        .iter()
        .fold(T::zero(), |acc, &y| acc + (y - mean) * (y - mean));
    let (ss_res, _) = squared_norms(target, predicted);
    if ss_tot == T::zero() {
        if ss_res == T::zero() {
            return Ok(T::one());
        }
        return Err(degenerate(ss_res));
    }
    Ok(T::one() - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::{array, Array1};

    #[test]
    fn test_relative_error_identical() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(relative_error(y.view(), y.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_relative_error_zero_target() {
        let zero = array![0.0, 0.0, 0.0];
        assert_eq!(relative_error(zero.view(), zero.view()).unwrap(), 0.0);

        let err = relative_error(zero.view(), array![1.0, 0.0, 0.0].view()).unwrap_err();
        assert_eq!(err, TtError::DegenerateNorm { residual_norm: 1.0 });
    }

    #[test]
    fn test_relative_error_value() {
        let e = relative_error(array![1.0, 0.0].view(), array![0.0, 1.0].view()).unwrap();
        assert!((e - 2f64.sqrt()).abs() < 1e-12);
        assert!(relative_error(array![1.0].view(), array![1.0, 2.0].view()).is_err());
    }

    #[test]
    fn test_rmse_and_r_squared() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.0, 2.0, 3.0, 6.0];
        assert!((rmse(y.view(), p.view()).unwrap() - 1.0).abs() < 1e-12);
        // SS_tot = 5, SS_res = 4
        assert!((r_squared(y.view(), p.view()).unwrap() - 0.2).abs() < 1e-12);

        let flat = array![2.0, 2.0];
        assert_eq!(r_squared(flat.view(), flat.view()).unwrap(), 1.0);
        assert!(r_squared(flat.view(), array![2.0, 3.0].view()).is_err());
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(rmse(empty.view(), empty.view()).unwrap(), 0.0);
    }
}
