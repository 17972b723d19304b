//! State containers
//!
//! The integrators never look inside a state. Everything they need is
//! captured by [`StateContainer`]: zeroing, the `this += a * other` update,
//! the maximum norm, and transfer of the raw payload through a
//! [`Communicator`]. A [`StateFactory`] hands out correctly sized zero
//! states so a sweeper can allocate its node storage without knowing the
//! spatial representation.
//!
//! # Module Organization
//!
//! - **`vector`**: [`VectorEncapsulation`], a dense `f64` vector backed by
//!   `nalgebra::DVector`, and its [`VectorFactory`]
//! - free functions [`axpy`], [`mat_apply`] and [`mat_apply_into`] combining
//!   slices of states with a quadrature matrix
//!
//! # Matrix application
//!
//! ```text
//! result[n] = Σ_m  a * M[n][m] * x[m]
//! ```
//!
//! This is how node integrals are formed from right-hand side values: `M` is
//! one of the quadrature matrices and `a` the step width.

mod vector;

pub use vector::{VectorEncapsulation, VectorFactory};

use std::fmt;

use nalgebra::DMatrix;

use crate::comm::Communicator;
use crate::error::{Result, ensure_size};

// =================================================================================================
// Capability traits
// =================================================================================================

/// Opaque, arithmetic-capable state
///
/// Cloning must deep-copy the payload: two clones never alias.
pub trait StateContainer: Clone + fmt::Debug + Send + Sync + 'static {
    /// Number of scalar entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set every entry to zero
    fn zero(&mut self);

    /// `self[i] += a * other[i]`
    ///
    /// # Errors
    ///
    /// [`PfasstError::SizeMismatch`](crate::error::PfasstError::SizeMismatch)
    /// when the two containers differ in length.
    fn scaled_add(&mut self, a: f64, other: &Self) -> Result<()>;

    /// Maximum absolute entry, `0.0` for an empty container
    fn norm0(&self) -> f64;

    /// Overwrite the payload with a copy of `other`'s
    fn copy_from(&mut self, other: &Self) -> Result<()>;

    /// Whether every entry is finite
    fn is_finite(&self) -> bool;

    /// Send the raw payload to `dest`
    fn send(&self, comm: &dyn Communicator, dest: usize, tag: i32, blocking: bool) -> Result<()>;

    /// Receive the raw payload from `src`
    ///
    /// A non-blocking call only posts the request and leaves the payload
    /// untouched; the next blocking receive on the same `(src, tag)`
    /// completes it.
    fn recv(&mut self, comm: &dyn Communicator, src: usize, tag: i32, blocking: bool) -> Result<()>;

    /// Replace the payload with the one held by `root`
    fn bcast(&mut self, comm: &dyn Communicator, root: usize) -> Result<()>;
}

/// Source of zero-initialised, correctly sized states for one level
pub trait StateFactory<E: StateContainer>: Send + Sync + fmt::Debug {
    /// A fresh zero state
    fn create(&self) -> E;

    /// Length of the states this factory creates
    fn size(&self) -> usize;

    /// `n` distinct zero states
    fn create_many(&self, n: usize) -> Vec<E> {
        (0..n).map(|_| self.create()).collect()
    }
}

// =================================================================================================
// Free functions
// =================================================================================================

/// Larger of two norms, NaN if either is NaN (unlike `f64::max`)
pub fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
}

/// `a * x + y` as a new state
pub fn axpy<E: StateContainer>(a: f64, x: &E, y: &E) -> Result<E> {
    let mut result = y.clone();
    result.scaled_add(a, x)?;
    Ok(result)
}

/// `result[n] = Σ_m a * matrix[(n, m)] * x[m]` as freshly allocated states
///
/// Each output starts as a zeroed copy of `x[0]`.
///
/// # Errors
///
/// Fails with a size mismatch when `matrix.ncols() != x.len()` or when the
/// entries of `x` differ in length.
pub fn mat_apply<E: StateContainer>(a: f64, matrix: &DMatrix<f64>, x: &[E]) -> Result<Vec<E>> {
    ensure_size("mat_apply", matrix.ncols(), x.len())?;

    let Some(template) = x.first() else {
        return Ok(Vec::new());
    };

    let mut zero = template.clone();
    zero.zero();
    let mut result = vec![zero; matrix.nrows()];
    mat_apply_into(&mut result, a, matrix, x, false)?;
    Ok(result)
}

/// Accumulate `a * matrix * x` into `result`, zeroing it first if asked
pub fn mat_apply_into<E: StateContainer>(
    result: &mut [E],
    a: f64,
    matrix: &DMatrix<f64>,
    x: &[E],
    zero_first: bool,
) -> Result<()> {
    ensure_size("mat_apply rows", matrix.nrows(), result.len())?;
    ensure_size("mat_apply columns", matrix.ncols(), x.len())?;

    for (n, out) in result.iter_mut().enumerate() {
        if zero_first {
            out.zero();
        }
        for (m, value) in x.iter().enumerate() {
            let weight = a * matrix[(n, m)];
            if weight != 0.0 {
                out.scaled_add(weight, value)?;
            }
        }
    }

    Ok(())
}

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Element-wise updates on large states are handed to Rayon when the crate is
// built with the `parallel` feature. The threshold lives in an AtomicUsize so
// benchmarks and tests can move it at runtime; Relaxed ordering is enough
// because the value is a performance hint, not a synchronisation point.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of entries above which element-wise updates run in parallel
const DEFAULT_PARALLEL_THRESHOLD: usize = 999;

static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Current parallel-execution threshold
///
/// ```rust
/// use pfasst_rs::encap::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold
///
/// # Panics
///
/// Panics when `threshold == 0`.
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

#[cfg(test)]
static THRESHOLD_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Saves the threshold on construction and restores it on drop
///
/// Holds a lock for its lifetime so tests touching the threshold never interleave.
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
    _lock: parking_lot::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl ThresholdGuard {
    pub(crate) fn save(new_value: usize) -> Self {
        let lock = THRESHOLD_LOCK.lock();
        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self { previous, _lock: lock }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PfasstError;

    fn vectors(values: &[f64], copies: usize) -> Vec<VectorEncapsulation> {
        (0..copies).map(|_| VectorEncapsulation::from_slice(values)).collect()
    }

    #[test]
    fn test_axpy() {
        let x = VectorEncapsulation::from_slice(&[1.0, 2.0, 3.0]);
        let y = VectorEncapsulation::from_slice(&[1.0, 1.0, 1.0]);

        let result = axpy(0.5, &x, &y).unwrap();
        assert_eq!(result.as_slice(), &[1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_mat_apply_identity() {
        let x = vectors(&[1.0, 2.0, 3.0], 3);
        let result = mat_apply(1.0, &DMatrix::identity(3, 3), &x).unwrap();

        for (out, input) in result.iter().zip(&x) {
            assert_eq!(out.as_slice(), input.as_slice());
        }
    }

    #[test]
    fn test_mat_apply_zero_matrix() {
        let x = vectors(&[1.0, 2.0, 3.0], 3);
        let result = mat_apply(1.0, &DMatrix::zeros(3, 3), &x).unwrap();

        assert!(result.iter().all(|v| v.as_slice() == [0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_mat_apply_ones_sums_inputs() {
        // each output is the sum of the three identical inputs
        let x = vectors(&[1.0, 2.0, 3.0], 3);
        let result = mat_apply(1.0, &DMatrix::from_element(3, 3, 1.0), &x).unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|v| v.as_slice() == [3.0, 6.0, 9.0]));
    }

    #[test]
    fn test_mat_apply_scaling_and_accumulation() {
        let x = vectors(&[1.0, 2.0], 2);
        let mut result = vectors(&[10.0, 10.0], 2);
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);

        mat_apply_into(&mut result, 0.5, &matrix, &x, false).unwrap();
        assert_eq!(result[0].as_slice(), &[10.5, 11.0]);
        assert_eq!(result[1].as_slice(), &[11.0, 12.0]);

        mat_apply_into(&mut result, 0.5, &matrix, &x, true).unwrap();
        assert_eq!(result[0].as_slice(), &[0.5, 1.0]);
    }

    #[test]
    fn test_mat_apply_rejects_wrong_shape() {
        let x = vectors(&[1.0], 2);
        let err = mat_apply(1.0, &DMatrix::identity(3, 3), &x).unwrap_err();
        assert!(matches!(err, PfasstError::SizeMismatch { .. }));
    }

    #[test]
    fn test_threshold_guard_restores_previous_value() {
        let before = {
            let guard = ThresholdGuard::save(42);
            assert_eq!(parallel_threshold(), 42);
            guard.previous
        };
        assert_eq!(before, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    #[should_panic(expected = "parallel threshold must be at least 1")]
    fn test_zero_threshold_panics() {
        set_parallel_threshold(0);
    }
}
