//! Export of run results
//!
//! The [`Exporter`] trait abstracts the file format; each format lives in its
//! own sub-module.
//!
//! | Format  | Module   |
//! |---------|----------|
//! | CSV     | [`csv`]  |

pub mod csv;

pub use csv::{CsvConfig, CsvExporter, CsvMetadata};

use std::path::Path;

use crate::controller::SimulationResult;
use crate::encap::StateContainer;
use crate::error::Result;

/// A file format for [`SimulationResult`]s
///
/// # Parameter `n_points`
///
/// - `None`: every recorded time point
/// - `Some(n)`: `n` uniformly spaced time points, always including the
///   initial condition and the final state
pub trait Exporter {
    /// One row per time step: step index, end time, iterations, residuals, convergence
    ///
    /// # Errors
    ///
    /// [`PfasstError::Export`](crate::error::PfasstError::Export) when no
    /// step was recorded, `Io` when the file can not be written.
    fn export_history<E: StateContainer>(&self, result: &SimulationResult<E>, path: impl AsRef<Path>) -> Result<()>;

    /// One row per time point with every state entry as a column
    ///
    /// # Errors
    ///
    /// [`PfasstError::Export`](crate::error::PfasstError::Export) for an
    /// empty trajectory, states of different lengths or NaN/Inf values.
    fn export_trajectory<E>(
        &self,
        result: &SimulationResult<E>,
        n_points: Option<usize>,
        path: impl AsRef<Path>,
    ) -> Result<()>
    where
        E: StateContainer + AsRef<[f64]>;
}

/// Indices of `n_points` uniformly spaced entries out of `len`, first and last included
pub(crate) fn downsample_indices(len: usize, n_points: Option<usize>) -> Vec<usize> {
    match n_points {
        Some(n) if n >= 2 && n < len => {
            let mut indices: Vec<usize> = (0..n)
                .map(|i| ((i * (len - 1)) as f64 / (n - 1) as f64).round() as usize)
                .collect();
            indices.dedup();
            indices
        }
        _ => (0..len).collect(),
    }
}
