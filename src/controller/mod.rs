//! Controllers driving sweepers through time
//!
//! # Core Concepts
//!
//! A [`Controller`] holds everything the algorithms share: the [`Status`],
//! the levels (coarsest first), the transfer between two levels, an optional
//! communicator and the observer receiving progress events. It implements
//! the configuration checks and the two advance operations:
//!
//! - `advance_time(n)`: move the clock `n` steps forward and roll every
//!   level over, or return `false` without touching anything when `t_end`
//!   would be exceeded
//! - `advance_iteration()`: bump the iteration counter, or return `false`
//!   when `max_iterations` would be exceeded
//!
//! A rejected advance is a plain `false`, consumed by the run loops.
//!
//! # Integrators
//!
//! The algorithms wrap a controller and implement [`TimeIntegrator`]:
//!
//! | Integrator          | Levels | Ranks | Per iteration                                   |
//! |---------------------|--------|-------|-------------------------------------------------|
//! | [`Sdc`]             | 1      | 1     | sweep                                           |
//! | [`TwoLevelMlsdc`]   | 2      | 1     | cycle down, sweep coarse, cycle up, sweep fine  |
//! | [`TwoLevelPfasst`]  | 2      | any   | as MLSDC, plus exchange with neighbour ranks    |
//!
//! # Phases and `Status::state`
//!
//! ```text
//! UNKNOWN → PREDICTING → PRE/ITER/POST_ITER_COARSE → PRE/ITER/POST_ITER_FINE
//!         → ITERATING → ... → CONVERGED
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pfasst_rs::prelude::*;
//!
//! let problem = Dahlquist::new(-0.5, -1.0);
//! let initial = problem.initial_state();
//!
//! let mut sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
//!     .with_quadrature(quadrature_factory(3, QuadratureType::GaussRadau).unwrap());
//! sweeper.set_abs_residual_tol(1e-12);
//!
//! let mut sdc = Sdc::new();
//! sdc.controller_mut().add_sweeper(sweeper, false);
//! let status = sdc.controller_mut().status_mut();
//! status.set_dt(0.1);
//! status.set_t_end(0.5);
//! status.set_max_iterations(10);
//!
//! sdc.setup().unwrap();
//! *sdc.controller_mut().finest_mut().unwrap().initial_state_mut() = initial;
//! let result = sdc.run().unwrap();
//!
//! assert_eq!(result.num_steps(), 5);
//! assert!((result.final_state[0] - (-1.5_f64 * 0.5).exp()).abs() < 1e-8);
//! ```

mod levels;
mod mlsdc;
pub mod observer;
mod pfasst;
pub mod result;
mod sdc;
pub mod status;

pub use mlsdc::TwoLevelMlsdc;
pub use observer::{LogObserver, RunObserver, SilentObserver};
pub use pfasst::{TwoLevelPfasst, run_pfasst_world};
pub use result::{SimulationResult, StepRecord};
pub use sdc::Sdc;
pub use status::{State, Status, StatusDetail};

use std::sync::Arc;

use crate::comm::Communicator;
use crate::config::Options;
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::sweeper::Sweeper;
use crate::transfer::LevelTransfer;

use levels::TwoLevels;

/// Relative tolerance when comparing times and step ratios
const TIME_TOLERANCE: f64 = 1e-10;

// =================================================================================================
// Integrator trait
// =================================================================================================

/// An algorithm that drives a [`Controller`] through all configured steps
pub trait TimeIntegrator<E: StateContainer> {
    fn controller(&self) -> &Controller<E>;

    fn controller_mut(&mut self) -> &mut Controller<E>;

    /// Validate the configuration and set up every level
    fn setup(&mut self) -> Result<()>;

    /// Integrate from the current time to `t_end`
    ///
    /// # Errors
    ///
    /// Configuration error when `setup()` did not succeed before; any error
    /// raised by a sweeper, the transfer or the communicator.
    fn run(&mut self) -> Result<SimulationResult<E>>;

    fn name(&self) -> &'static str;
}

// =================================================================================================
// Controller
// =================================================================================================

/// Shared state of every integrator
pub struct Controller<E: StateContainer> {
    status: Status,
    levels: Vec<Sweeper<E>>,
    transfer: Option<Box<dyn LevelTransfer<E>>>,
    comm: Option<Arc<dyn Communicator>>,
    observer: Box<dyn RunObserver>,
    ready: bool,
}

impl<E: StateContainer> Default for Controller<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StateContainer> Controller<E> {
    pub fn new() -> Self {
        Self {
            status: Status::new(),
            levels: Vec::new(),
            transfer: None,
            comm: None,
            observer: Box::new(LogObserver::default()),
            ready: false,
        }
    }

    // ============================= Configuration ===============================================

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Mutable clock, invalidates a previous `setup()`
    pub fn status_mut(&mut self) -> &mut Status {
        self.ready = false;
        &mut self.status
    }

    /// Add a level, either below all others (`as_coarsest`) or above them
    pub fn add_sweeper(&mut self, sweeper: Sweeper<E>, as_coarsest: bool) {
        if as_coarsest {
            self.levels.insert(0, sweeper);
        } else {
            self.levels.push(sweeper);
        }
        self.ready = false;
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// All levels, coarsest first
    pub fn levels(&self) -> &[Sweeper<E>] {
        &self.levels
    }

    pub fn coarsest(&self) -> Result<&Sweeper<E>> {
        self.levels.first().ok_or_else(no_levels)
    }

    pub fn coarsest_mut(&mut self) -> Result<&mut Sweeper<E>> {
        self.levels.first_mut().ok_or_else(no_levels)
    }

    pub fn finest(&self) -> Result<&Sweeper<E>> {
        self.levels.last().ok_or_else(no_levels)
    }

    pub fn finest_mut(&mut self) -> Result<&mut Sweeper<E>> {
        self.levels.last_mut().ok_or_else(no_levels)
    }

    pub fn set_transfer(&mut self, transfer: impl LevelTransfer<E> + 'static) {
        self.transfer = Some(Box::new(transfer));
        self.ready = false;
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn set_communicator(&mut self, comm: Arc<dyn Communicator>) {
        self.comm = Some(comm);
        self.ready = false;
    }

    pub fn communicator(&self) -> Option<&Arc<dyn Communicator>> {
        self.comm.as_ref()
    }

    /// Replace the default [`LogObserver`]
    pub fn set_observer(&mut self, observer: impl RunObserver + 'static) {
        self.observer = Box::new(observer);
    }

    /// Read `max_iters`, `t_end`, `dt`, `num_steps` and the sweeper tolerances
    ///
    /// Absent keys keep the current values. `num_steps` sets `t_end` to
    /// `num_steps * dt` unless `t_end` is given as well.
    pub fn set_options(&mut self, options: &Options) -> Result<()> {
        let max_iterations = options.get_or("max_iters", self.status.max_iterations())?;
        let dt = options.get_or("dt", self.status.dt())?;
        let t_end = match (options.get::<f64>("t_end")?, options.get::<usize>("num_steps")?) {
            (Some(t_end), _) => t_end,
            (None, Some(num_steps)) => num_steps as f64 * dt,
            (None, None) => self.status.t_end(),
        };

        let status = self.status_mut();
        status.set_max_iterations(max_iterations);
        status.set_t_end(t_end);
        status.set_dt(dt);

        for level in &mut self.levels {
            level.set_options(options)?;
        }
        Ok(())
    }

    /// `t_end / dt`, validated
    fn step_ratio(&self) -> Result<f64> {
        if self.status.t_end() <= 0.0 {
            return Err(PfasstError::configuration(format!(
                "time end point must be positive, got {}",
                self.status.t_end()
            )));
        }
        if self.status.dt() <= 0.0 {
            return Err(PfasstError::configuration(format!(
                "time step width must be positive, got {}",
                self.status.dt()
            )));
        }
        Ok(self.status.t_end() / self.status.dt())
    }

    fn is_near_integral(ratio: f64) -> bool {
        (ratio - ratio.round()).abs() <= TIME_TOLERANCE * ratio.max(1.0)
    }

    /// Number of steps from `t = 0` to `t_end`
    ///
    /// A ratio `t_end / dt` that is not close to an integer is truncated
    /// with a warning; `setup()` rejects it.
    ///
    /// # Errors
    ///
    /// Configuration error when `t_end` or `dt` is not positive.
    pub fn num_steps(&self) -> Result<usize> {
        let ratio = self.step_ratio()?;
        if Self::is_near_integral(ratio) {
            return Ok(ratio.round() as usize);
        }

        log::warn!(
            target: "pfasst::controller",
            "end time {} is not an integral multiple of dt {}: {} steps",
            self.status.t_end(), self.status.dt(), ratio
        );
        Ok(ratio.floor() as usize)
    }

    /// Validate the time domain and set up every level
    ///
    /// # Errors
    ///
    /// Configuration error when no level was added, when `t_end` or `dt` is
    /// not positive, or when `t_end` is not an integral multiple of `dt`.
    pub fn setup(&mut self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(no_levels());
        }

        let ratio = self.step_ratio()?;
        if !Self::is_near_integral(ratio) {
            return Err(PfasstError::configuration(format!(
                "time end point {} is not an integral multiple of dt {}",
                self.status.t_end(),
                self.status.dt()
            )));
        }
        let num_steps = self.num_steps()?;

        if self.status.max_iterations() == 0 {
            log::warn!(
                target: "pfasst::controller",
                "no maximum number of iterations configured, only predicting"
            );
        }

        for level in &mut self.levels {
            if !level.is_setup() {
                level.setup()?;
            }
        }

        self.status.set_num_steps(num_steps);
        self.ready = true;

        log::info!(
            target: "pfasst::controller",
            "set up {} level(s): {} steps of dt={} to t_end={}, at most {} iterations",
            self.levels.len(), num_steps, self.status.dt(), self.status.t_end(), self.status.max_iterations()
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if !self.ready {
            return Err(PfasstError::configuration("controller not ready to run, setup() not called"));
        }
        Ok(())
    }

    // ============================= Advancing ===================================================

    /// Move `num_steps` steps forward in time and roll every level over
    ///
    /// Returns `false` and leaves everything untouched when the new time
    /// would exceed `t_end`.
    pub fn advance_time(&mut self, num_steps: usize) -> Result<bool> {
        let delta = num_steps as f64 * self.status.dt();
        let new_time = self.status.time() + delta;
        let t_end = self.status.t_end();

        if new_time - t_end > TIME_TOLERANCE * t_end.abs().max(1.0) {
            log::warn!(
                target: "pfasst::controller",
                "advancing {} step(s) with dt={} to t={} would exceed t_end={} by {}",
                num_steps, self.status.dt(), new_time, t_end, new_time - t_end
            );
            return Ok(false);
        }

        log::debug!(
            target: "pfasst::controller",
            "advancing {} step(s) with dt={} to t={}",
            num_steps, self.status.dt(), new_time
        );
        let (time, step) = (self.status.time(), self.status.step());
        self.status.set_time(new_time);
        self.status.set_step(step + num_steps);

        for level in &mut self.levels {
            if let Err(err) = level.advance(&self.status) {
                self.status.set_time(time);
                self.status.set_step(step);
                return Err(err);
            }
        }
        Ok(true)
    }

    /// Move to the next iteration unless `max_iterations` would be exceeded
    pub fn advance_iteration(&mut self) -> bool {
        let next = self.status.iteration() + 1;
        if next > self.status.max_iterations() {
            log::debug!(
                target: "pfasst::controller",
                "iteration {} would exceed the maximum of {}",
                next, self.status.max_iterations()
            );
            return false;
        }

        self.status.set_iteration(next);
        true
    }

    /// Whether steps remain after the current one
    pub(crate) fn has_next_step(&self, stride: usize) -> bool {
        self.status.step() + stride < self.status.num_steps()
    }

    // ============================= Run helpers =================================================

    /// Coarse and fine level with the transfer between them
    pub(crate) fn two_levels(&mut self) -> Result<TwoLevels<'_, E>> {
        if self.levels.len() != 2 {
            return Err(PfasstError::configuration(format!(
                "two-level integrators require exactly two levels, got {}",
                self.levels.len()
            )));
        }

        let transfer = self
            .transfer
            .as_deref_mut()
            .ok_or_else(|| PfasstError::configuration("two-level integrators require a transfer"))?;
        let (coarse, fine) = self.levels.split_at_mut(1);

        Ok(TwoLevels {
            coarse: &mut coarse[0],
            fine: &mut fine[0],
            transfer,
            status: &mut self.status,
        })
    }

    /// Reject a NaN or Inf end state on the finest level
    pub(crate) fn check_finite(&self) -> Result<()> {
        let fine = self.finest()?;
        if !fine.end_state().is_finite() {
            return Err(PfasstError::Numerical(format!(
                "NaN or Inf in the end state of step {} (t={}). Try a smaller dt.",
                self.status.step() + 1,
                self.status.time() + self.status.dt()
            )));
        }
        Ok(())
    }

    /// Record the finished step of the finest level
    pub(crate) fn finish_step(&mut self, result: &mut SimulationResult<E>, converged: bool) -> Result<()> {
        self.check_finite()?;

        let fine = self.finest_mut()?;
        let end_state = fine.end_state().clone();
        let (abs, rel) = (fine.abs_res_norm(), fine.rel_res_norm());

        self.status.set_abs_res_norm(abs);
        self.status.set_rel_res_norm(rel);
        self.status.set_state(if converged { State::Converged } else { State::Iterating });

        result.push_step(StepRecord::from_status(&self.status, converged), end_state);
        self.observer.on_step(&self.status);
        Ok(())
    }

    pub(crate) fn notify_iteration(&mut self) {
        self.observer.on_iteration(&self.status);
    }
}

impl<E: StateContainer> std::fmt::Debug for Controller<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("status", &self.status)
            .field("levels", &self.levels)
            .field("transfer", &self.transfer.as_ref().map(|t| t.name().to_string()))
            .field("comm", &self.comm)
            .field("ready", &self.ready)
            .finish()
    }
}

fn no_levels() -> PfasstError {
    PfasstError::configuration("no levels added to the controller")
}

// =================================================================================================
// Tests
// =================================================================================================
