//! Per-level sweepers
//!
//! A [`Sweeper`] owns the node-indexed states of one level and walks them
//! through the phases the controllers call, in this order per iteration:
//!
//! ```text
//! first iteration:       pre_predict → predict → post_predict
//! following iterations:  pre_sweep   → sweep   → post_sweep
//! then:                  save()  and  converged()
//! ```
//!
//! # Scheme vs. level
//!
//! What a prediction or a sweep actually computes depends on the time
//! stepping scheme, supplied as a [`TimeStepScheme`] trait object. The
//! sweeper keeps the scheme-independent parts: allocation, `spread`,
//! `save`, the end state, residuals and the convergence test. A scheme
//! operates on the [`LevelData`] it is handed and never holds on to it.
//!
//! ```text
//! ┌─────────────────────────── Sweeper ───────────────────────────┐
//! │  LevelData                          Box<dyn TimeStepScheme>   │
//! │  ├─ quadrature (shared)             ├─ predict / sweep        │
//! │  ├─ factory    (shared)             ├─ advance / reevaluate   │
//! │  ├─ initial_state, end_state        └─ integrate (node rhs)   │
//! │  ├─ states[M], previous_states[M]                             │
//! │  ├─ tau[M]                                                    │
//! │  └─ residuals[M + 1]                                          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hooks a scheme does not provide fail with
//! [`PfasstError::NotImplemented`], which marks an incomplete
//! configuration rather than a numerical failure.
//!
//! # Schemes
//!
//! - [`Imex`]: implicit-explicit splitting driven by an [`ImexProblem`]
//! - [`Unconfigured`]: no hooks at all

mod imex;

pub use imex::{Imex, ImexProblem};

use std::sync::Arc;

use crate::config::Options;
use crate::controller::status::Status;
use crate::encap::{StateContainer, StateFactory, mat_apply, nan_max};
use crate::error::{PfasstError, Result};
use crate::quadrature::Quadrature;

// =================================================================================================
// Level data
// =================================================================================================

/// Node-indexed storage of one level
#[derive(Debug)]
pub struct LevelData<E: StateContainer> {
    quadrature: Option<Arc<dyn Quadrature>>,
    factory: Arc<dyn StateFactory<E>>,
    initial_state: E,
    end_state: E,
    states: Vec<E>,
    previous_states: Vec<E>,
    tau: Vec<E>,
    residuals: Vec<E>,
}

impl<E: StateContainer> LevelData<E> {
    fn new(factory: Arc<dyn StateFactory<E>>) -> Self {
        Self {
            quadrature: None,
            initial_state: factory.create(),
            end_state: factory.create(),
            factory,
            states: Vec::new(),
            previous_states: Vec::new(),
            tau: Vec::new(),
            residuals: Vec::new(),
        }
    }

    /// Quadrature of this level
    ///
    /// # Errors
    ///
    /// Configuration error when no quadrature was set.
    pub fn quadrature(&self) -> Result<&Arc<dyn Quadrature>> {
        self.quadrature
            .as_ref()
            .ok_or_else(|| PfasstError::configuration("no quadrature set on sweeper"))
    }

    pub fn factory(&self) -> &Arc<dyn StateFactory<E>> {
        &self.factory
    }

    pub fn num_nodes(&self) -> usize {
        self.states.len()
    }

    pub fn initial_state(&self) -> &E {
        &self.initial_state
    }

    pub fn initial_state_mut(&mut self) -> &mut E {
        &mut self.initial_state
    }

    pub fn end_state(&self) -> &E {
        &self.end_state
    }

    pub fn end_state_mut(&mut self) -> &mut E {
        &mut self.end_state
    }

    pub fn states(&self) -> &[E] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [E] {
        &mut self.states
    }

    pub fn previous_states(&self) -> &[E] {
        &self.previous_states
    }

    /// FAS corrections, node to node
    pub fn tau(&self) -> &[E] {
        &self.tau
    }

    pub fn tau_mut(&mut self) -> &mut [E] {
        &mut self.tau
    }

    /// Node residuals followed by the end-state residual
    pub fn residuals(&self) -> &[E] {
        &self.residuals
    }

    /// Absolute time of node `m` in the step starting at `status.time()`
    pub fn node_time(&self, status: &Status, m: usize) -> Result<f64> {
        Ok(status.time() + status.dt() * self.quadrature()?.nodes()[m])
    }
}

// =================================================================================================
// Scheme trait
// =================================================================================================

/// Time stepping scheme plugged into a [`Sweeper`]
///
/// Every hook has a default: the `pre_*` hooks do nothing, everything else
/// fails with [`PfasstError::NotImplemented`].
pub trait TimeStepScheme<E: StateContainer>: Send {
    fn name(&self) -> &str;

    /// Allocate scheme-owned per-node buffers
    fn setup(&mut self, _level: &LevelData<E>) -> Result<()> {
        Ok(())
    }

    fn pre_predict(&mut self, _level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        Ok(())
    }

    /// Fill every node from the initial state with a cheap integrator
    fn predict(&mut self, _level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        Err(PfasstError::not_implemented(format!("predict for scheme {}", self.name())))
    }

    fn pre_sweep(&mut self, _level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        Ok(())
    }

    /// One correction sweep over all nodes
    fn sweep(&mut self, _level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        Err(PfasstError::not_implemented(format!("sweep for scheme {}", self.name())))
    }

    /// Carry boundary right-hand sides into the next step
    ///
    /// Called after the level copied its end state into the initial state.
    fn advance(&mut self, _level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        Err(PfasstError::not_implemented(format!("advance for scheme {}", self.name())))
    }

    /// Re-evaluate cached right-hand sides after states changed from outside
    fn reevaluate(&mut self, _level: &LevelData<E>, _status: &Status, _initial_only: bool) -> Result<()> {
        Err(PfasstError::not_implemented(format!("reevaluate for scheme {}", self.name())))
    }

    /// `dt * s_mat * F`: node-to-node integrals of the current right-hand sides
    fn integrate(&self, _level: &LevelData<E>, _dt: f64) -> Result<Vec<E>> {
        Err(PfasstError::not_implemented(format!("integrate for scheme {}", self.name())))
    }

    /// `dt * b_mat * F`: integral of the current right-hand sides over the step
    fn integrate_end(&self, _level: &LevelData<E>, _dt: f64) -> Result<E> {
        Err(PfasstError::not_implemented(format!("integrate_end for scheme {}", self.name())))
    }
}

/// Scheme without any hooks
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconfigured;

impl<E: StateContainer> TimeStepScheme<E> for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }
}

// =================================================================================================
// Sweeper
// =================================================================================================

/// One level of an SDC-type integrator
pub struct Sweeper<E: StateContainer> {
    name: String,
    level: LevelData<E>,
    scheme: Box<dyn TimeStepScheme<E>>,
    abs_res_tol: f64,
    rel_res_tol: f64,
    abs_res_norm: f64,
    rel_res_norm: f64,
    is_setup: bool,
}

impl<E: StateContainer> Sweeper<E> {
    pub fn new(scheme: Box<dyn TimeStepScheme<E>>, factory: Arc<dyn StateFactory<E>>) -> Self {
        Self {
            name: "sweeper".to_string(),
            level: LevelData::new(factory),
            scheme,
            abs_res_tol: 0.0,
            rel_res_tol: 0.0,
            abs_res_norm: 0.0,
            rel_res_norm: 0.0,
            is_setup: false,
        }
    }

    /// Sweeper whose scheme provides no hooks
    pub fn unconfigured(factory: Arc<dyn StateFactory<E>>) -> Self {
        Self::new(Box::new(Unconfigured), factory)
    }

    /// Builder variant of [`Sweeper::set_quadrature`]
    pub fn with_quadrature(mut self, quadrature: Arc<dyn Quadrature>) -> Self {
        self.set_quadrature(quadrature);
        self
    }

    /// Builder variant of [`Sweeper::set_name`]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    // ============================= Configuration ===============================================

    pub fn set_quadrature(&mut self, quadrature: Arc<dyn Quadrature>) {
        self.level.quadrature = Some(quadrature);
        self.is_setup = false;
    }

    pub fn quadrature(&self) -> Result<&Arc<dyn Quadrature>> {
        self.level.quadrature()
    }

    /// Name used in log lines, e.g. `coarse` or `fine`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn scheme_name(&self) -> &str {
        self.scheme.name()
    }

    pub fn set_abs_residual_tol(&mut self, tol: f64) {
        self.abs_res_tol = tol;
    }

    pub fn set_rel_residual_tol(&mut self, tol: f64) {
        self.rel_res_tol = tol;
    }

    pub fn abs_residual_tol(&self) -> f64 {
        self.abs_res_tol
    }

    pub fn rel_residual_tol(&self) -> f64 {
        self.rel_res_tol
    }

    /// Read `abs_res_tol` and `rel_res_tol`, keeping current values when absent
    pub fn set_options(&mut self, options: &Options) -> Result<()> {
        self.abs_res_tol = options.get_or("abs_res_tol", self.abs_res_tol)?;
        self.rel_res_tol = options.get_or("rel_res_tol", self.rel_res_tol)?;
        Ok(())
    }

    /// Allocate node storage; required before every other phase
    ///
    /// # Errors
    ///
    /// Configuration error when no quadrature is set.
    pub fn setup(&mut self) -> Result<()> {
        let num_nodes = self.level.quadrature()?.num_nodes();
        let factory = Arc::clone(&self.level.factory);

        self.level.initial_state = factory.create();
        self.level.end_state = factory.create();
        self.level.states = factory.create_many(num_nodes);
        self.level.previous_states = factory.create_many(num_nodes);
        self.level.tau = factory.create_many(num_nodes);
        self.level.residuals = factory.create_many(num_nodes + 1);

        self.scheme.setup(&self.level)?;
        self.is_setup = true;

        log::debug!(
            target: "pfasst::sweeper",
            "[{}] set up {} nodes of size {} with scheme {}",
            self.name, num_nodes, factory.size(), self.scheme.name()
        );
        Ok(())
    }

    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    fn ensure_setup(&self) -> Result<()> {
        if !self.is_setup {
            return Err(PfasstError::configuration(format!(
                "sweeper '{}' used before setup()",
                self.name
            )));
        }
        Ok(())
    }

    // ============================= Data access =================================================

    pub fn level(&self) -> &LevelData<E> {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut LevelData<E> {
        &mut self.level
    }

    pub fn initial_state(&self) -> &E {
        &self.level.initial_state
    }

    pub fn initial_state_mut(&mut self) -> &mut E {
        &mut self.level.initial_state
    }

    pub fn end_state(&self) -> &E {
        &self.level.end_state
    }

    pub fn end_state_mut(&mut self) -> &mut E {
        &mut self.level.end_state
    }

    pub fn states(&self) -> &[E] {
        &self.level.states
    }

    pub fn states_mut(&mut self) -> &mut [E] {
        &mut self.level.states
    }

    pub fn previous_states(&self) -> &[E] {
        &self.level.previous_states
    }

    pub fn tau(&self) -> &[E] {
        &self.level.tau
    }

    pub fn tau_mut(&mut self) -> &mut [E] {
        &mut self.level.tau
    }

    pub fn residuals(&self) -> &[E] {
        &self.level.residuals
    }

    pub fn factory(&self) -> &Arc<dyn StateFactory<E>> {
        &self.level.factory
    }

    /// Largest absolute residual of the last convergence check
    pub fn abs_res_norm(&self) -> f64 {
        self.abs_res_norm
    }

    /// Largest relative residual of the last convergence check
    pub fn rel_res_norm(&self) -> f64 {
        self.rel_res_norm
    }

    // ============================= Phases ======================================================

    /// Copy the initial state into every node
    pub fn spread(&mut self) -> Result<()> {
        self.ensure_setup()?;
        let LevelData { initial_state, states, .. } = &mut self.level;
        for state in states.iter_mut() {
            state.copy_from(initial_state)?;
        }
        Ok(())
    }

    /// Copy the node states into the previous states
    pub fn save(&mut self) -> Result<()> {
        self.ensure_setup()?;
        let LevelData { states, previous_states, .. } = &mut self.level;
        for (previous, state) in previous_states.iter_mut().zip(states.iter()) {
            previous.copy_from(state)?;
        }
        Ok(())
    }

    pub fn pre_predict(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        self.scheme.pre_predict(&mut self.level, status)
    }

    pub fn predict(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        log::trace!(target: "pfasst::sweeper", "[{}] predicting step {}", self.name, status.step());
        self.scheme.predict(&mut self.level, status)
    }

    pub fn post_predict(&mut self, status: &Status) -> Result<()> {
        self.integrate_end_state(status.dt())
    }

    pub fn pre_sweep(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        self.scheme.pre_sweep(&mut self.level, status)
    }

    pub fn sweep(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        log::trace!(
            target: "pfasst::sweeper",
            "[{}] sweeping step {} iteration {}",
            self.name, status.step(), status.iteration()
        );
        self.scheme.sweep(&mut self.level, status)
    }

    pub fn post_sweep(&mut self, status: &Status) -> Result<()> {
        self.integrate_end_state(status.dt())
    }

    /// Roll the level forward to the next step
    ///
    /// The end state becomes the new initial state, FAS corrections are
    /// cleared and the scheme carries its boundary right-hand sides over.
    pub fn advance(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        let LevelData { initial_state, end_state, tau, .. } = &mut self.level;
        initial_state.copy_from(end_state)?;
        tau.iter_mut().for_each(|t| t.zero());
        self.scheme.advance(&mut self.level, status)
    }

    pub fn reevaluate(&mut self, status: &Status, initial_only: bool) -> Result<()> {
        self.ensure_setup()?;
        self.scheme.reevaluate(&self.level, status, initial_only)
    }

    /// Node-to-node integrals of the current right-hand sides
    pub fn integrate(&self, dt: f64) -> Result<Vec<E>> {
        self.ensure_setup()?;
        self.scheme.integrate(&self.level, dt)
    }

    /// Set the end state of the step
    ///
    /// With the right endpoint among the nodes this is a copy of the last
    /// node. Otherwise the right-hand sides are integrated over the whole
    /// step from the initial state.
    pub fn integrate_end_state(&mut self, dt: f64) -> Result<()> {
        self.ensure_setup()?;

        if self.level.quadrature()?.right_is_node() {
            let LevelData { states, end_state, .. } = &mut self.level;
            if let Some(last) = states.last() {
                end_state.copy_from(last)?;
            }
            return Ok(());
        }

        let integral = self.scheme.integrate_end(&self.level, dt)?;
        let LevelData { initial_state, end_state, .. } = &mut self.level;
        end_state.copy_from(initial_state)?;
        end_state.scaled_add(1.0, &integral)?;
        Ok(())
    }

    /// Residuals of the collocation problem at every node and the end point
    ///
    /// ```text
    /// r[m] = u_0 - u_m + Σ_{n ≤ m} (tau[n] + dt * (S F)[n])
    /// r[M] = u_0 - u_end + dt * (b F) + Σ_n tau[n]
    /// ```
    pub fn compute_residuals(&mut self, status: &Status) -> Result<()> {
        self.ensure_setup()?;
        let dt = status.dt();
        let integrals = self.scheme.integrate(&self.level, dt)?;
        let end_integral = self.scheme.integrate_end(&self.level, dt)?;

        let LevelData { initial_state, end_state, states, tau, residuals, .. } = &mut self.level;
        let num_nodes = states.len();

        let mut accumulated = initial_state.clone();
        accumulated.zero();

        for m in 0..num_nodes {
            accumulated.scaled_add(1.0, &tau[m])?;
            accumulated.scaled_add(1.0, &integrals[m])?;

            let residual = &mut residuals[m];
            residual.copy_from(initial_state)?;
            residual.scaled_add(-1.0, &states[m])?;
            residual.scaled_add(1.0, &accumulated)?;
        }

        let residual = &mut residuals[num_nodes];
        residual.copy_from(initial_state)?;
        residual.scaled_add(-1.0, end_state)?;
        residual.scaled_add(1.0, &end_integral)?;
        for t in tau.iter() {
            residual.scaled_add(1.0, t)?;
        }

        let mut abs_norm = 0.0_f64;
        let mut rel_norm = 0.0_f64;
        for (m, residual) in residuals.iter().enumerate() {
            let state = if m < num_nodes { &states[m] } else { &*end_state };
            let abs = residual.norm0();
            let reference = state.norm0();
            let rel = if abs == 0.0 {
                0.0
            } else if reference == 0.0 {
                f64::INFINITY
            } else {
                abs / reference
            };
            abs_norm = nan_max(abs_norm, abs);
            rel_norm = nan_max(rel_norm, rel);
        }

        self.abs_res_norm = abs_norm;
        self.rel_res_norm = rel_norm;
        Ok(())
    }

    /// Whether the residuals are below either configured tolerance
    ///
    /// Always `false` when neither tolerance is positive, so the
    /// controller iterates until its iteration limit.
    pub fn converged(&mut self, status: &Status) -> Result<bool> {
        if self.abs_res_tol <= 0.0 && self.rel_res_tol <= 0.0 {
            return Ok(false);
        }

        self.compute_residuals(status)?;

        let abs_ok = self.abs_res_tol > 0.0 && self.abs_res_norm < self.abs_res_tol;
        let rel_ok = self.rel_res_tol > 0.0 && self.rel_res_norm < self.rel_res_tol;

        log::debug!(
            target: "pfasst::sweeper",
            "[{}] step {} iter {}: abs_res={:.6e} rel_res={:.6e}{}",
            self.name,
            status.step(),
            status.iteration(),
            self.abs_res_norm,
            self.rel_res_norm,
            if abs_ok || rel_ok { " (converged)" } else { "" }
        );

        Ok(abs_ok || rel_ok)
    }
}

impl<E: StateContainer> std::fmt::Debug for Sweeper<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("name", &self.name)
            .field("scheme", &self.scheme.name())
            .field("num_nodes", &self.level.states.len())
            .field("is_setup", &self.is_setup)
            .finish()
    }
}

/// `dt * matrix * (a + b)` for two right-hand side histories
pub(crate) fn integrate_pair<E: StateContainer>(
    dt: f64,
    matrix: &nalgebra::DMatrix<f64>,
    first: &[E],
    second: &[E],
) -> Result<Vec<E>> {
    let mut result = mat_apply(dt, matrix, first)?;
    let other = mat_apply(dt, matrix, second)?;
    for (r, o) in result.iter_mut().zip(&other) {
        r.scaled_add(1.0, o)?;
    }
    Ok(result)
}

// =================================================================================================
// Tests
// =================================================================================================
