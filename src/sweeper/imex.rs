//! Implicit-explicit SDC scheme
//!
//! The right-hand side is split into an explicit part `f_E` and an implicit
//! part `f_I`:
//!
//! ```text
//! u'(t) = f_E(t, u) + f_I(t, u)
//! ```
//!
//! Both parts are evaluated at every node and cached. The physics layer
//! provides them through [`ImexProblem`], together with a solver for
//!
//! ```text
//! u - ds * f_I(t, u) = rhs
//! ```
//!
//! # Prediction
//!
//! An IMEX Euler chain from the initial state through the nodes:
//!
//! ```text
//! u_m - ds_m f_I(t_m, u_m) = u_{m-1} + ds_m f_E(t_{m-1}, u_{m-1})
//! ```
//!
//! # Sweep
//!
//! Node-to-node correction with `S` the node-to-node integration matrix and
//! `tau` the FAS correction (zero on the finest level):
//!
//! ```text
//! u_m^{k+1} - ds_m f_I(u_m^{k+1}) = u_{m-1}^{k+1}
//!                                   + ds_m [f_E(u_{m-1}^{k+1}) - f_E(u_{m-1}^k)]
//!                                   - ds_m f_I(u_m^k)
//!                                   + dt (S F^k)_m + tau_m
//! ```
//!
//! When the left endpoint is not a node the first node starts from the
//! initial state and the explicit difference term vanishes.
//!
//! # Boundary right-hand sides
//!
//! With the left endpoint among the nodes the right-hand sides of node 0
//! belong to the initial state. They are carried over from the last node on
//! `advance()` when the right endpoint is a node too, and evaluated lazily
//! otherwise.

use std::sync::Arc;

use crate::controller::status::Status;
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::sweeper::{LevelData, TimeStepScheme, integrate_pair};

/// Physics hooks consumed by [`Imex`]
pub trait ImexProblem<E: StateContainer>: Send {
    fn name(&self) -> &str {
        "imex problem"
    }

    /// `f_E(t, u)`
    fn evaluate_rhs_expl(&mut self, _t: f64, _u: &E) -> Result<E> {
        Err(PfasstError::not_implemented("explicit right-hand side evaluation"))
    }

    /// `f_I(t, u)`
    fn evaluate_rhs_impl(&mut self, _t: f64, _u: &E) -> Result<E> {
        Err(PfasstError::not_implemented("implicit right-hand side evaluation"))
    }

    /// Solve `u - ds * f_I(t, u) = rhs` for `u`, storing `f_I(t, u)` in `f`
    fn implicit_solve(&mut self, _f: &mut E, _u: &mut E, _t: f64, _ds: f64, _rhs: &E) -> Result<()> {
        Err(PfasstError::not_implemented("implicit solve"))
    }

    /// Exact solution, for validation only
    fn exact(&self, _t: f64) -> Result<E> {
        Err(PfasstError::not_implemented("exact solution"))
    }
}

/// IMEX time stepping scheme over an [`ImexProblem`]
pub struct Imex<E: StateContainer, P: ImexProblem<E>> {
    problem: P,
    expl_rhs: Vec<E>,
    impl_rhs: Vec<E>,
    s_integrals: Vec<E>,
    initial_rhs_current: bool,
}

impl<E: StateContainer, P: ImexProblem<E>> Imex<E, P> {
    pub fn new(problem: P) -> Self {
        Self {
            problem,
            expl_rhs: Vec::new(),
            impl_rhs: Vec::new(),
            s_integrals: Vec::new(),
            initial_rhs_current: false,
        }
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    pub fn expl_rhs(&self) -> &[E] {
        &self.expl_rhs
    }

    pub fn impl_rhs(&self) -> &[E] {
        &self.impl_rhs
    }

    /// Node integrals plus FAS corrections used by the last sweep
    pub fn s_integrals(&self) -> &[E] {
        &self.s_integrals
    }

    fn evaluate_node(&mut self, m: usize, t: f64, u: &E) -> Result<()> {
        self.expl_rhs[m] = self.problem.evaluate_rhs_expl(t, u)?;
        self.impl_rhs[m] = self.problem.evaluate_rhs_impl(t, u)?;
        Ok(())
    }

    /// Pin node 0 to the initial state when it lies on the left endpoint
    ///
    /// Returns the index of the first node that still has to be computed.
    fn prepare_first_node(&mut self, level: &mut LevelData<E>, t0: f64, left_is_node: bool) -> Result<usize> {
        if !left_is_node {
            return Ok(0);
        }

        let initial = level.initial_state().clone();
        level.states_mut()[0].copy_from(&initial)?;
        if !self.initial_rhs_current {
            self.evaluate_node(0, t0, &initial)?;
            self.initial_rhs_current = true;
        }
        Ok(1)
    }

    /// Implicit solve at node `m` followed by the explicit evaluation there
    fn solve_node(&mut self, level: &mut LevelData<E>, m: usize, t: f64, ds: f64, rhs: &E) -> Result<()> {
        self.problem
            .implicit_solve(&mut self.impl_rhs[m], &mut level.states_mut()[m], t, ds, rhs)?;
        self.expl_rhs[m] = self.problem.evaluate_rhs_expl(t, &level.states()[m])?;
        Ok(())
    }
}

impl<E: StateContainer, P: ImexProblem<E>> TimeStepScheme<E> for Imex<E, P> {
    fn name(&self) -> &str {
        "IMEX"
    }

    fn setup(&mut self, level: &LevelData<E>) -> Result<()> {
        let num_nodes = level.quadrature()?.num_nodes();
        let factory = level.factory();

        self.expl_rhs = factory.create_many(num_nodes);
        self.impl_rhs = factory.create_many(num_nodes);
        self.s_integrals = factory.create_many(num_nodes);
        self.initial_rhs_current = false;
        Ok(())
    }

    fn predict(&mut self, level: &mut LevelData<E>, status: &Status) -> Result<()> {
        let quadrature = Arc::clone(level.quadrature()?);
        let nodes = quadrature.nodes();
        let (t0, dt) = (status.time(), status.dt());

        let start = self.prepare_first_node(level, t0, quadrature.left_is_node())?;

        // ====== Previous point of the Euler chain ======

        let mut u_previous = level.initial_state().clone();
        let mut fe_previous = if start == 1 {
            self.expl_rhs[0].clone()
        } else {
            self.problem.evaluate_rhs_expl(t0, &u_previous)?
        };
        let mut t_previous_node = 0.0;

        // ====== IMEX Euler through the nodes ======

        for m in start..nodes.len() {
            let t = t0 + dt * nodes[m];
            let ds = dt * (nodes[m] - t_previous_node);

            let mut rhs = u_previous;
            rhs.scaled_add(ds, &fe_previous)?;
            self.solve_node(level, m, t, ds, &rhs)?;

            u_previous = level.states()[m].clone();
            fe_previous = self.expl_rhs[m].clone();
            t_previous_node = nodes[m];
        }

        Ok(())
    }

    fn sweep(&mut self, level: &mut LevelData<E>, status: &Status) -> Result<()> {
        let quadrature = Arc::clone(level.quadrature()?);
        let nodes = quadrature.nodes();
        let (t0, dt) = (status.time(), status.dt());

        // ====== Integrals of the previous iterate ======

        let integrals = integrate_pair(dt, quadrature.s_mat(), &self.expl_rhs, &self.impl_rhs)?;
        for ((s, integral), tau) in self.s_integrals.iter_mut().zip(&integrals).zip(level.tau()) {
            s.copy_from(integral)?;
            s.scaled_add(1.0, tau)?;
        }

        let expl_old = self.expl_rhs.clone();
        let impl_old = self.impl_rhs.clone();

        // ====== Node-to-node correction ======

        let start = self.prepare_first_node(level, t0, quadrature.left_is_node())?;

        for m in start..nodes.len() {
            let t = t0 + dt * nodes[m];
            let ds = if m == 0 { dt * nodes[0] } else { dt * (nodes[m] - nodes[m - 1]) };

            let mut rhs = if m == 0 {
                level.initial_state().clone()
            } else {
                let mut rhs = level.states()[m - 1].clone();
                rhs.scaled_add(ds, &self.expl_rhs[m - 1])?;
                rhs.scaled_add(-ds, &expl_old[m - 1])?;
                rhs
            };
            rhs.scaled_add(-ds, &impl_old[m])?;
            rhs.scaled_add(1.0, &self.s_integrals[m])?;

            self.solve_node(level, m, t, ds, &rhs)?;
        }

        Ok(())
    }

    fn advance(&mut self, level: &mut LevelData<E>, _status: &Status) -> Result<()> {
        let quadrature = level.quadrature()?;

        match (quadrature.left_is_node(), quadrature.right_is_node()) {
            (true, true) => {
                let last = self.expl_rhs.len() - 1;
                let (expl_end, impl_end) = (self.expl_rhs[last].clone(), self.impl_rhs[last].clone());
                self.expl_rhs[0] = expl_end;
                self.impl_rhs[0] = impl_end;
                self.initial_rhs_current = true;
                Ok(())
            }
            (true, false) => {
                self.initial_rhs_current = false;
                Ok(())
            }
            // the initial point is not cached, prediction evaluates it
            (false, true) => Ok(()),
            (false, false) => Err(PfasstError::not_implemented(
                "advancing IMEX for nodes containing neither interval border",
            )),
        }
    }

    /// With `initial_only` and a left endpoint that is not a node there is
    /// no cached right-hand side to refresh: prediction evaluates `F(t0, u0)`
    /// itself, so the call succeeds without work.
    fn reevaluate(&mut self, level: &LevelData<E>, status: &Status, initial_only: bool) -> Result<()> {
        let quadrature = Arc::clone(level.quadrature()?);
        let t0 = status.time();
        let left_is_node = quadrature.left_is_node();

        if left_is_node {
            self.evaluate_node(0, t0, level.initial_state())?;
            self.initial_rhs_current = true;
        }

        if initial_only {
            return Ok(());
        }

        let start = usize::from(left_is_node);
        for m in start..quadrature.num_nodes() {
            let t = t0 + status.dt() * quadrature.nodes()[m];
            self.evaluate_node(m, t, &level.states()[m])?;
        }
        Ok(())
    }

    fn integrate(&self, level: &LevelData<E>, dt: f64) -> Result<Vec<E>> {
        integrate_pair(dt, level.quadrature()?.s_mat(), &self.expl_rhs, &self.impl_rhs)
    }

    fn integrate_end(&self, level: &LevelData<E>, dt: f64) -> Result<E> {
        integrate_pair(dt, level.quadrature()?.b_mat(), &self.expl_rhs, &self.impl_rhs)?
            .into_iter()
            .next()
            .ok_or_else(|| PfasstError::configuration("quadrature without nodes"))
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encap::{VectorEncapsulation, VectorFactory};
    use crate::quadrature::{QuadratureType, quadrature_factory};
    use crate::sweeper::Sweeper;
    use approx::assert_relative_eq;

    /// u' = a u + b u with `a` explicit and `b` implicit
    struct Split {
        explicit: f64,
        implicit: f64,
    }

    impl ImexProblem<VectorEncapsulation> for Split {
        fn evaluate_rhs_expl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
            Ok(VectorEncapsulation::from(u.data() * self.explicit))
        }

        fn evaluate_rhs_impl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
            Ok(VectorEncapsulation::from(u.data() * self.implicit))
        }

        fn implicit_solve(
            &mut self,
            f: &mut VectorEncapsulation,
            u: &mut VectorEncapsulation,
            _t: f64,
            ds: f64,
            rhs: &VectorEncapsulation,
        ) -> Result<()> {
            *u = VectorEncapsulation::from(rhs.data() / (1.0 - ds * self.implicit));
            *f = VectorEncapsulation::from(u.data() * self.implicit);
            Ok(())
        }
    }

    fn imex_sweeper(kind: QuadratureType, nodes: usize) -> Sweeper<VectorEncapsulation> {
        let problem = Split { explicit: -0.5, implicit: -1.0 };
        let mut sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
            .with_quadrature(quadrature_factory(nodes, kind).unwrap());
        sweeper.setup().unwrap();
        *sweeper.initial_state_mut() = VectorEncapsulation::from_slice(&[1.0]);
        sweeper
    }

    fn status(dt: f64) -> Status {
        let mut status = Status::new();
        status.set_dt(dt);
        status.set_t_end(dt);
        status
    }

    fn run_sweeps(sweeper: &mut Sweeper<VectorEncapsulation>, status: &Status, sweeps: usize) {
        sweeper.spread().unwrap();
        sweeper.pre_predict(status).unwrap();
        sweeper.predict(status).unwrap();
        sweeper.post_predict(status).unwrap();
        for _ in 0..sweeps {
            sweeper.save().unwrap();
            sweeper.pre_sweep(status).unwrap();
            sweeper.sweep(status).unwrap();
            sweeper.post_sweep(status).unwrap();
        }
    }

    #[test]
    fn test_sweeps_converge_to_collocation_solution() {
        let dt = 0.1;
        let exact = (-1.5 * dt as f64).exp();

        for kind in [QuadratureType::GaussRadau, QuadratureType::GaussLobatto, QuadratureType::GaussLegendre] {
            let mut sweeper = imex_sweeper(kind, 3);
            let status = status(dt);
            run_sweeps(&mut sweeper, &status, 12);

            // collocation on three nodes is at least fourth order, error far below dt^4
            assert_relative_eq!(sweeper.end_state()[0], exact, epsilon = 1e-6);

            sweeper.set_abs_residual_tol(1e-10);
            assert!(sweeper.converged(&status).unwrap(), "{:?} did not converge", kind);
        }
    }

    #[test]
    fn test_residual_shrinks_with_sweeps() {
        let status = status(0.2);
        let mut norms = Vec::new();

        for sweeps in [0, 1, 2, 3] {
            let mut sweeper = imex_sweeper(QuadratureType::GaussRadau, 3);
            run_sweeps(&mut sweeper, &status, sweeps);
            sweeper.compute_residuals(&status).unwrap();
            norms.push(sweeper.abs_res_norm());
        }

        for pair in norms.windows(2) {
            assert!(pair[1] < pair[0], "residuals not decreasing: {:?}", norms);
        }
    }

    #[test]
    fn test_nan_residual_never_converges() {
        let status = status(0.1);
        let mut sweeper = imex_sweeper(QuadratureType::GaussLobatto, 3);
        run_sweeps(&mut sweeper, &status, 2);
        sweeper.set_abs_residual_tol(1e-8);
        sweeper.set_rel_residual_tol(1e-8);

        sweeper.states_mut()[1][0] = f64::NAN;
        assert!(!sweeper.converged(&status).unwrap());
        assert!(sweeper.abs_res_norm().is_nan());
        assert!(sweeper.rel_res_norm().is_nan());
    }

    #[test]
    fn test_predict_is_imex_euler_on_single_node() {
        // a single Radau node at t = dt gives one IMEX Euler step
        let dt = 0.1;
        let mut sweeper = imex_sweeper(QuadratureType::GaussRadau, 1);
        let status = status(dt);
        run_sweeps(&mut sweeper, &status, 0);

        let expected = (1.0 + dt * -0.5) / (1.0 + dt);
        assert_relative_eq!(sweeper.end_state()[0], expected, epsilon = 1e-14);
    }

    #[test]
    fn test_advance_carries_state_and_rhs() {
        let dt = 0.1;
        let mut sweeper = imex_sweeper(QuadratureType::GaussLobatto, 3);
        let mut status = status(dt);
        run_sweeps(&mut sweeper, &status, 3);

        let end = sweeper.end_state().clone();
        status.set_time(dt);
        sweeper.advance(&status).unwrap();
        assert_eq!(sweeper.initial_state(), &end);
        assert!(sweeper.tau().iter().all(|t| t.norm0() == 0.0));
    }

    #[test]
    fn test_advance_without_boundary_nodes_is_not_implemented() {
        let mut sweeper = imex_sweeper(QuadratureType::GaussLegendre, 3);
        let status = status(0.1);
        run_sweeps(&mut sweeper, &status, 1);

        assert!(sweeper.advance(&status).unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_reevaluate_all_nodes() {
        let mut sweeper = imex_sweeper(QuadratureType::GaussRadau, 2);
        let status = status(0.1);
        sweeper.spread().unwrap();
        sweeper.reevaluate(&status, false).unwrap();

        // F = -1.5 u at every node with u = 1
        let integrals = sweeper.integrate(0.1).unwrap();
        let total: f64 = integrals.iter().map(|i| i[0]).sum();
        assert_relative_eq!(total, -0.15, epsilon = 1e-14);
    }

    #[test]
    fn test_reevaluate_initial_only_touches_left_node() {
        let status = status(0.1);

        // Radau: the initial state is not a node, nothing is cached for it
        let mut radau = imex_sweeper(QuadratureType::GaussRadau, 3);
        run_sweeps(&mut radau, &status, 1);
        let before = radau.integrate(0.1).unwrap();
        *radau.initial_state_mut() = VectorEncapsulation::from_slice(&[4.0]);
        radau.reevaluate(&status, true).unwrap();
        assert_eq!(radau.integrate(0.1).unwrap(), before);

        // Lobatto: node 0 is the initial state and gets re-evaluated
        let mut lobatto = imex_sweeper(QuadratureType::GaussLobatto, 3);
        run_sweeps(&mut lobatto, &status, 1);
        let before = lobatto.integrate(0.1).unwrap();
        *lobatto.initial_state_mut() = VectorEncapsulation::from_slice(&[4.0]);
        lobatto.reevaluate(&status, true).unwrap();
        assert_ne!(lobatto.integrate(0.1).unwrap(), before);
    }

    #[test]
    fn test_missing_hooks_are_not_implemented() {
        struct Empty;
        impl ImexProblem<VectorEncapsulation> for Empty {}

        let mut sweeper = Sweeper::new(Box::new(Imex::new(Empty)), Arc::new(VectorFactory::new(1)))
            .with_quadrature(quadrature_factory(2, QuadratureType::GaussRadau).unwrap());
        sweeper.setup().unwrap();

        let err = sweeper.predict(&status(0.1)).unwrap_err();
        assert!(err.is_not_implemented());
        assert!(ImexProblem::<VectorEncapsulation>::exact(&Empty, 0.0).unwrap_err().is_not_implemented());
    }
}
