//! Single-level spectral deferred corrections

use crate::controller::{Controller, SimulationResult, State, TimeIntegrator};
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::sweeper::Sweeper;

/// SDC on one level: predict, then sweep until converged or out of iterations
#[derive(Debug)]
pub struct Sdc<E: StateContainer> {
    controller: Controller<E>,
}

impl<E: StateContainer> Default for Sdc<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StateContainer> Sdc<E> {
    pub fn new() -> Self {
        Self { controller: Controller::new() }
    }

    fn sweeper(&mut self) -> Result<&mut Sweeper<E>> {
        self.controller.finest_mut()
    }

    fn predict(&mut self) -> Result<()> {
        let Controller { status, levels, .. } = &mut self.controller;
        let sweeper = levels.last_mut().ok_or_else(|| PfasstError::configuration("no level"))?;

        status.set_iteration(0);
        status.set_state(State::Predicting);

        sweeper.spread()?;
        sweeper.save()?;
        sweeper.pre_predict(status)?;
        sweeper.predict(status)?;
        sweeper.post_predict(status)
    }

    fn sweep(&mut self) -> Result<()> {
        let Controller { status, levels, .. } = &mut self.controller;
        let sweeper = levels.last_mut().ok_or_else(|| PfasstError::configuration("no level"))?;

        status.set_state(State::PreIterFine);
        sweeper.pre_sweep(status)?;
        status.set_state(State::IterFine);
        sweeper.sweep(status)?;
        status.set_state(State::PostIterFine);
        sweeper.post_sweep(status)?;
        status.set_state(State::Iterating);
        Ok(())
    }

    /// Stop on convergence, otherwise move to the next iteration and save
    ///
    /// Returns `(continue, converged)`.
    fn advance_iteration(&mut self) -> Result<(bool, bool)> {
        let status = *self.controller.status();
        let converged = self.sweeper()?.converged(&status)?;
        self.controller.notify_iteration();

        if converged {
            log::debug!(target: "pfasst::controller", "SDC sweeper converged");
            return Ok((false, true));
        }
        if !self.controller.advance_iteration() {
            return Ok((false, false));
        }
        self.sweeper()?.save()?;
        Ok((true, false))
    }
}

impl<E: StateContainer> TimeIntegrator<E> for Sdc<E> {
    fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut Controller<E> {
        &mut self.controller
    }

    fn setup(&mut self) -> Result<()> {
        if self.controller.num_levels() != 1 {
            return Err(PfasstError::configuration(format!(
                "SDC requires exactly one level, got {}",
                self.controller.num_levels()
            )));
        }
        self.controller.setup()
    }

    fn run(&mut self) -> Result<SimulationResult<E>> {
        self.controller.ensure_ready()?;

        let mut result = SimulationResult::new(
            self.controller.status().time(),
            self.controller.finest()?.initial_state().clone(),
        );

        loop {
            log::info!(
                target: "pfasst::controller",
                "SDC time step {} of {}",
                self.controller.status().step() + 1,
                self.controller.status().num_steps()
            );

            self.predict()?;
            let converged = loop {
                let (more, converged) = self.advance_iteration()?;
                if !more {
                    break converged;
                }
                self.sweep()?;
            };

            let status = *self.controller.status();
            self.sweeper()?.compute_residuals(&status)?;
            self.controller.finish_step(&mut result, converged)?;

            if !self.controller.has_next_step(1) || !self.controller.advance_time(1)? {
                break;
            }
        }

        result.add_metadata("integrator", self.name());
        result.add_metadata("time steps", &result.num_steps().to_string());
        result.add_metadata("dt", &self.controller.status().dt().to_string());
        result.add_metadata("total iterations", &result.total_iterations().to_string());
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "SDC"
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encap::{VectorEncapsulation, VectorFactory};
    use crate::problems::Dahlquist;
    use crate::quadrature::{QuadratureType, quadrature_factory};
    use crate::sweeper::Imex;
    use crate::sweeper::ImexProblem;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn sdc(kind: QuadratureType, dt: f64, t_end: f64, max_iterations: usize) -> Sdc<VectorEncapsulation> {
        let problem = Dahlquist::new(-1.0, -1.0);
        let initial = problem.initial_state();
        let sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
            .with_quadrature(quadrature_factory(3, kind).unwrap());

        let mut sdc = Sdc::new();
        sdc.controller_mut().add_sweeper(sweeper, false);
        let status = sdc.controller_mut().status_mut();
        status.set_dt(dt);
        status.set_t_end(t_end);
        status.set_max_iterations(max_iterations);
        sdc.setup().unwrap();
        *sdc.controller_mut().finest_mut().unwrap().initial_state_mut() = initial;
        sdc
    }

    #[test]
    fn test_run_requires_setup() {
        let mut sdc: Sdc<VectorEncapsulation> = Sdc::new();
        assert!(matches!(sdc.run(), Err(PfasstError::Configuration(_))));
        assert!(matches!(sdc.setup(), Err(PfasstError::Configuration(_))));
    }

    #[test]
    fn test_runs_exactly_the_configured_steps() {
        let mut sdc = sdc(QuadratureType::GaussLobatto, 0.1, 1.0, 4);
        let result = sdc.run().unwrap();

        assert_eq!(result.num_steps(), 10);
        assert_eq!(sdc.controller().status().step(), 9);
        assert_relative_eq!(result.final_time(), 1.0, epsilon = 1e-12);
        assert!(result.steps.iter().all(|s| s.iterations == 4 && !s.converged));
    }

    #[test]
    fn test_converges_to_exact_solution() {
        let mut sdc = sdc(QuadratureType::GaussRadau, 0.1, 0.5, 20);
        sdc.controller_mut().finest_mut().unwrap().set_abs_residual_tol(1e-13);
        let result = sdc.run().unwrap();

        let exact = Dahlquist::new(-1.0, -1.0).exact(0.5).unwrap();
        // three Radau nodes, order five
        assert_relative_eq!(result.final_state[0], exact[0], epsilon = 1e-6);
        assert!(result.steps.iter().all(|s| s.converged && s.iterations < 20));
    }

    #[test]
    fn test_zero_iterations_only_predicts() {
        let mut sdc = sdc(QuadratureType::GaussRadau, 0.25, 0.5, 0);
        let result = sdc.run().unwrap();

        assert_eq!(result.total_iterations(), 0);
        assert_eq!(result.num_steps(), 2);
    }
}
