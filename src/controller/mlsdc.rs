//! Multi-level SDC on two levels

use crate::controller::{Controller, SimulationResult, State, TimeIntegrator};
use crate::encap::StateContainer;
use crate::error::Result;

/// Two-level MLSDC on a single rank
///
/// Each iteration is one V-cycle: restrict and compute the FAS corrections,
/// sweep on the coarse level, interpolate the coarse correction and sweep on
/// the fine level. The predictor runs on the coarse level only and is then
/// interpolated.
#[derive(Debug)]
pub struct TwoLevelMlsdc<E: StateContainer> {
    controller: Controller<E>,
}

impl<E: StateContainer> Default for TwoLevelMlsdc<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StateContainer> TwoLevelMlsdc<E> {
    pub fn new() -> Self {
        Self { controller: Controller::new() }
    }

    fn predict(&mut self) -> Result<()> {
        let mut levels = self.controller.two_levels()?;
        levels.status.set_iteration(0);
        levels.status.set_state(State::Predicting);

        levels.seed()?;
        levels.predict_coarse()?;
        levels.cycle_up(true)?;
        levels.sweep_fine()
    }

    fn iterate(&mut self) -> Result<()> {
        let mut levels = self.controller.two_levels()?;
        levels.cycle_down()?;
        levels.sweep_coarse()?;
        levels.cycle_up(true)?;
        levels.sweep_fine()
    }

    /// Returns `(continue, converged)`
    fn advance_iteration(&mut self) -> Result<(bool, bool)> {
        let status = *self.controller.status();

        let coarse = self.controller.coarsest_mut()?;
        if coarse.converged(&status)? {
            log::debug!(target: "pfasst::controller", "coarse level converged at iteration {}", status.iteration());
        }

        let fine_converged = self.controller.finest_mut()?.converged(&status)?;
        self.controller.notify_iteration();
        if fine_converged {
            log::debug!(target: "pfasst::controller", "fine level converged at iteration {}", status.iteration());
            return Ok((false, true));
        }

        if !self.controller.advance_iteration() {
            return Ok((false, false));
        }
        self.controller.two_levels()?.save()?;
        Ok((true, false))
    }
}

impl<E: StateContainer> TimeIntegrator<E> for TwoLevelMlsdc<E> {
    fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut Controller<E> {
        &mut self.controller
    }

    fn setup(&mut self) -> Result<()> {
        self.controller.two_levels()?;
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
                "MLSDC time step {} of {}",
                self.controller.status().step() + 1,
                self.controller.status().num_steps()
            );

            self.predict()?;
            let converged = loop {
                let (more, converged) = self.advance_iteration()?;
                if !more {
                    break converged;
                }
                self.iterate()?;
            };

            let status = *self.controller.status();
            self.controller.finest_mut()?.compute_residuals(&status)?;
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
        "MLSDC"
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encap::{VectorEncapsulation, VectorFactory};
    use crate::error::PfasstError;
    use crate::problems::Dahlquist;
    use crate::quadrature::{QuadratureType, quadrature_factory};
    use crate::sweeper::{Imex, ImexProblem, Sweeper};
    use crate::transfer::{FasTransfer, IdentitySpace};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn level(problem: Dahlquist, num_nodes: usize, name: &str) -> Sweeper<VectorEncapsulation> {
        let mut sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
            .with_quadrature(quadrature_factory(num_nodes, QuadratureType::GaussLobatto).unwrap())
            .with_name(name);
        sweeper.set_abs_residual_tol(1e-12);
        sweeper
    }

    fn mlsdc(dt: f64, t_end: f64, max_iterations: usize) -> TwoLevelMlsdc<VectorEncapsulation> {
        let problem = Dahlquist::new(-1.0, -1.0);
        let initial = problem.initial_state();

        let mut mlsdc = TwoLevelMlsdc::new();
        let controller = mlsdc.controller_mut();
        controller.add_sweeper(level(problem.clone(), 3, "fine"), false);
        controller.add_sweeper(level(problem, 3, "coarse"), true);
        controller.set_transfer(FasTransfer::new(IdentitySpace));

        let status = controller.status_mut();
        status.set_dt(dt);
        status.set_t_end(t_end);
        status.set_max_iterations(max_iterations);

        mlsdc.setup().unwrap();
        *mlsdc.controller_mut().finest_mut().unwrap().initial_state_mut() = initial;
        mlsdc
    }

    #[test]
    fn test_setup_requires_two_levels_and_transfer() {
        let mut mlsdc: TwoLevelMlsdc<VectorEncapsulation> = TwoLevelMlsdc::new();
        mlsdc.controller_mut().add_sweeper(level(Dahlquist::new(0.0, -1.0), 3, "fine"), false);
        assert!(matches!(mlsdc.setup(), Err(PfasstError::Configuration(_))));

        mlsdc.controller_mut().add_sweeper(level(Dahlquist::new(0.0, -1.0), 3, "coarse"), true);
        assert!(matches!(mlsdc.setup(), Err(PfasstError::Configuration(_))));
    }

    #[test]
    fn test_converges_to_exact_solution() {
        let mut mlsdc = mlsdc(0.1, 0.5, 20);
        let result = mlsdc.run().unwrap();

        assert_eq!(result.num_steps(), 5);
        assert!(result.steps.iter().all(|s| s.converged));

        let exact = Dahlquist::new(-1.0, -1.0).exact(0.5).unwrap();
        // three Lobatto nodes, order four
        assert_relative_eq!(result.final_state[0], exact[0], epsilon = 1e-5);
    }

    #[test]
    fn test_iteration_limit_stops_every_step() {
        let mut mlsdc = mlsdc(0.25, 1.0, 2);
        mlsdc.controller_mut().finest_mut().unwrap().set_abs_residual_tol(0.0);
        let result = mlsdc.run().unwrap();

        assert_eq!(result.num_steps(), 4);
        assert!(result.steps.iter().all(|s| s.iterations == 2 && !s.converged));
        assert_eq!(result.metadata.get("integrator").map(String::as_str), Some("MLSDC"));
    }
}
