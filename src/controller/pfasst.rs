//! Two-level PFASST across the ranks of a communicator
//!
//! The time domain is processed in blocks of `size` consecutive steps, rank
//! `p` owning step `block * size + p`. Within a block every iteration is an
//! MLSDC V-cycle whose coarse and fine initial states come from the
//! predecessor rank. Messages are tagged per block and payload kind, so a
//! straggler of one block can never be matched with a receive of the next.

use std::sync::Arc;

use crate::comm::{Communicator, ConvergenceFlags, ThreadCommunicator};
use crate::controller::{Controller, SimulationResult, State, TimeIntegrator};
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};

#[derive(Clone, Copy, Debug)]
enum Payload {
    Coarse = 0,
    Fine = 1,
    Status = 2,
}

const PAYLOAD_KINDS: usize = 3;

fn tag(block: usize, payload: Payload) -> Result<i32> {
    i32::try_from(block * (PAYLOAD_KINDS + 1) + payload as usize)
        .map_err(|_| PfasstError::Communication(format!("message tag overflow in block {}", block)))
}

/// Two-level PFASST on one rank
#[derive(Debug)]
pub struct TwoLevelPfasst<E: StateContainer> {
    controller: Controller<E>,
    flags: ConvergenceFlags,
}

impl<E: StateContainer> Default for TwoLevelPfasst<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StateContainer> TwoLevelPfasst<E> {
    pub fn new() -> Self {
        Self {
            controller: Controller::new(),
            flags: ConvergenceFlags::new(0),
        }
    }

    fn comm(&self) -> Result<Arc<dyn Communicator>> {
        self.controller
            .communicator()
            .cloned()
            .ok_or_else(|| PfasstError::configuration("PFASST requires a communicator"))
    }

    /// Pipelined coarse prediction followed by one fine sweep
    ///
    /// Rank `p` runs `p + 1` coarse predictions, each but the first one
    /// starting from the coarse end state of rank `p - 1`.
    fn predict(&mut self, comm: &dyn Communicator, block: usize) -> Result<()> {
        let rank = comm.rank();
        let coarse_tag = tag(block, Payload::Coarse)?;
        let fine_tag = tag(block, Payload::Fine)?;

        let mut levels = self.controller.two_levels()?;
        levels.status.set_iteration(0);
        levels.status.set_state(State::Predicting);
        levels.seed()?;

        for j in 0..=rank {
            if j > 0 {
                levels.coarse.initial_state_mut().recv(comm, rank - 1, coarse_tag, true)?;
                levels.coarse.reevaluate(levels.status, true)?;
            }
            levels.predict_coarse()?;
            if !comm.is_last() {
                levels.coarse.end_state().send(comm, rank + 1, coarse_tag, true)?;
            }
        }

        levels.cycle_up(true)?;
        levels.sweep_fine()?;
        if !comm.is_last() {
            levels.fine.end_state().send(comm, rank + 1, fine_tag, true)?;
        }
        Ok(())
    }

    /// Iterate the current block until this rank and all before it stopped
    ///
    /// Returns whether the stop was caused by the residual tolerances.
    fn iterate(&mut self, comm: &dyn Communicator, block: usize) -> Result<bool> {
        let rank = comm.rank();
        let coarse_tag = tag(block, Payload::Coarse)?;
        let fine_tag = tag(block, Payload::Fine)?;
        let status_tag = tag(block, Payload::Status)?;

        // the fine end state of the predecessor lags one iteration behind
        let mut previous_final_received = false;

        let converged = loop {
            let status = *self.controller.status();
            let local = self.controller.finest_mut()?.converged(&status)?;
            self.flags.recv(comm, status_tag)?;
            let previous = self.flags.previous_converged(comm);

            let converged = local && previous;
            let done = converged || status.iteration() >= status.max_iterations();
            self.flags.set_converged(rank, done);

            self.controller.status.set_state(if done { State::Converged } else { State::Iterating });
            self.flags.send(comm, &self.controller.status, status_tag)?;
            self.controller.notify_iteration();

            if done {
                break converged;
            }

            let iteration = self.controller.status.iteration() + 1;
            self.controller.status.set_iteration(iteration);

            let mut levels = self.controller.two_levels()?;
            levels.save()?;
            levels.cycle_down()?;

            if !comm.is_first() && !previous {
                levels.coarse.initial_state_mut().recv(comm, rank - 1, coarse_tag, true)?;
                levels.coarse.reevaluate(levels.status, true)?;
            }
            levels.sweep_coarse()?;
            if !comm.is_last() {
                levels.coarse.end_state().send(comm, rank + 1, coarse_tag, true)?;
            }

            levels.cycle_up(false)?;

            let receive_fine = !comm.is_first() && (!previous || !previous_final_received);
            if receive_fine {
                levels.fine.initial_state_mut().recv(comm, rank - 1, fine_tag, true)?;
                levels.fine.reevaluate(levels.status, true)?;
                previous_final_received = previous;
            }

            levels.sweep_fine()?;
            if !comm.is_last() {
                levels.fine.end_state().send(comm, rank + 1, fine_tag, true)?;
            }
        };

        if !comm.is_first() && !previous_final_received {
            let mut scratch = self.controller.finest()?.factory().create();
            scratch.recv(comm, rank - 1, fine_tag, true)?;
            log::trace!(
                target: "pfasst::controller",
                "{}: drained final fine state of rank {}",
                comm.name(), rank - 1
            );
        }

        Ok(converged)
    }
}

impl<E: StateContainer> TimeIntegrator<E> for TwoLevelPfasst<E> {
    fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut Controller<E> {
        &mut self.controller
    }

    /// Validate the levels and the communicator and shift the clock to this rank's first step
    fn setup(&mut self) -> Result<()> {
        let comm = self.comm()?;
        self.controller.two_levels()?;
        self.controller.setup()?;

        let num_steps = self.controller.status.num_steps();
        if num_steps % comm.size() != 0 {
            self.controller.ready = false;
            return Err(PfasstError::configuration(format!(
                "{} time steps can not be distributed evenly over {} ranks",
                num_steps,
                comm.size()
            )));
        }

        let status = &mut self.controller.status;
        let t0 = status.time() - status.step() as f64 * status.dt();
        status.set_step(comm.rank());
        status.set_time(t0 + comm.rank() as f64 * status.dt());

        self.flags = ConvergenceFlags::new(comm.size());
        Ok(())
    }

    fn run(&mut self) -> Result<SimulationResult<E>> {
        self.controller.ensure_ready()?;
        let comm = self.comm()?;
        let comm = comm.as_ref();

        // the initial state belongs to the start of the block, not to this rank's step
        let status = self.controller.status();
        let block_start = status.time() - (status.step() % comm.size()) as f64 * status.dt();
        let mut result = SimulationResult::new(block_start, self.controller.finest()?.initial_state().clone());
        result.add_metadata("rank", &comm.rank().to_string());

        let mut block = 0;
        loop {
            log::info!(
                target: "pfasst::controller",
                "{}: PFASST time step {} of {}",
                comm.name(),
                self.controller.status().step() + 1,
                self.controller.status().num_steps()
            );

            self.flags.clear();
            self.predict(comm, block)?;
            let converged = self.iterate(comm, block)?;

            let status = *self.controller.status();
            self.controller.finest_mut()?.compute_residuals(&status)?;
            self.controller.finish_step(&mut result, converged)?;

            let mut block_end = self.controller.finest()?.end_state().clone();
            block_end.bcast(comm, comm.size() - 1)?;

            if !self.controller.has_next_step(comm.size()) || !self.controller.advance_time(comm.size())? {
                result.final_state = block_end;
                break;
            }

            let status = *self.controller.status();
            let fine = self.controller.finest_mut()?;
            fine.initial_state_mut().copy_from(&block_end)?;
            fine.reevaluate(&status, true)?;
            block += 1;
        }

        comm.cleanup()?;

        result.add_metadata("integrator", self.name());
        result.add_metadata("time steps", &result.num_steps().to_string());
        result.add_metadata("dt", &self.controller.status().dt().to_string());
        result.add_metadata("total iterations", &result.total_iterations().to_string());
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "PFASST"
    }
}

// =================================================================================================
// In-process world
// =================================================================================================

/// Run PFASST on `size` in-process ranks, one thread each
///
/// `build` is called on every rank thread with that rank's communicator and
/// must return an integrator that has the communicator installed, is set up
/// and has its initial state assigned. When a rank fails it aborts the
/// world so that no other rank keeps waiting for it.
///
/// Results are returned in rank order.
///
/// # Errors
///
/// The first error of a rank that did not merely observe the abort, or a
/// communication error when a rank thread panicked.
pub fn run_pfasst_world<E, F>(size: usize, build: F) -> Result<Vec<SimulationResult<E>>>
where
    E: StateContainer,
    F: Fn(Arc<dyn Communicator>) -> Result<TwoLevelPfasst<E>> + Send + Sync,
{
    if size == 0 {
        return Err(PfasstError::configuration("a PFASST world needs at least one rank"));
    }

    let build = &build;
    let outcomes: Vec<Result<SimulationResult<E>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = ThreadCommunicator::world(size)
            .into_iter()
            .map(|comm| {
                scope.spawn(move || {
                    let comm: Arc<dyn Communicator> = Arc::new(comm);
                    let outcome = build(Arc::clone(&comm)).and_then(|mut pfasst| pfasst.run());
                    if let Err(err) = &outcome {
                        log::error!(target: "pfasst::controller", "{} failed: {}", comm.name(), err);
                        comm.abort(1);
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(PfasstError::Communication(format!("rank {} panicked", rank))))
            })
            .collect()
    });

    let root_cause = outcomes
        .iter()
        .position(|o| matches!(o, Err(e) if !matches!(e, PfasstError::Communication(_))))
        .or_else(|| outcomes.iter().position(Result::is_err));

    match root_cause {
        Some(rank) => match outcomes.into_iter().nth(rank) {
            Some(Err(err)) => Err(err),
            _ => Err(PfasstError::Communication(format!("rank {} failed", rank))),
        },
        None => outcomes.into_iter().collect(),
    }
}

// =================================================================================================
// Tests
// =================================================================================================
