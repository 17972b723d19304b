//! Convergence flag propagation along the time-slice pipeline
//!
//! Each rank tells its successor whether it has stopped iterating by sending
//! its status record. A rank that already knows its predecessor stopped does
//! not wait for further records from it, so late stragglers never block a
//! pipeline whose head is finished.

use crate::comm::Communicator;
use crate::controller::status::{State, Status};
use crate::error::Result;

/// Per-rank "stopped iterating" flags as seen by one rank
#[derive(Clone, Debug)]
pub struct ConvergenceFlags {
    converged: Vec<bool>,
}

impl ConvergenceFlags {
    /// Flags for a world of `size` ranks, all unset
    pub fn new(size: usize) -> Self {
        Self { converged: vec![false; size] }
    }

    /// Forget every flag, done at the start of each block of time-slices
    pub fn clear(&mut self) {
        self.converged.iter_mut().for_each(|flag| *flag = false);
    }

    pub fn set_converged(&mut self, rank: usize, converged: bool) {
        if let Some(flag) = self.converged.get_mut(rank) {
            *flag = converged;
        }
    }

    pub fn converged(&self, rank: usize) -> bool {
        self.converged.get(rank).copied().unwrap_or(false)
    }

    /// Whether the rank before `comm.rank()` is known to have stopped
    ///
    /// The first rank has no predecessor and treats it as stopped.
    pub fn previous_converged(&self, comm: &dyn Communicator) -> bool {
        comm.is_first() || self.converged(comm.rank() - 1)
    }

    /// Send this rank's status to its successor, skipped on the last rank
    pub fn send(&self, comm: &dyn Communicator, status: &Status, tag: i32) -> Result<()> {
        if comm.is_last() {
            return Ok(());
        }
        status.send(comm, comm.rank() + 1, tag, true)
    }

    /// Receive the predecessor's status unless it is already known to be done
    ///
    /// Returns `true` when a record was actually received.
    pub fn recv(&mut self, comm: &dyn Communicator, tag: i32) -> Result<bool> {
        if comm.is_first() {
            return Ok(false);
        }

        let previous = comm.rank() - 1;
        if self.converged(previous) {
            log::debug!(
                target: "pfasst::comm",
                "{}: rank {} already stopped, not waiting for its status",
                comm.name(), previous
            );
            return Ok(false);
        }

        let mut remote = Status::new();
        remote.recv(comm, previous, tag, true)?;
        self.set_converged(previous, remote.state() == State::Converged);
        Ok(true)
    }
}
