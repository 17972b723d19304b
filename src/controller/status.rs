//! Simulation clock, iteration counters and convergence state
//!
//! One [`Status`] lives in every controller. Sweepers and transfers receive it
//! by reference for the duration of a phase call, which keeps the single
//! owner explicit while every level still sees the same clock.
//!
//! # Wire record
//!
//! Distributed runs exchange statuses verbatim. [`StatusDetail`] is the
//! fixed-layout record that travels between ranks; both ends must agree on
//! field order and widths:
//!
//! ```text
//! offset  size  field
//!      0     4  state            (i32, see `State`)
//!      4     4  reserved         (zero, keeps the record free of padding)
//!      8     8  step             (u64)
//!     16     8  num_steps        (u64)
//!     24     8  iteration        (u64)
//!     32     8  max_iterations   (u64)
//!     40     8  time             (f64)
//!     48     8  dt               (f64)
//!     56     8  t_end            (f64)
//!     64     8  abs_res_norm     (f64)
//!     72     8  rel_res_norm     (f64)
//! ```

use std::fmt;

use bytemuck::{Pod, Zeroable};

use crate::comm::Communicator;
use crate::error::{PfasstError, Result};

// =================================================================================================
// Algorithm phase
// =================================================================================================

/// Phase of the algorithm a controller is currently in
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    Unknown = 0,
    Predicting = 1,
    PreIterCoarse = 2,
    IterCoarse = 3,
    PostIterCoarse = 4,
    PreIterFine = 5,
    IterFine = 6,
    PostIterFine = 7,
    Iterating = 8,
    Converged = 9,
    Failed = 10,
}

impl State {
    /// Upper-case name as printed in log lines
    pub fn name(&self) -> &'static str {
        match self {
            State::Unknown => "UNKNOWN",
            State::Predicting => "PREDICTING",
            State::PreIterCoarse => "PRE_ITER_COARSE",
            State::IterCoarse => "ITER_COARSE",
            State::PostIterCoarse => "POST_ITER_COARSE",
            State::PreIterFine => "PRE_ITER_FINE",
            State::IterFine => "ITER_FINE",
            State::PostIterFine => "POST_ITER_FINE",
            State::Iterating => "ITERATING",
            State::Converged => "CONVERGED",
            State::Failed => "FAILED",
        }
    }
}

impl TryFrom<i32> for State {
    type Error = PfasstError;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            0 => State::Unknown,
            1 => State::Predicting,
            2 => State::PreIterCoarse,
            3 => State::IterCoarse,
            4 => State::PostIterCoarse,
            5 => State::PreIterFine,
            6 => State::IterFine,
            7 => State::PostIterFine,
            8 => State::Iterating,
            9 => State::Converged,
            10 => State::Failed,
            other => {
                return Err(PfasstError::Communication(format!(
                    "invalid state value {} in status record",
                    other
                )));
            }
        })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =================================================================================================
// Wire record
// =================================================================================================

/// Fixed-layout status record exchanged between ranks
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StatusDetail {
    pub state: i32,
    pub reserved: u32,
    pub step: u64,
    pub num_steps: u64,
    pub iteration: u64,
    pub max_iterations: u64,
    pub time: f64,
    pub dt: f64,
    pub t_end: f64,
    pub abs_res_norm: f64,
    pub rel_res_norm: f64,
}

// =================================================================================================
// Status
// =================================================================================================

/// Shared clock and convergence bookkeeping of one controller
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Status {
    detail: StatusDetail,
}

impl Status {
    /// Fresh status: every counter zero, state `UNKNOWN`
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field to its initial value
    pub fn clear(&mut self) {
        self.detail = StatusDetail::default();
    }

    /// The raw record as sent over the wire
    pub fn detail(&self) -> &StatusDetail {
        &self.detail
    }

    /// Build a status from a received record
    pub fn from_detail(detail: StatusDetail) -> Result<Self> {
        State::try_from(detail.state)?;
        Ok(Self { detail })
    }

    pub fn state(&self) -> State {
        State::try_from(self.detail.state).unwrap_or_default()
    }

    pub fn set_state(&mut self, state: State) {
        self.detail.state = state as i32;
    }

    pub fn step(&self) -> usize {
        self.detail.step as usize
    }

    pub fn set_step(&mut self, step: usize) {
        self.detail.step = step as u64;
    }

    pub fn num_steps(&self) -> usize {
        self.detail.num_steps as usize
    }

    pub fn set_num_steps(&mut self, num_steps: usize) {
        self.detail.num_steps = num_steps as u64;
    }

    pub fn iteration(&self) -> usize {
        self.detail.iteration as usize
    }

    pub fn set_iteration(&mut self, iteration: usize) {
        self.detail.iteration = iteration as u64;
    }

    pub fn max_iterations(&self) -> usize {
        self.detail.max_iterations as usize
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.detail.max_iterations = max_iterations as u64;
    }

    /// Start of the current time step
    pub fn time(&self) -> f64 {
        self.detail.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.detail.time = time;
    }

    pub fn dt(&self) -> f64 {
        self.detail.dt
    }

    pub fn set_dt(&mut self, dt: f64) {
        self.detail.dt = dt;
    }

    pub fn t_end(&self) -> f64 {
        self.detail.t_end
    }

    pub fn set_t_end(&mut self, t_end: f64) {
        self.detail.t_end = t_end;
    }

    pub fn abs_res_norm(&self) -> f64 {
        self.detail.abs_res_norm
    }

    pub fn set_abs_res_norm(&mut self, norm: f64) {
        self.detail.abs_res_norm = norm;
    }

    pub fn rel_res_norm(&self) -> f64 {
        self.detail.rel_res_norm
    }

    pub fn set_rel_res_norm(&mut self, norm: f64) {
        self.detail.rel_res_norm = norm;
    }

    /// Short multi-line report of the finished step
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("Number Iterations: {}", self.iteration()),
            format!("Absolute Residual: {:.6e}", self.abs_res_norm()),
            format!("Relative Residual: {:.6e}", self.rel_res_norm()),
        ]
    }

    /// Send the wire record to `dest`
    pub fn send(&self, comm: &dyn Communicator, dest: usize, tag: i32, blocking: bool) -> Result<()> {
        if blocking {
            comm.send_status(&self.detail, dest, tag)
        } else {
            comm.isend_status(&self.detail, dest, tag)
        }
    }

    /// Receive a wire record from `src` and replace this status with it
    ///
    /// A non-blocking call only posts the request; the record is read by the
    /// next blocking receive on the same `(src, tag)`.
    pub fn recv(&mut self, comm: &dyn Communicator, src: usize, tag: i32, blocking: bool) -> Result<()> {
        if !blocking {
            return comm.irecv_status(src, tag);
        }

        let mut detail = StatusDetail::default();
        comm.recv_status(&mut detail, src, tag)?;
        *self = Self::from_detail(detail)?;
        Ok(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status(t={:.6}, dt={:.6}, t_end={:.6}, step={}, num_steps={}, iter={}, iter_max={}, state={}, abs_res={:.6e}, rel_res={:.6e})",
            self.time(),
            self.dt(),
            self.t_end(),
            self.step(),
            self.num_steps(),
            self.iteration(),
            self.max_iterations(),
            self.state(),
            self.abs_res_norm(),
            self.rel_res_norm()
        )
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadCommunicator;

    #[test]
    fn test_fresh_status_is_zeroed() {
        let status = Status::new();
        assert_eq!(status.step(), 0);
        assert_eq!(status.iteration(), 0);
        assert_eq!(status.time(), 0.0);
        assert_eq!(status.dt(), 0.0);
        assert_eq!(status.abs_res_norm(), 0.0);
        assert_eq!(status.rel_res_norm(), 0.0);
        assert_eq!(status.state(), State::Unknown);
    }

    #[test]
    fn test_setters() {
        let mut status = Status::new();
        status.set_step(1);
        status.set_iteration(1);
        status.set_time(1.42);
        status.set_dt(0.42);
        status.set_state(State::Converged);
        status.set_abs_res_norm(0.1);

        assert_eq!(status.step(), 1);
        assert_eq!(status.iteration(), 1);
        assert_eq!(status.time(), 1.42);
        assert_eq!(status.dt(), 0.42);
        assert_eq!(status.state(), State::Converged);
        assert_eq!(status.abs_res_norm(), 0.1);

        status.clear();
        assert_eq!(status, Status::new());
    }

    #[test]
    fn test_wire_record_layout() {
        assert_eq!(std::mem::size_of::<StatusDetail>(), 80);
        assert_eq!(std::mem::align_of::<StatusDetail>(), 8);
    }

    #[test]
    fn test_state_round_trips_through_i32() {
        for state in [State::Unknown, State::Predicting, State::IterFine, State::Converged, State::Failed] {
            assert_eq!(State::try_from(state as i32).unwrap(), state);
        }
        assert!(State::try_from(42).is_err());
    }

    #[test]
    fn test_send_and_receive_between_ranks() {
        let mut world = ThreadCommunicator::world(2);
        let receiver = world.pop().unwrap();
        let sender = world.pop().unwrap();

        let mut status = Status::new();
        status.set_state(State::Iterating);
        status.set_step(3);
        status.set_rel_res_norm(1e-3);
        status.send(&sender, 1, 0, true).unwrap();
        status.send(&sender, 1, 0, false).unwrap();

        let mut received = Status::new();
        received.recv(&receiver, 0, 0, false).unwrap();
        received.recv(&receiver, 0, 0, true).unwrap();
        assert_eq!(received, status);

        received.recv(&receiver, 0, 0, true).unwrap();
        assert_eq!(received.state(), State::Iterating);
    }

    #[test]
    fn test_display_and_summary() {
        let mut status = Status::new();
        status.set_iteration(3);
        let line = status.to_string();
        assert!(line.starts_with("Status(t="));
        assert!(line.contains("iter=3"));
        assert_eq!(status.summary()[0], "Number Iterations: 3");
    }
}
