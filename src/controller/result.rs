//! Run history returned by the integrators

use std::collections::HashMap;

use crate::controller::status::Status;
use crate::encap::StateContainer;

/// Outcome of one time step on the finest level
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    /// Zero-based step index
    pub step: usize,
    /// Time at the end of the step
    pub time: f64,
    pub iterations: usize,
    pub abs_res_norm: f64,
    pub rel_res_norm: f64,
    /// Whether the step stopped on a residual tolerance rather than the iteration limit
    pub converged: bool,
}

impl StepRecord {
    pub(crate) fn from_status(status: &Status, converged: bool) -> Self {
        Self {
            step: status.step(),
            time: status.time() + status.dt(),
            iterations: status.iteration(),
            abs_res_norm: status.abs_res_norm(),
            rel_res_norm: status.rel_res_norm(),
            converged,
        }
    }
}

/// Trajectory and per-step diagnostics of a run
///
/// `time_points[0]` and `state_trajectory[0]` hold the initial condition;
/// every further entry is the end of one step computed by this rank. PFASST
/// ranks all record the initial condition of the run, so only the first
/// rank's steps follow it without a gap.
#[derive(Clone, Debug)]
pub struct SimulationResult<E: StateContainer> {
    pub time_points: Vec<f64>,
    pub state_trajectory: Vec<E>,
    pub steps: Vec<StepRecord>,
    /// Solution at the end of the whole run
    pub final_state: E,
    pub metadata: HashMap<String, String>,
}

impl<E: StateContainer> SimulationResult<E> {
    pub fn new(initial_time: f64, initial_state: E) -> Self {
        Self {
            time_points: vec![initial_time],
            state_trajectory: vec![initial_state.clone()],
            steps: Vec::new(),
            final_state: initial_state,
            metadata: HashMap::new(),
        }
    }

    /// Append a finished step
    pub fn push_step(&mut self, record: StepRecord, end_state: E) {
        self.time_points.push(record.time);
        self.state_trajectory.push(end_state.clone());
        self.final_state = end_state;
        self.steps.push(record);
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Sum of iterations over all recorded steps
    pub fn total_iterations(&self) -> usize {
        self.steps.iter().map(|s| s.iterations).sum()
    }

    pub fn final_time(&self) -> f64 {
        self.time_points.last().copied().unwrap_or(0.0)
    }
}
