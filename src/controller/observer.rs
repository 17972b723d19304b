//! Progress reporting hooks
//!
//! Controllers report every convergence check and every finished step to a
//! [`RunObserver`] they own. The default [`LogObserver`] writes through the
//! `log` facade; [`SilentObserver`] drops everything.

use crate::controller::status::Status;

/// Receiver of controller progress events
pub trait RunObserver: Send {
    /// After a convergence check on the finest level
    fn on_iteration(&mut self, _status: &Status) {}

    /// After a time step finished
    fn on_step(&mut self, _status: &Status) {}
}

/// Writes progress lines to the `log` facade under a fixed target
#[derive(Clone, Debug)]
pub struct LogObserver {
    label: String,
}

impl LogObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new("controller")
    }
}

impl RunObserver for LogObserver {
    fn on_iteration(&mut self, status: &Status) {
        log::debug!(
            target: "pfasst::controller",
            "[{}] step {} iteration {}: {} abs_res={:.6e} rel_res={:.6e}",
            self.label,
            status.step() + 1,
            status.iteration(),
            status.state(),
            status.abs_res_norm(),
            status.rel_res_norm()
        );
    }

    fn on_step(&mut self, status: &Status) {
        log::info!(
            target: "pfasst::controller",
            "[{}] time step {} of {} done at t={:.6}",
            self.label,
            status.step() + 1,
            status.num_steps(),
            status.time() + status.dt()
        );
        for line in status.summary() {
            log::info!(target: "pfasst::controller", "[{}]   {}", self.label, line);
        }
    }
}

/// Ignores every event
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}
