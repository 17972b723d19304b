//! Phase sequences shared by the two-level integrators

use crate::controller::status::{State, Status};
use crate::encap::StateContainer;
use crate::error::Result;
use crate::sweeper::Sweeper;
use crate::transfer::LevelTransfer;

/// Mutable view of a two-level controller
pub(crate) struct TwoLevels<'a, E: StateContainer> {
    pub(crate) coarse: &'a mut Sweeper<E>,
    pub(crate) fine: &'a mut Sweeper<E>,
    pub(crate) transfer: &'a mut dyn LevelTransfer<E>,
    pub(crate) status: &'a mut Status,
}

impl<E: StateContainer> TwoLevels<'_, E> {
    /// Seed both levels from the fine initial state
    pub(crate) fn seed(&mut self) -> Result<()> {
        self.transfer.restrict_initial(self.fine, self.coarse, self.status)?;
        self.coarse.spread()?;
        self.coarse.save()?;
        self.fine.spread()?;
        self.fine.save()
    }

    pub(crate) fn predict_coarse(&mut self) -> Result<()> {
        log::debug!(target: "pfasst::controller", "predicting on {} level", self.coarse.name());

        self.status.set_state(State::PreIterCoarse);
        self.coarse.pre_predict(self.status)?;

        self.status.set_state(State::IterCoarse);
        self.coarse.predict(self.status)?;

        self.status.set_state(State::PostIterCoarse);
        self.coarse.post_predict(self.status)?;

        self.status.set_state(State::Predicting);
        Ok(())
    }

    pub(crate) fn sweep_coarse(&mut self) -> Result<()> {
        log::debug!(target: "pfasst::controller", "sweeping on {} level", self.coarse.name());

        self.status.set_state(State::PreIterCoarse);
        self.coarse.pre_sweep(self.status)?;

        self.status.set_state(State::IterCoarse);
        self.coarse.sweep(self.status)?;

        self.status.set_state(State::PostIterCoarse);
        self.coarse.post_sweep(self.status)?;

        self.status.set_state(State::Iterating);
        Ok(())
    }

    pub(crate) fn sweep_fine(&mut self) -> Result<()> {
        log::debug!(target: "pfasst::controller", "sweeping on {} level", self.fine.name());

        self.status.set_state(State::PreIterFine);
        self.fine.pre_sweep(self.status)?;

        self.status.set_state(State::IterFine);
        self.fine.sweep(self.status)?;

        self.status.set_state(State::PostIterFine);
        self.fine.post_sweep(self.status)?;

        self.status.set_state(State::Iterating);
        Ok(())
    }

    /// Restrict onto the coarse level and refresh its FAS corrections
    pub(crate) fn cycle_down(&mut self) -> Result<()> {
        self.transfer.restrict(self.fine, self.coarse, self.status, true)?;
        self.transfer.fas(self.status.dt(), self.fine, self.coarse)?;
        self.coarse.save()
    }

    /// Add the coarse correction to the fine level
    pub(crate) fn cycle_up(&mut self, initial: bool) -> Result<()> {
        self.transfer.interpolate(self.coarse, self.fine, self.status, initial)?;
        self.fine.integrate_end_state(self.status.dt())
    }

    /// Copy node states into previous states on both levels
    pub(crate) fn save(&mut self) -> Result<()> {
        self.fine.save()?;
        self.coarse.save()
    }
}
