//! Correction-form transfer with FAS
//!
//! Interpolation does not overwrite fine states. It adds the prolongated
//! coarse *correction*, the change the coarse sweep made since the last
//! `save()`:
//!
//! ```text
//! u_fine[m] += I(u_coarse[m] - u_coarse_previous[m])
//! u0_fine   += I(u0_coarse - R(u0_fine))
//! ```
//!
//! Restriction overwrites the coarse states with `R(u_fine[m])`. After
//! either direction the receiving level re-evaluates its right-hand sides so
//! that subsequent integrals see the new states.
//!
//! Both levels must use the same number of quadrature nodes; only the
//! spatial resolution differs.

use crate::controller::status::Status;
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::sweeper::Sweeper;
use crate::transfer::{LevelTransfer, SpatialTransfer};

/// FAS transfer over a spatial operator
#[derive(Clone, Debug, Default)]
pub struct FasTransfer<S> {
    space: S,
}

impl<S> FasTransfer<S> {
    pub fn new(space: S) -> Self {
        Self { space }
    }

    pub fn space(&self) -> &S {
        &self.space
    }
}

fn ensure_same_nodes<E: StateContainer>(first: &Sweeper<E>, second: &Sweeper<E>) -> Result<()> {
    let (a, b) = (first.states().len(), second.states().len());
    if a != b {
        return Err(PfasstError::configuration(format!(
            "transfer between levels with {} and {} nodes is not supported",
            a, b
        )));
    }
    Ok(())
}

impl<E: StateContainer, S: SpatialTransfer<E>> LevelTransfer<E> for FasTransfer<S> {
    fn name(&self) -> &str {
        "FAS"
    }

    fn interpolate_initial(&mut self, coarse: &Sweeper<E>, fine: &mut Sweeper<E>, status: &Status) -> Result<()> {
        let mut restricted = coarse.factory().create();
        self.space.restrict(fine.initial_state(), &mut restricted)?;

        let mut delta = coarse.initial_state().clone();
        delta.scaled_add(-1.0, &restricted)?;

        let mut correction = fine.factory().create();
        self.space.interpolate(&delta, &mut correction)?;
        fine.initial_state_mut().scaled_add(1.0, &correction)?;

        fine.reevaluate(status, true)
    }

    fn interpolate(
        &mut self,
        coarse: &Sweeper<E>,
        fine: &mut Sweeper<E>,
        status: &Status,
        initial: bool,
    ) -> Result<()> {
        ensure_same_nodes(coarse, fine)?;

        if initial {
            self.interpolate_initial(coarse, fine, status)?;
        }

        let mut correction = fine.factory().create();
        for (m, (state, previous)) in coarse.states().iter().zip(coarse.previous_states()).enumerate() {
            let mut delta = state.clone();
            delta.scaled_add(-1.0, previous)?;
            self.space.interpolate(&delta, &mut correction)?;
            fine.states_mut()[m].scaled_add(1.0, &correction)?;
        }

        fine.reevaluate(status, false)
    }

    fn interpolate_data(&mut self, coarse: &E, fine: &mut E) -> Result<()> {
        self.space.interpolate(coarse, fine)
    }

    fn restrict_initial(&mut self, fine: &Sweeper<E>, coarse: &mut Sweeper<E>, status: &Status) -> Result<()> {
        self.space.restrict(fine.initial_state(), coarse.initial_state_mut())?;
        coarse.reevaluate(status, true)
    }

    fn restrict(&mut self, fine: &Sweeper<E>, coarse: &mut Sweeper<E>, status: &Status, initial: bool) -> Result<()> {
        ensure_same_nodes(fine, coarse)?;

        if initial {
            self.restrict_initial(fine, coarse, status)?;
        }

        for (m, state) in fine.states().iter().enumerate() {
            self.space.restrict(state, &mut coarse.states_mut()[m])?;
        }

        coarse.reevaluate(status, false)
    }

    fn restrict_data(&mut self, fine: &E, coarse: &mut E) -> Result<()> {
        self.space.restrict(fine, coarse)
    }

    fn fas(&mut self, dt: f64, fine: &Sweeper<E>, coarse: &mut Sweeper<E>) -> Result<()> {
        ensure_same_nodes(fine, coarse)?;

        let fine_integrals = fine.integrate(dt)?;
        let coarse_integrals = coarse.integrate(dt)?;

        for (m, (fine_integral, fine_tau)) in fine_integrals.iter().zip(fine.tau()).enumerate() {
            let mut combined = fine_integral.clone();
            combined.scaled_add(1.0, fine_tau)?;

            let tau = &mut coarse.tau_mut()[m];
            self.space.restrict(&combined, tau)?;
            tau.scaled_add(-1.0, &coarse_integrals[m])?;
        }

        log::trace!(target: "pfasst::transfer", "FAS correction updated for dt={}", dt);
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
