//! Transfer between a coarse and a fine level
//!
//! A [`LevelTransfer`] moves data between two [`Sweeper`]s: prolongation of
//! node states (`interpolate`), the complementary `restrict`, and the FAS
//! correction that lets the coarse sweep reproduce fine accuracy.
//!
//! # FAS correction
//!
//! Written node to node, with `R` the spatial restriction:
//!
//! ```text
//! tau_coarse[m] = R(dt (S F_fine)[m] + tau_fine[m]) - dt (S F_coarse)[m]
//! ```
//!
//! The correction depends on both levels' current right-hand sides and is
//! recomputed on every cycle down.
//!
//! # Implementations
//!
//! - [`FasTransfer`]: correction-form transfer over a [`SpatialTransfer`]
//! - [`NoTransfer`]: no hooks, every operation fails with
//!   [`PfasstError::NotImplemented`]
//! - spatial operators: [`IdentitySpace`] for equal grids,
//!   [`PeriodicLinear1d`] for 2:1 periodic grids

mod fas;
mod spatial;

pub use fas::FasTransfer;
pub use spatial::{IdentitySpace, PeriodicLinear1d, SpatialTransfer};

use crate::controller::status::Status;
use crate::encap::StateContainer;
use crate::error::{PfasstError, Result};
use crate::sweeper::Sweeper;

/// Data movement between two adjacent levels
///
/// Every operation defaults to [`PfasstError::NotImplemented`].
pub trait LevelTransfer<E: StateContainer>: Send {
    fn name(&self) -> &str {
        "transfer"
    }

    /// Project the coarse initial state onto the fine level
    fn interpolate_initial(&mut self, _coarse: &Sweeper<E>, _fine: &mut Sweeper<E>, _status: &Status) -> Result<()> {
        Err(PfasstError::not_implemented(format!("interpolate_initial for {}", self.name())))
    }

    /// Project every coarse node state, and the initial state if asked, onto the fine level
    fn interpolate(
        &mut self,
        _coarse: &Sweeper<E>,
        _fine: &mut Sweeper<E>,
        _status: &Status,
        _initial: bool,
    ) -> Result<()> {
        Err(PfasstError::not_implemented(format!("interpolate for {}", self.name())))
    }

    /// Spatial prolongation of a single state
    fn interpolate_data(&mut self, _coarse: &E, _fine: &mut E) -> Result<()> {
        Err(PfasstError::not_implemented(format!("interpolate_data for {}", self.name())))
    }

    /// Restrict the fine initial state onto the coarse level
    fn restrict_initial(&mut self, _fine: &Sweeper<E>, _coarse: &mut Sweeper<E>, _status: &Status) -> Result<()> {
        Err(PfasstError::not_implemented(format!("restrict_initial for {}", self.name())))
    }

    /// Restrict every fine node state, and the initial state if asked
    fn restrict(
        &mut self,
        _fine: &Sweeper<E>,
        _coarse: &mut Sweeper<E>,
        _status: &Status,
        _initial: bool,
    ) -> Result<()> {
        Err(PfasstError::not_implemented(format!("restrict for {}", self.name())))
    }

    /// Spatial restriction of a single state
    fn restrict_data(&mut self, _fine: &E, _coarse: &mut E) -> Result<()> {
        Err(PfasstError::not_implemented(format!("restrict_data for {}", self.name())))
    }

    /// Overwrite the coarse FAS corrections for a step of width `dt`
    fn fas(&mut self, _dt: f64, _fine: &Sweeper<E>, _coarse: &mut Sweeper<E>) -> Result<()> {
        Err(PfasstError::not_implemented(format!("fas for {}", self.name())))
    }
}

/// Transfer without any operators
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransfer;

impl<E: StateContainer> LevelTransfer<E> for NoTransfer {
    fn name(&self) -> &str {
        "no transfer"
    }
}
