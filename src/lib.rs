//! pfasst-rs: spectral deferred correction time integrators
//!
//! Iterative solvers for initial value problems `u' = F(t, u)` built on
//! collocation quadrature: single-level SDC, two-level MLSDC with FAS
//! corrections, and PFASST, which pipelines MLSDC over time-slices owned by
//! the ranks of a communicator.
//!
//! # Architecture
//!
//! The crate is built around two separations:
//!
//! 1. **Algorithm vs. problem**
//!    - Controllers ([`controller`]) decide when to predict, sweep, transfer
//!      and communicate
//!    - Sweepers ([`sweeper`]) and their problems decide what a sweep computes
//!
//! 2. **Numerics vs. data**
//!    - States are opaque [`encap::StateContainer`]s, produced by factories
//!    - Ranks exchange raw payloads through a [`comm::Communicator`]
//!
//! ```text
//!      TimeIntegrator (Sdc | TwoLevelMlsdc | TwoLevelPfasst)
//!                           │
//!                      Controller ── Status ── Communicator
//!                     ╱         ╲
//!             Sweeper (coarse)  Sweeper (fine)
//!                     ╲         ╱
//!                    LevelTransfer
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use pfasst_rs::prelude::*;
//!
//! # fn main() -> pfasst_rs::error::Result<()> {
//! let problem = Dahlquist::new(-0.5, -1.0);
//! let initial = problem.initial_state();
//!
//! let mut sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
//!     .with_quadrature(quadrature_factory(3, QuadratureType::GaussLobatto)?);
//! sweeper.set_abs_residual_tol(1e-12);
//!
//! let mut sdc = Sdc::new();
//! sdc.controller_mut().add_sweeper(sweeper, false);
//! sdc.controller_mut().set_options(&Options::new().with("dt", 0.1).with("t_end", 1.0).with("max_iters", 8))?;
//! sdc.setup()?;
//! *sdc.controller_mut().finest_mut()?.initial_state_mut() = initial;
//!
//! let result = sdc.run()?;
//! println!("{} steps, {} iterations", result.num_steps(), result.total_iterations());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`controller`]: SDC, MLSDC and PFASST drivers, status and results
//! - [`sweeper`]: per-level node storage and the IMEX scheme
//! - [`quadrature`]: collocation nodes and integration matrices
//! - [`transfer`]: restriction, interpolation and FAS corrections
//! - [`encap`]: state containers and factories
//! - [`comm`]: message passing between time-slices
//! - [`problems`]: model problems with exact solutions
//! - [`config`]: named run options
//! - [`output`]: CSV export of results

pub mod comm;
pub mod config;
pub mod controller;
pub mod encap;
pub mod error;
pub mod output;
pub mod problems;
pub mod quadrature;
pub mod sweeper;
pub mod transfer;

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use pfasst_rs::prelude::*;
    //! ```
    pub use crate::comm::{Communicator, ThreadCommunicator};
    pub use crate::config::Options;
    pub use crate::controller::{
        Controller, Sdc, SimulationResult, State, Status, TimeIntegrator, TwoLevelMlsdc, TwoLevelPfasst,
        run_pfasst_world,
    };
    pub use crate::encap::{StateContainer, StateFactory, VectorEncapsulation, VectorFactory};
    pub use crate::error::{PfasstError, Result};
    pub use crate::problems::{AdvectionDiffusion, Dahlquist};
    pub use crate::quadrature::{Quadrature, QuadratureType, quadrature_factory};
    pub use crate::sweeper::{Imex, ImexProblem, Sweeper};
    pub use crate::transfer::{FasTransfer, IdentitySpace, LevelTransfer, PeriodicLinear1d};
}
