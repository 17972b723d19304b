//! Model problems for the IMEX scheme
//!
//! Both problems implement [`ImexProblem`](crate::sweeper::ImexProblem) over
//! [`VectorEncapsulation`](crate::encap::VectorEncapsulation) and know their
//! exact solution, which is what the convergence tests and demos compare
//! against.
//!
//! # Available Problems
//!
//! ## [`Dahlquist`]: scalar test equation
//!
//! `u' = λ_E u + λ_I u` with the first term treated explicitly and the
//! second implicitly. Every entry of the state evolves independently, so the
//! state length only matters for exercising multi-entry containers.
//!
//! ## [`AdvectionDiffusion`]: periodic 1D transport
//!
//! Central finite differences on a periodic grid, advection explicit and
//! diffusion implicit. The exact solution of the semi-discrete system is
//! known in closed form, so the time integration error can be measured
//! without any spatial error mixed in.

// =================================================================================================
// Module Declarations
// =================================================================================================

pub mod advection_diffusion;
pub mod dahlquist;

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use advection_diffusion::AdvectionDiffusion;
pub use dahlquist::Dahlquist;
