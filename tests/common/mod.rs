//! Common utilities for integration tests

#![allow(dead_code)]

pub mod mock_problems;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_problems::{DampedRotation, TimeForcedDecay};
pub use test_helpers::{
    build_mlsdc,
    build_mlsdc_levels,
    build_pfasst,
    build_pfasst_levels,
    build_sdc,
    convergence_orders,
    max_abs_error,
    relative_error,
    RunSetup,
    TwoLevelSetup,
};
