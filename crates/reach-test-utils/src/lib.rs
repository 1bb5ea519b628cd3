//! Shared test fixtures and utilities for the reach crates.
//!
//! Provides deterministic fake IK solvers, URDF strings for small arms,
//! workspace builders and seeded RNG setup.

pub mod fixtures;
pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{PLANAR_ARM_URDF, SIX_DOF_ARM_URDF, grid_workspace, sample_joint_state};
pub use mocks::{
    CountdownSolver, RecordedRequest, RecordingSolver, SeedEchoSolver, SphereSolver, TimeoutSolver,
};
pub use rng::{positions_in, random_orientation, seeded_rng};
