//! Inverse kinematics backend for reachability analysis.
//!
//! Provides forward kinematics, geometric Jacobians and Damped Least Squares
//! solving for serial chains taken from URDF robot models, plus a registry of
//! named groups implementing [`IkSolver`](reach_core::traits::IkSolver).
//!
//! # Architecture
//!
//! ```text
//! RobotModel ──► KinematicChain ──► DlsSolver ──► KinematicsSolver (IkSolver)
//! ```

pub mod chain;
pub mod kinematics;
pub mod solver;

pub use chain::{ChainFrames, ChainJoint, KinematicChain};
pub use kinematics::{KinematicsConfig, KinematicsSolver, TargetMode};
pub use solver::{DlsConfig, DlsSolver, IkResult, IkTarget, Termination};
