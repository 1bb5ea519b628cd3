//! Workspace reachability engine.
//!
//! Samples a pose grid over a bounding box, asks an [`IkSolver`] whether
//! each pose can be reached, and turns the results into index lists,
//! markers and playback trajectories. A persisted [`SeedCache`] of known
//! good joint states can seed the solver to speed up repeated queries.
//!
//! # Architecture
//!
//! ```text
//! grid ──► driver (IkSolver + SeedCache) ──► classify ──► export
//!                      ▲
//!                   engine
//! ```
//!
//! [`IkSolver`]: reach_core::traits::IkSolver

pub mod cache;
pub mod classify;
pub mod driver;
pub mod engine;
pub mod export;
pub mod grid;

pub use cache::{CACHE_VERSION, CellKey, SeedCache};
pub use classify::{
    Partition, classify, filter_reachable, indices_at_orientation, indices_within_range,
    points_at_orientation, points_within_range, remove_unreachable,
};
pub use driver::{Evaluation, IkDriver, native_pose};
pub use engine::{CacheState, EngineConfig, EvaluationSummary, ReachabilityEngine};
pub use export::{
    Color, DisplayTrajectory, MarkerArray, MarkerDescriptor, MarkerShape, PositionIndex,
    TrajectoryPoint, arrow_markers, display_trajectory, markers, markers_at_orientation,
    markers_at_orientations, point_index, position_index, split_index,
};
