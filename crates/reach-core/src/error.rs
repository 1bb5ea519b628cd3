use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for reachability analysis.
#[derive(Debug, Error)]
pub enum ReachError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Invalid grid, cache or engine parameters.
///
/// Surfaced immediately and fatal to the call that produced it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid resolution: {0} (must be > 0)")]
    InvalidResolution(f64),

    #[error("Inverted bounds on axis {axis}: min={min} > max={max}")]
    InvertedBounds { axis: char, min: f64, max: f64 },

    #[error("At least one orientation is required")]
    EmptyOrientations,

    #[error("Quaternion {0:?} is not unit length")]
    NonUnitQuaternion([f64; 4]),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Engine used before initialize()")]
    NotInitialized,
}

/// Seed cache persistence and generation errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cache encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache generation failed: {0}")]
    GenerationFailed(String),

    #[error("Incompatible cache: {0}")]
    Incompatible(String),
}

/// Malformed input handed to the result exporter.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ExportError {
    #[error("Workspace has no points")]
    EmptyWorkspace,

    #[error("{points} points cannot be split into groups of {orientations} orientations")]
    LengthMismatch { points: usize, orientations: usize },

    #[error("Point index {index} is out of range for {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Joint names of point {index} differ from the first reachable point")]
    JointMismatch { index: usize },

    #[error("Invalid time step: {0} (must be > 0)")]
    InvalidTimeStep(f64),
}

/// Error taxonomy reported by an IK solver.
///
/// These never escape a batch evaluation: the driver maps each one onto a
/// [`SolveOutcome`](crate::types::SolveOutcome) and records it per point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IkError {
    #[error("No IK solution found")]
    NoSolution,

    #[error("IK solve exceeded its timeout")]
    Timeout,

    #[error("Unknown kinematic group: {0}")]
    UnknownGroup(String),

    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Frame transform failed: {0}")]
    FrameTransform(String),

    #[error("Seed has {got} joints, group expects {expected}")]
    SeedMismatch { expected: usize, got: usize },

    #[error("Solver failure: {0}")]
    Internal(String),
}
