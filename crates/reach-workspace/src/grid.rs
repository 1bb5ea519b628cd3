//! Pose grid generation.
//!
//! A grid is the product of a regular position lattice over the workspace
//! bounds and the workspace's orientation list. Points are laid out
//! position-major, orientation-minor, with lattice positions ordered x
//! outermost, then y, then z:
//!
//! ```text
//! point_index = position_index * orientations.len() + orientation_index
//! ```

use reach_core::config::Tolerances;
use reach_core::error::ConfigError;
use reach_core::types::{Bounds, Pose, Workspace, WorkspacePoint, grid_len};
use tracing::debug;

/// Number of lattice positions inside `bounds`.
pub fn num_positions(bounds: &Bounds, resolution: f64, slack: f64) -> Result<usize, ConfigError> {
    let dims = bounds.lattice_dims(resolution, slack)?;
    grid_len(dims, 1, resolution)
}

/// Coordinate of sample `step` on an axis, clamped so it never passes `max`.
#[allow(clippy::cast_precision_loss)]
pub fn axis_value(min: f64, max: f64, resolution: f64, step: usize) -> f64 {
    (min + step as f64 * resolution).min(max)
}

/// Lattice positions in the grid's own frame, x outermost.
pub fn lattice_positions(
    bounds: &Bounds,
    resolution: f64,
    slack: f64,
) -> Result<Vec<[f64; 3]>, ConfigError> {
    let dims = bounds.lattice_dims(resolution, slack)?;
    let [nx, ny, nz] = dims;
    let value = |axis: usize, step: usize| {
        axis_value(bounds.min[axis], bounds.max[axis], resolution, step)
    };
    let mut positions = Vec::with_capacity(grid_len(dims, 1, resolution)?);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                positions.push([value(0, i), value(1, j), value(2, k)]);
            }
        }
    }
    Ok(positions)
}

/// Pending points for every `(position, orientation)` pair of `workspace`.
///
/// Positions are `origin * (min + i * resolution)` and orientations are
/// `origin.rotation * q`, so the grid can be placed anywhere in the planning
/// frame.
pub fn generate_points(
    workspace: &Workspace,
    tolerances: &Tolerances,
) -> Result<Vec<WorkspacePoint>, ConfigError> {
    workspace.validate(tolerances)?;
    let positions = lattice_positions(
        &workspace.bounds,
        workspace.position_resolution,
        tolerances.grid,
    )?;
    let mut points = Vec::with_capacity(positions.len() * workspace.orientations.len());
    for position in &positions {
        for orientation in &workspace.orientations {
            let local = Pose::new(*position, *orientation);
            points.push(WorkspacePoint::pending(workspace.origin.compose(&local)));
        }
    }
    debug!(
        group = %workspace.group_name,
        positions = positions.len(),
        orientations = workspace.orientations.len(),
        "generated pose grid"
    );
    Ok(points)
}

/// Replace `workspace.points` with a fresh pending grid.
pub fn generate(workspace: &mut Workspace, tolerances: &Tolerances) -> Result<(), ConfigError> {
    workspace.points = generate_points(workspace, tolerances)?;
    Ok(())
}

/// Lattice position a point index belongs to.
pub const fn position_of(point_index: usize, orientations: usize) -> usize {
    point_index / orientations
}

/// Orientation slot a point index belongs to.
pub const fn orientation_of(point_index: usize, orientations: usize) -> usize {
    point_index % orientations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
