//! Result exporter: pure transforms from an evaluated workspace into index
//! lists, marker descriptors and a playback trajectory.
//!
//! Nothing here calls the solver. The only failures are malformed inputs.

use reach_core::error::ExportError;
use reach_core::types::{Pose, Workspace, WorkspacePoint};
use serde::Serialize;

use crate::classify::{Partition, indices_at_orientation};
use crate::grid;

// ---------------------------------------------------------------------------
// Index lists
// ---------------------------------------------------------------------------

/// Lattice positions split by reachability.
///
/// `positions[i]` is the planning-frame position of lattice position `i`;
/// it is reachable when any of its orientations is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionIndex {
    pub positions: Vec<[f64; 3]>,
    pub reachable: Vec<usize>,
    pub unreachable: Vec<usize>,
}

fn check_layout(workspace: &Workspace) -> Result<usize, ExportError> {
    check_nonempty(workspace)?;
    let orientations = workspace.orientations.len();
    if orientations == 0 || workspace.len() % orientations != 0 {
        return Err(ExportError::LengthMismatch {
            points: workspace.len(),
            orientations,
        });
    }
    Ok(orientations)
}

fn check_nonempty(workspace: &Workspace) -> Result<(), ExportError> {
    if workspace.is_empty() {
        Err(ExportError::EmptyWorkspace)
    } else {
        Ok(())
    }
}

/// Group points by lattice position, relying on position-major ordering.
pub fn position_index(workspace: &Workspace) -> Result<PositionIndex, ExportError> {
    let orientations = check_layout(workspace)?;
    let mut index = PositionIndex::default();
    for (position, chunk) in workspace.points.chunks_exact(orientations).enumerate() {
        index.positions.push(chunk[0].pose().position);
        if chunk.iter().any(WorkspacePoint::is_reachable) {
            index.reachable.push(position);
        } else {
            index.unreachable.push(position);
        }
    }
    Ok(index)
}

/// Point index lists, failing on an empty workspace.
pub fn point_index(workspace: &Workspace) -> Result<Partition, ExportError> {
    check_nonempty(workspace)?;
    Ok(crate::classify::classify(workspace))
}

/// Lattice position and orientation slot of point `index`.
pub fn split_index(workspace: &Workspace, index: usize) -> Result<(usize, usize), ExportError> {
    let orientations = check_layout(workspace)?;
    if index >= workspace.len() {
        return Err(ExportError::IndexOutOfRange {
            index,
            len: workspace.len(),
        });
    }
    Ok((
        grid::position_of(index, orientations),
        grid::orientation_of(index, orientations),
    ))
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Sphere,
    Arrow,
}

/// RGBA in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const REACHABLE: Self = Self {
        r: 0.1,
        g: 0.8,
        b: 0.2,
        a: 0.9,
    };
    pub const UNREACHABLE: Self = Self {
        r: 0.85,
        g: 0.15,
        b: 0.1,
        a: 0.6,
    };

    fn for_point(point: &WorkspacePoint) -> Self {
        if point.is_reachable() {
            Self::REACHABLE
        } else {
            Self::UNREACHABLE
        }
    }
}

/// One visual element for the visualization collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    /// `"{ns}/reachable"` or `"{ns}/unreachable"`.
    pub namespace: String,
    /// Unique within its [`MarkerArray`].
    pub id: usize,
    pub shape: MarkerShape,
    pub pose: Pose,
    pub scale: [f64; 3],
    pub color: Color,
    /// Index of the workspace point this marker draws.
    pub point_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerArray {
    pub markers: Vec<MarkerDescriptor>,
}

impl MarkerArray {
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Markers in `namespace`.
    pub fn in_namespace<'m>(
        &'m self,
        namespace: &'m str,
    ) -> impl Iterator<Item = &'m MarkerDescriptor> {
        self.markers.iter().filter(move |m| m.namespace == namespace)
    }
}

fn namespace_for(ns: &str, point: &WorkspacePoint) -> String {
    if point.is_reachable() {
        format!("{ns}/reachable")
    } else {
        format!("{ns}/unreachable")
    }
}

fn build_markers(
    workspace: &Workspace,
    ns: &str,
    shape: MarkerShape,
    indices: impl IntoIterator<Item = usize>,
) -> MarkerArray {
    let res = workspace.position_resolution;
    let scale = match shape {
        MarkerShape::Sphere => [0.5 * res; 3],
        MarkerShape::Arrow => [0.8 * res, 0.1 * res, 0.1 * res],
    };
    let markers = indices
        .into_iter()
        .enumerate()
        .map(|(id, point_index)| {
            let point = &workspace.points[point_index];
            MarkerDescriptor {
                namespace: namespace_for(ns, point),
                id,
                shape,
                pose: *point.pose(),
                scale,
                color: Color::for_point(point),
                point_index,
            }
        })
        .collect();
    MarkerArray { markers }
}

/// A sphere per point, colored by reachability. Works on filtered
/// workspaces too, since markers do not depend on the grid layout.
pub fn markers(workspace: &Workspace, ns: &str) -> Result<MarkerArray, ExportError> {
    check_nonempty(workspace)?;
    Ok(build_markers(workspace, ns, MarkerShape::Sphere, 0..workspace.len()))
}

/// Sphere markers for the points whose orientation matches `orientation`.
pub fn markers_at_orientation(
    workspace: &Workspace,
    ns: &str,
    orientation: &[f64; 4],
    eps: f64,
) -> Result<MarkerArray, ExportError> {
    markers_at_orientations(workspace, ns, std::slice::from_ref(orientation), eps)
}

/// Sphere markers for the points matching any of `orientations`, each point
/// drawn once, in point order.
pub fn markers_at_orientations(
    workspace: &Workspace,
    ns: &str,
    orientations: &[[f64; 4]],
    eps: f64,
) -> Result<MarkerArray, ExportError> {
    check_nonempty(workspace)?;
    let mut indices: Vec<usize> = orientations
        .iter()
        .flat_map(|q| indices_at_orientation(workspace, q, eps))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    Ok(build_markers(workspace, ns, MarkerShape::Sphere, indices))
}

/// An arrow per point along the point's orientation, colored by reachability.
pub fn arrow_markers(workspace: &Workspace, ns: &str) -> Result<MarkerArray, ExportError> {
    check_nonempty(workspace)?;
    Ok(build_markers(workspace, ns, MarkerShape::Arrow, 0..workspace.len()))
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(clippy::derive_partial_eq_without_eq)] // f64 fields prevent Eq
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    /// Seconds from the start of playback.
    pub time_from_start: f64,
    pub point_index: usize,
}

/// Joint-space playback of every reachable point, in point order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayTrajectory {
    pub group_name: String,
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

impl DisplayTrajectory {
    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time_from_start)
    }
}

/// One trajectory point per reachable sample, `dt` seconds apart.
///
/// Every reachable state must name the same joints as the first one.
pub fn display_trajectory(
    workspace: &Workspace,
    dt: f64,
) -> Result<DisplayTrajectory, ExportError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(ExportError::InvalidTimeStep(dt));
    }
    if workspace.is_empty() {
        return Err(ExportError::EmptyWorkspace);
    }
    let mut trajectory = DisplayTrajectory {
        group_name: workspace.group_name.clone(),
        ..DisplayTrajectory::default()
    };
    let states = workspace
        .points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_reachable())
        .filter_map(|(i, p)| p.joint_state().map(|s| (i, s)));
    for (k, (point_index, state)) in states.enumerate() {
        if k == 0 {
            trajectory.joint_names.clone_from(&state.names);
        } else if state.names != trajectory.joint_names {
            return Err(ExportError::JointMismatch { index: point_index });
        }
        trajectory.points.push(TrajectoryPoint {
            positions: state.positions.clone(),
            time_from_start: k as f64 * dt,
            point_index,
        });
    }
    Ok(trajectory)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
