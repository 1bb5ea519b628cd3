use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::compare::is_unit_quaternion;
use crate::config::Tolerances;
use crate::error::{ConfigError, IkError};

/// Identity orientation in `[x, y, z, w]` order.
pub const IDENTITY_ORIENTATION: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// Position plus unit-quaternion orientation (`[x, y, z, w]`).
///
/// Plain value type; equality is exact per field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation `[x, y, z]` in meters.
    pub position: [f64; 3],
    /// Rotation as a quaternion `[x, y, z, w]`.
    #[serde(default = "identity_orientation")]
    pub orientation: [f64; 4],
}

const fn identity_orientation() -> [f64; 4] {
    IDENTITY_ORIENTATION
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        orientation: IDENTITY_ORIENTATION,
    };

    pub const fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pure translation with identity orientation.
    pub const fn from_position(position: [f64; 3]) -> Self {
        Self::new(position, IDENTITY_ORIENTATION)
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation.quaternion().coords;
        Self::new([t.x, t.y, t.z], [q[0], q[1], q[2], q[3]])
    }

    /// Convert to an [`Isometry3`], normalizing the quaternion.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.position[0], self.position[1], self.position[2]),
            self.rotation(),
        )
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let [x, y, z, w] = self.orientation;
        UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    /// `self * other`: express `other` (given in this pose's frame) in the
    /// parent frame.
    pub fn compose(&self, other: &Self) -> Self {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(&self.orientation).all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// JointState
// ---------------------------------------------------------------------------

/// Named joint configuration; `names[i]` pairs with `positions[i]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)] // f64 fields prevent Eq
pub struct JointState {
    pub names: Vec<String>,
    pub positions: Vec<f64>,
}

impl JointState {
    pub const fn new(names: Vec<String>, positions: Vec<f64>) -> Self {
        Self { names, positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `(name, value)` pairs in chain order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.positions.iter().copied())
    }

    /// Value of the joint called `name`.
    pub fn position(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// SolveOutcome / SolveResult
// ---------------------------------------------------------------------------

/// Result class of one IK evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveOutcome {
    Success,
    Timeout,
    NoIkSolution,
    InvalidGoal,
    Other,
}

impl SolveOutcome {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&IkError> for SolveOutcome {
    fn from(err: &IkError) -> Self {
        match err {
            IkError::NoSolution => Self::NoIkSolution,
            IkError::Timeout => Self::Timeout,
            IkError::InvalidGoal(_) | IkError::FrameTransform(_) | IkError::UnknownGroup(_) => {
                Self::InvalidGoal
            }
            IkError::SeedMismatch { .. } | IkError::Internal(_) => Self::Other,
        }
    }
}

/// Outcome plus joint state, built so the state exists only on success.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    outcome: SolveOutcome,
    joint_state: Option<JointState>,
}

impl SolveResult {
    pub const fn success(joint_state: JointState) -> Self {
        Self {
            outcome: SolveOutcome::Success,
            joint_state: Some(joint_state),
        }
    }

    pub fn failure(error: &IkError) -> Self {
        Self {
            outcome: error.into(),
            joint_state: None,
        }
    }

    pub fn from_ik(result: Result<JointState, IkError>) -> Self {
        match result {
            Ok(state) => Self::success(state),
            Err(err) => Self::failure(&err),
        }
    }

    pub const fn outcome(&self) -> SolveOutcome {
        self.outcome
    }

    pub const fn joint_state(&self) -> Option<&JointState> {
        self.joint_state.as_ref()
    }

    pub fn into_joint_state(self) -> Option<JointState> {
        self.joint_state
    }
}

// ---------------------------------------------------------------------------
// WorkspacePoint
// ---------------------------------------------------------------------------

/// One sampled pose and, once evaluated, its IK result.
///
/// Deserializing rejects a joint state on anything but a successful point,
/// and a successful point without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkspacePoint")]
pub struct WorkspacePoint {
    pose: Pose,
    /// `None` while the point is still pending evaluation.
    outcome: Option<SolveOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    joint_state: Option<JointState>,
}

/// Unchecked wire form of [`WorkspacePoint`].
#[derive(Deserialize)]
struct RawWorkspacePoint {
    pose: Pose,
    #[serde(default)]
    outcome: Option<SolveOutcome>,
    #[serde(default)]
    joint_state: Option<JointState>,
}

impl TryFrom<RawWorkspacePoint> for WorkspacePoint {
    type Error = String;

    fn try_from(raw: RawWorkspacePoint) -> Result<Self, Self::Error> {
        let success = raw.outcome == Some(SolveOutcome::Success);
        match (success, raw.joint_state.is_some()) {
            (true, false) => Err("successful point has no joint state".into()),
            (false, true) => Err(format!(
                "point with outcome {:?} carries a joint state",
                raw.outcome
            )),
            _ => Ok(Self {
                pose: raw.pose,
                outcome: raw.outcome,
                joint_state: raw.joint_state,
            }),
        }
    }
}

impl WorkspacePoint {
    /// A point awaiting evaluation.
    pub const fn pending(pose: Pose) -> Self {
        Self {
            pose,
            outcome: None,
            joint_state: None,
        }
    }

    /// A point carrying an already known result.
    pub fn evaluated(pose: Pose, result: SolveResult) -> Self {
        let mut point = Self::pending(pose);
        point.record(result);
        point
    }

    pub const fn pose(&self) -> &Pose {
        &self.pose
    }

    pub const fn outcome(&self) -> Option<SolveOutcome> {
        self.outcome
    }

    pub const fn joint_state(&self) -> Option<&JointState> {
        self.joint_state.as_ref()
    }

    pub fn is_reachable(&self) -> bool {
        self.outcome.is_some_and(SolveOutcome::is_success)
    }

    pub const fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }

    /// Overwrite this point's result.
    pub fn record(&mut self, result: SolveResult) {
        self.outcome = Some(result.outcome);
        self.joint_state = result.joint_state;
    }

    /// Return the point to the pending state.
    pub fn reset(&mut self) {
        self.outcome = None;
        self.joint_state = None;
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Axis-aligned box `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Fails when any axis has `max < min` or a non-finite corner.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, name) in ['x', 'y', 'z'].into_iter().enumerate() {
            let (min, max) = (self.min[axis], self.max[axis]);
            if !min.is_finite() || !max.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field: format!("bounds.{name}"),
                    message: "corners must be finite".into(),
                });
            }
            if max < min {
                return Err(ConfigError::InvertedBounds {
                    axis: name,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Lattice samples per axis at `resolution`, see [`axis_steps`].
    ///
    /// Fails when an axis count does not fit in `usize` or the lattice would
    /// hold more than [`MAX_GRID_POINTS`] positions.
    pub fn lattice_dims(&self, resolution: f64, slack: f64) -> Result<[usize; 3], ConfigError> {
        let mut dims = [0; 3];
        for (axis, dim) in dims.iter_mut().enumerate() {
            *dim = axis_steps(self.min[axis], self.max[axis], resolution, slack)
                .ok_or_else(|| grid_too_large(resolution))?;
        }
        grid_len(dims, 1, resolution)?;
        Ok(dims)
    }
}

/// Largest number of points a single grid may hold.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Samples along one axis: `floor((max - min) / resolution + slack) + 1`.
///
/// `slack` keeps the last sample of spans that are exact multiples of the
/// resolution despite rounding. `None` when the count is not representable.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn axis_steps(min: f64, max: f64, resolution: f64, slack: f64) -> Option<usize> {
    let span = (max - min).max(0.0);
    let steps = (span / resolution + slack).floor();
    if steps.is_finite() && steps >= 0.0 && steps < usize::MAX as f64 {
        (steps as usize).checked_add(1)
    } else {
        None
    }
}

/// Points of a grid with `dims` positions and `orientations` per position.
pub fn grid_len(dims: [usize; 3], orientations: usize, resolution: f64) -> Result<usize, ConfigError> {
    dims.iter()
        .try_fold(orientations, |acc, &n| acc.checked_mul(n))
        .filter(|&n| n <= MAX_GRID_POINTS)
        .ok_or_else(|| grid_too_large(resolution))
}

fn grid_too_large(resolution: f64) -> ConfigError {
    ConfigError::InvalidValue {
        field: "resolution".into(),
        message: format!("{resolution} yields a grid of more than {MAX_GRID_POINTS} points"),
    }
}

/// Shared check for a resolution value.
pub fn validate_resolution(resolution: f64) -> Result<(), ConfigError> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidResolution(resolution))
    }
}

/// Shared check for an orientation list.
pub fn validate_orientations(orientations: &[[f64; 4]], eps: f64) -> Result<(), ConfigError> {
    if orientations.is_empty() {
        return Err(ConfigError::EmptyOrientations);
    }
    match orientations.iter().find(|q| !is_unit_quaternion(q, eps)) {
        Some(q) => Err(ConfigError::NonUnitQuaternion(*q)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// A named reachability query and its results.
///
/// `points` are stored position-major, orientation-minor: all orientations
/// of the first lattice position, then all of the second, and so on, with
/// lattice positions ordered x outermost, then y, then z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// Kinematic group the query is for.
    pub group_name: String,
    /// Frame the grid is laid out in, relative to the planning frame.
    #[serde(default)]
    pub origin: Pose,
    pub bounds: Bounds,
    /// Orientations sampled at every position, `[x, y, z, w]`.
    pub orientations: Vec<[f64; 4]>,
    /// Lattice spacing (meters), uniform on all axes.
    pub position_resolution: f64,
    /// Transform from the group's native end-effector frame to the tool tip.
    #[serde(default)]
    pub tool_frame_offset: Pose,
    #[serde(default)]
    pub points: Vec<WorkspacePoint>,
}

impl Workspace {
    /// Query with identity origin, identity orientation and no tool offset.
    pub fn new(group_name: impl Into<String>, bounds: Bounds, position_resolution: f64) -> Self {
        Self {
            group_name: group_name.into(),
            origin: Pose::IDENTITY,
            bounds,
            orientations: vec![IDENTITY_ORIENTATION],
            position_resolution,
            tool_frame_offset: Pose::IDENTITY,
            points: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_orientations(mut self, orientations: Vec<[f64; 4]>) -> Self {
        self.orientations = orientations;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Pose) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_tool_frame_offset(mut self, offset: Pose) -> Self {
        self.tool_frame_offset = offset;
        self
    }

    /// Same query parameters with no points.
    pub fn empty_like(&self) -> Self {
        Self {
            group_name: self.group_name.clone(),
            origin: self.origin,
            bounds: self.bounds,
            orientations: self.orientations.clone(),
            position_resolution: self.position_resolution,
            tool_frame_offset: self.tool_frame_offset,
            points: Vec::new(),
        }
    }

    /// Validate the grid parameters.
    pub fn validate(&self, tolerances: &Tolerances) -> Result<(), ConfigError> {
        if self.group_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "group_name".into(),
                message: "must not be empty".into(),
            });
        }
        validate_resolution(self.position_resolution)?;
        self.bounds.validate()?;
        validate_orientations(&self.orientations, tolerances.quaternion)?;
        if !is_unit_quaternion(&self.origin.orientation, tolerances.quaternion)
            || !is_unit_quaternion(&self.tool_frame_offset.orientation, tolerances.quaternion)
        {
            return Err(ConfigError::InvalidValue {
                field: "origin/tool_frame_offset".into(),
                message: "orientation must be a unit quaternion".into(),
            });
        }
        let dims = self
            .bounds
            .lattice_dims(self.position_resolution, tolerances.grid)?;
        grid_len(dims, self.orientations.len(), self.position_resolution)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn reachable_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_reachable()).count()
    }

    /// Every point carries a definite outcome.
    pub fn is_fully_evaluated(&self) -> bool {
        self.points.iter().all(|p| !p.is_pending())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
