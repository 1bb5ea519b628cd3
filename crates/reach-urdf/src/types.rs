//! In-memory kinematic model of a robot.
//!
//! Links and joints are kept in ordered maps so iteration, and therefore
//! everything derived from it, is reproducible between runs.

use std::collections::BTreeMap;

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use reach_core::types::Pose;

use crate::error::UrdfError;

// ---------------------------------------------------------------------------
// JointType
// ---------------------------------------------------------------------------

/// URDF joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis, with position limits.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
    /// Unconstrained 6-DOF joint.
    Floating,
    /// Motion in a plane.
    Planar,
}

impl JointType {
    /// Whether this joint contributes one degree of freedom to a chain.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous | Self::Prismatic)
    }

    /// Whether a serial chain can contain this joint.
    pub const fn is_serial(self) -> bool {
        !matches!(self, Self::Floating | Self::Planar)
    }
}

// ---------------------------------------------------------------------------
// JointLimits
// ---------------------------------------------------------------------------

/// Position limits of a joint. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointLimits {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl JointLimits {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Closed interval a joint of `joint_type` may occupy.
    ///
    /// Rotational joints without limits get one full turn centered on zero;
    /// unlimited prismatic joints get `[-1, 1]` meters.
    pub fn range(&self, joint_type: JointType) -> (f64, f64) {
        use std::f64::consts::PI;
        let (lo, hi) = match joint_type {
            JointType::Continuous => return (-PI, PI),
            JointType::Prismatic => (-1.0, 1.0),
            _ => (-PI, PI),
        };
        (self.lower.unwrap_or(lo), self.upper.unwrap_or(hi))
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// A 3D pose specified as position + roll-pitch-yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Origin {
    /// Translation `[x, y, z]` in meters.
    pub xyz: [f64; 3],
    /// Rotation `[roll, pitch, yaw]` in radians, applied about fixed X, Y, Z.
    pub rpy: [f64; 3],
}

impl Origin {
    pub const fn from_xyz(xyz: [f64; 3]) -> Self {
        Self { xyz, rpy: [0.0; 3] }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.xyz;
        let [roll, pitch, yaw] = self.rpy;
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    pub fn to_pose(&self) -> Pose {
        Pose::from_isometry(&self.to_isometry())
    }
}

// ---------------------------------------------------------------------------
// LinkData
// ---------------------------------------------------------------------------

/// A link and the joint that attaches it to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkData {
    pub name: String,
    /// `None` for the root link.
    pub parent_joint: Option<String>,
}

impl LinkData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_joint: None,
        }
    }
}

// ---------------------------------------------------------------------------
// JointData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Joint frame relative to the parent link frame.
    pub origin: Origin,
    /// Motion axis in the joint frame (default `[1, 0, 0]` per URDF).
    pub axis: [f64; 3],
    pub limits: JointLimits,
}

// ---------------------------------------------------------------------------
// RobotModel
// ---------------------------------------------------------------------------

/// Kinematic tree of a robot.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotModel {
    pub name: String,
    /// All links, keyed by name.
    pub links: BTreeMap<String, LinkData>,
    /// All joints, keyed by name.
    pub joints: BTreeMap<String, JointData>,
    /// Name of the root link (the one never referenced as a child).
    pub root_link: String,
}

impl RobotModel {
    pub fn link(&self, name: &str) -> Result<&LinkData, UrdfError> {
        self.links
            .get(name)
            .ok_or_else(|| UrdfError::MissingLink(name.into()))
    }

    pub fn joint(&self, name: &str) -> Result<&JointData, UrdfError> {
        self.joints
            .get(name)
            .ok_or_else(|| UrdfError::MissingJoint(name.into()))
    }

    /// Iterate over actuated joints, by name.
    pub fn actuated_joints(&self) -> impl Iterator<Item = &JointData> {
        self.joints.values().filter(|j| j.joint_type.is_actuated())
    }

    pub fn dof(&self) -> usize {
        self.actuated_joints().count()
    }

    /// Names of actuated joints, sorted alphabetically.
    pub fn actuated_joint_names(&self) -> Vec<&str> {
        self.actuated_joints().map(|j| j.name.as_str()).collect()
    }

    /// Leaf links (no joint uses them as parent), sorted.
    pub fn leaf_links(&self) -> Vec<&str> {
        self.links
            .keys()
            .filter(|name| !self.joints.values().any(|j| &j.parent == *name))
            .map(String::as_str)
            .collect()
    }

    /// Joints on the path from `base` down to `tip`, in base-to-tip order.
    ///
    /// Walks parent pointers up from `tip`, so the result is unique even when
    /// the tree branches.
    pub fn path_between(&self, base: &str, tip: &str) -> Result<Vec<&JointData>, UrdfError> {
        self.link(base)?;
        let mut path = Vec::new();
        let mut current = self.link(tip)?;
        while current.name != base {
            let Some(joint_name) = &current.parent_joint else {
                return Err(UrdfError::NotConnected {
                    base: base.into(),
                    tip: tip.into(),
                });
            };
            let joint = self.joint(joint_name)?;
            path.push(joint);
            current = self.link(&joint.parent)?;
        }
        path.reverse();
        Ok(path)
    }

    /// Joints from the root link to `tip`.
    pub fn path_to(&self, tip: &str) -> Result<Vec<&JointData>, UrdfError> {
        self.path_between(&self.root_link, tip)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn joint(name: &str, joint_type: JointType, parent: &str, child: &str) -> JointData {
        JointData {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            origin: Origin::default(),
            axis: [0.0, 0.0, 1.0],
            limits: JointLimits::new(-1.0, 1.0),
        }
    }

    /// base -> link1 -> {left, right}
    fn forked_model() -> RobotModel {
        let joints = [
            joint("j1", JointType::Revolute, "base", "link1"),
            joint("left_j", JointType::Prismatic, "link1", "left"),
            joint("right_j", JointType::Fixed, "link1", "right"),
        ];
        let mut links: BTreeMap<String, LinkData> = ["base", "link1", "left", "right"]
            .into_iter()
            .map(|n| (n.to_string(), LinkData::new(n)))
            .collect();
        for j in &joints {
            if let Some(link) = links.get_mut(&j.child) {
                link.parent_joint = Some(j.name.clone());
            }
        }
        RobotModel {
            name: "forked".into(),
            links,
            joints: joints.into_iter().map(|j| (j.name.clone(), j)).collect(),
            root_link: "base".into(),
        }
    }

    // -- JointType --

    #[test]
    fn joint_type_classification() {
        assert!(JointType::Revolute.is_actuated());
        assert!(JointType::Prismatic.is_actuated());
        assert!(!JointType::Fixed.is_actuated());
        assert!(JointType::Fixed.is_serial());
        assert!(!JointType::Floating.is_serial());
        assert!(!JointType::Planar.is_serial());
    }

    // -- JointLimits --

    #[test]
    fn limits_range_fills_missing_bounds() {
        let pi = std::f64::consts::PI;
        assert_eq!(JointLimits::new(-0.5, 0.5).range(JointType::Revolute), (-0.5, 0.5));
        assert_eq!(JointLimits::default().range(JointType::Revolute), (-pi, pi));
        assert_eq!(
            JointLimits::new(-0.1, 0.1).range(JointType::Continuous),
            (-pi, pi)
        );
        assert_eq!(JointLimits::default().range(JointType::Prismatic), (-1.0, 1.0));
    }

    // -- Origin --

    #[test]
    fn origin_yaw_rotates_about_z() {
        let origin = Origin {
            xyz: [1.0, 2.0, 3.0],
            rpy: [0.0, 0.0, std::f64::consts::FRAC_PI_2],
        };
        let iso = origin.to_isometry();
        let x_axis = iso.rotation * nalgebra::Vector3::x();
        assert_relative_eq!(x_axis.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(iso.translation.z, 3.0);
        let pose = origin.to_pose();
        assert_eq!(pose.position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn origin_default_is_identity() {
        let iso = Origin::default().to_isometry();
        assert_relative_eq!(iso.translation.vector.norm(), 0.0);
        assert_relative_eq!(iso.rotation.angle(), 0.0);
    }

    // -- RobotModel --

    #[test]
    fn model_lookups() {
        let model = forked_model();
        assert!(model.link("left").is_ok());
        assert!(matches!(model.link("nope"), Err(UrdfError::MissingLink(_))));
        assert!(matches!(model.joint("nope"), Err(UrdfError::MissingJoint(_))));
        assert_eq!(model.dof(), 2);
        assert_eq!(model.actuated_joint_names(), vec!["j1", "left_j"]);
        assert_eq!(model.leaf_links(), vec!["left", "right"]);
    }

    #[test]
    fn path_follows_the_right_branch() {
        let model = forked_model();
        let names: Vec<&str> = model
            .path_to("right")
            .unwrap()
            .iter()
            .map(|j| j.name.as_str())
            .collect();
        assert_eq!(names, vec!["j1", "right_j"]);
    }

    #[test]
    fn path_between_intermediate_links() {
        let model = forked_model();
        let path = model.path_between("link1", "left").unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].name, "left_j");
        assert!(model.path_between("left", "left").unwrap().is_empty());
    }

    #[test]
    fn path_between_siblings_fails() {
        let model = forked_model();
        assert!(matches!(
            model.path_between("left", "right"),
            Err(UrdfError::NotConnected { .. })
        ));
    }
}
