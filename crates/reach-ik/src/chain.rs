//! Serial kinematic chain extracted from a [`RobotModel`].
//!
//! A [`KinematicChain`] is the ordered list of actuated joints between a base
//! link and a tip link, with every fixed transform folded into the next
//! joint origin (or into the trailing tip offset).

use nalgebra::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};
use rand::Rng;
use reach_urdf::{JointType, RobotModel, UrdfError};

/// One actuated joint of a chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,
    /// Static transform from the previous joint's moving frame to this
    /// joint's frame, including any fixed joints in between.
    pub origin: Isometry3<f64>,
    /// Motion axis in this joint's frame.
    pub axis: UnitVector3<f64>,
    /// Translates along `axis` instead of rotating about it.
    pub is_prismatic: bool,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

impl ChainJoint {
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower_limit + self.upper_limit)
    }

    fn motion(&self, position: f64) -> Isometry3<f64> {
        if self.is_prismatic {
            Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * position),
                UnitQuaternion::identity(),
            )
        } else {
            Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, position),
            )
        }
    }
}

/// Joint frames of one configuration, all in the base frame.
#[derive(Debug, Clone)]
pub struct ChainFrames {
    /// Origin of each joint.
    pub origins: Vec<Vector3<f64>>,
    /// Axis of each joint.
    pub axes: Vec<Vector3<f64>>,
    /// Tip pose.
    pub tip: Isometry3<f64>,
}

/// An ordered kinematic chain from base link to tip link.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    base_link: String,
    tip_link: String,
    joints: Vec<ChainJoint>,
    /// Fixed transform after the last actuated joint.
    tip_offset: Isometry3<f64>,
}

impl KinematicChain {
    /// Chain from the model's root link to `tip_link`.
    pub fn from_model(model: &RobotModel, tip_link: &str) -> Result<Self, UrdfError> {
        Self::between(model, &model.root_link, tip_link)
    }

    /// Chain from `base_link` to `tip_link`.
    pub fn between(model: &RobotModel, base_link: &str, tip_link: &str) -> Result<Self, UrdfError> {
        let mut joints = Vec::new();
        let mut pending = Isometry3::identity();

        for joint in model.path_between(base_link, tip_link)? {
            if !joint.joint_type.is_serial() {
                return Err(UrdfError::UnsupportedJointType(format!(
                    "{:?} joint {} in chain",
                    joint.joint_type, joint.name
                )));
            }
            let origin = joint.origin.to_isometry();
            if !joint.joint_type.is_actuated() {
                pending *= origin;
                continue;
            }
            let (lower_limit, upper_limit) = joint.limits.range(joint.joint_type);
            joints.push(ChainJoint {
                name: joint.name.clone(),
                origin: pending * origin,
                axis: UnitVector3::new_normalize(Vector3::from(joint.axis)),
                is_prismatic: joint.joint_type == JointType::Prismatic,
                lower_limit,
                upper_limit,
            });
            pending = Isometry3::identity();
        }

        Ok(Self {
            base_link: base_link.into(),
            tip_link: tip_link.into(),
            joints,
            tip_offset: pending,
        })
    }

    pub fn base_link(&self) -> &str {
        &self.base_link
    }

    pub fn tip_link(&self) -> &str {
        &self.tip_link
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Joint names in chain order.
    pub fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// `(lower, upper)` per joint.
    pub fn limits(&self) -> Vec<(f64, f64)> {
        self.joints
            .iter()
            .map(|j| (j.lower_limit, j.upper_limit))
            .collect()
    }

    /// Center of every joint range.
    pub fn midpoint(&self) -> Vec<f64> {
        self.joints.iter().map(ChainJoint::midpoint).collect()
    }

    /// Uniform random configuration within the joint limits.
    pub fn sample(&self, rng: &mut impl Rng) -> Vec<f64> {
        self.joints
            .iter()
            .map(|j| {
                if j.upper_limit > j.lower_limit {
                    rng.gen_range(j.lower_limit..=j.upper_limit)
                } else {
                    j.lower_limit
                }
            })
            .collect()
    }

    /// Tip pose in the base frame. Extra or missing entries in `q` are
    /// ignored or treated as zero.
    pub fn forward_kinematics(&self, q: &[f64]) -> Isometry3<f64> {
        self.frames(q).tip
    }

    /// Per-joint origins and axes plus the tip pose, for Jacobians.
    pub fn frames(&self, q: &[f64]) -> ChainFrames {
        let mut transform = Isometry3::identity();
        let mut origins = Vec::with_capacity(self.dof());
        let mut axes = Vec::with_capacity(self.dof());

        for (i, joint) in self.joints.iter().enumerate() {
            transform *= joint.origin;
            origins.push(transform.translation.vector);
            axes.push(transform.rotation * joint.axis.into_inner());
            transform *= joint.motion(q.get(i).copied().unwrap_or(0.0));
        }

        ChainFrames {
            origins,
            axes,
            tip: transform * self.tip_offset,
        }
    }

    /// Clamp joint positions to their limits.
    pub fn clamp_joints(&self, q: &mut [f64]) {
        for (value, joint) in q.iter_mut().zip(&self.joints) {
            *value = value.clamp(joint.lower_limit, joint.upper_limit);
        }
    }

    pub fn within_limits(&self, q: &[f64], eps: f64) -> bool {
        q.len() == self.dof()
            && q.iter()
                .zip(&self.joints)
                .all(|(v, j)| *v >= j.lower_limit - eps && *v <= j.upper_limit + eps)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
