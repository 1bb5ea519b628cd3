//! Robot description loading: `urdf-rs` reads the XML, this module keeps
//! the kinematic tree and checks it has exactly one root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::UrdfError;
use crate::types::{JointData, JointLimits, JointType, LinkData, Origin, RobotModel};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read and convert the robot description at `path`.
pub fn parse_file(path: impl AsRef<Path>) -> Result<RobotModel, UrdfError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| UrdfError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_string(&content)
}

/// Convert an in-memory robot description.
pub fn parse_string(xml: &str) -> Result<RobotModel, UrdfError> {
    let robot = urdf_rs::read_from_string(xml).map_err(|e| UrdfError::Parse(e.to_string()))?;
    convert_robot(&robot)
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn convert_robot(robot: &urdf_rs::Robot) -> Result<RobotModel, UrdfError> {
    let joints: BTreeMap<String, JointData> = robot
        .joints
        .iter()
        .map(|j| convert_joint(j).map(|jd| (jd.name.clone(), jd)))
        .collect::<Result<_, _>>()?;

    let mut links: BTreeMap<String, LinkData> = robot
        .links
        .iter()
        .map(|l| (l.name.clone(), LinkData::new(l.name.clone())))
        .collect();

    for joint in joints.values() {
        if !links.contains_key(&joint.parent) {
            return Err(UrdfError::MissingLink(joint.parent.clone()));
        }
        let child = links
            .get_mut(&joint.child)
            .ok_or_else(|| UrdfError::MissingLink(joint.child.clone()))?;
        child.parent_joint = Some(joint.name.clone());
    }

    let child_links: BTreeSet<&str> = joints.values().map(|j| j.child.as_str()).collect();
    let roots: Vec<String> = links
        .keys()
        .filter(|name| !child_links.contains(name.as_str()))
        .cloned()
        .collect();
    let root_link = match roots.as_slice() {
        [] => return Err(UrdfError::NoRootLink),
        [root] => root.clone(),
        _ => return Err(UrdfError::MultipleRootLinks(roots)),
    };

    Ok(RobotModel {
        name: robot.name.clone(),
        links,
        joints,
        root_link,
    })
}

fn convert_joint(joint: &urdf_rs::Joint) -> Result<JointData, UrdfError> {
    let joint_type = convert_joint_type(&joint.joint_type)?;
    Ok(JointData {
        name: joint.name.clone(),
        joint_type,
        parent: joint.parent.link.clone(),
        child: joint.child.link.clone(),
        origin: convert_pose(&joint.origin),
        axis: vec3(&joint.axis.xyz),
        limits: convert_limits(&joint.limit),
    })
}

fn convert_joint_type(jt: &urdf_rs::JointType) -> Result<JointType, UrdfError> {
    match jt {
        urdf_rs::JointType::Revolute => Ok(JointType::Revolute),
        urdf_rs::JointType::Continuous => Ok(JointType::Continuous),
        urdf_rs::JointType::Prismatic => Ok(JointType::Prismatic),
        urdf_rs::JointType::Fixed => Ok(JointType::Fixed),
        urdf_rs::JointType::Floating => Ok(JointType::Floating),
        urdf_rs::JointType::Planar => Ok(JointType::Planar),
        urdf_rs::JointType::Spherical => Err(UrdfError::UnsupportedJointType("Spherical".into())),
    }
}

fn convert_limits(limit: &urdf_rs::JointLimit) -> JointLimits {
    // urdf-rs reports a missing <limit> as lower == upper == 0.
    if (limit.lower - limit.upper).abs() > f64::EPSILON {
        JointLimits::new(limit.lower, limit.upper)
    } else {
        JointLimits::default()
    }
}

fn convert_pose(pose: &urdf_rs::Pose) -> Origin {
    Origin {
        xyz: vec3(&pose.xyz),
        rpy: vec3(&pose.rpy),
    }
}

const fn vec3(v: &[f64; 3]) -> [f64; 3] {
    *v
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
