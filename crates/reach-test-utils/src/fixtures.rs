//! URDF strings and workspace builders shared by tests.

use reach_core::types::{Bounds, JointState, Workspace};

/// Planar 2-DOF arm in the XY plane.
///
/// Both joints rotate about Z; links are 0.3 m and 0.25 m along X, ending at
/// link `tool`. Reachable positions form an annulus around the origin at
/// `z = 0`, with outer radius 0.55 m.
pub const PLANAR_ARM_URDF: &str = r#"
    <robot name="planar_arm">
        <link name="base"/>
        <link name="upper_arm"/>
        <link name="forearm"/>
        <link name="tool"/>
        <joint name="shoulder" type="revolute">
            <parent link="base"/><child link="upper_arm"/>
            <axis xyz="0 0 1"/>
            <limit lower="-2.9" upper="2.9" effort="40" velocity="3"/>
        </joint>
        <joint name="elbow" type="revolute">
            <parent link="upper_arm"/><child link="forearm"/>
            <origin xyz="0.3 0 0"/>
            <axis xyz="0 0 1"/>
            <limit lower="-2.9" upper="2.9" effort="25" velocity="4"/>
        </joint>
        <joint name="tool_mount" type="fixed">
            <parent link="forearm"/><child link="tool"/>
            <origin xyz="0.25 0 0"/>
        </joint>
    </robot>
"#;

/// Vertical 6-DOF arm (yaw, pitch, pitch, roll, pitch, roll) ending at
/// link `flange`, 0.85 m above the base when all joints are zero.
pub const SIX_DOF_ARM_URDF: &str = r#"
    <robot name="six_dof_arm">
        <link name="base"/>
        <link name="turret"/>
        <link name="upper_arm"/>
        <link name="elbow_link"/>
        <link name="forearm"/>
        <link name="wrist"/>
        <link name="flange"/>
        <joint name="base_yaw" type="revolute">
            <parent link="base"/><child link="turret"/>
            <origin xyz="0 0 0.1"/><axis xyz="0 0 1"/>
            <limit lower="-3.1" upper="3.1" effort="80" velocity="2"/>
        </joint>
        <joint name="shoulder_pitch" type="revolute">
            <parent link="turret"/><child link="upper_arm"/>
            <origin xyz="0 0 0.15"/><axis xyz="0 1 0"/>
            <limit lower="-1.6" upper="2.3" effort="60" velocity="2"/>
        </joint>
        <joint name="elbow_pitch" type="revolute">
            <parent link="upper_arm"/><child link="elbow_link"/>
            <origin xyz="0 0 0.3"/><axis xyz="0 1 0"/>
            <limit lower="-2.3" upper="2.3" effort="40" velocity="3"/>
        </joint>
        <joint name="forearm_roll" type="revolute">
            <parent link="elbow_link"/><child link="forearm"/>
            <origin xyz="0 0 0.1"/><axis xyz="0 0 1"/>
            <limit lower="-3.1" upper="3.1" effort="20" velocity="5"/>
        </joint>
        <joint name="wrist_pitch" type="revolute">
            <parent link="forearm"/><child link="wrist"/>
            <origin xyz="0 0 0.15"/><axis xyz="0 1 0"/>
            <limit lower="-2.0" upper="2.0" effort="10" velocity="5"/>
        </joint>
        <joint name="wrist_roll" type="revolute">
            <parent link="wrist"/><child link="flange"/>
            <origin xyz="0 0 0.05"/><axis xyz="0 0 1"/>
            <limit lower="-3.1" upper="3.1" effort="5" velocity="8"/>
        </joint>
    </robot>
"#;

/// Empty single-orientation workspace for group `group` over `[min, max]`.
pub fn grid_workspace(group: &str, min: [f64; 3], max: [f64; 3], resolution: f64) -> Workspace {
    Workspace::new(group, Bounds::new(min, max), resolution)
}

/// Two-joint state used where any valid state will do.
pub fn sample_joint_state() -> JointState {
    JointState::new(vec!["shoulder".into(), "elbow".into()], vec![0.3, -0.5])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
