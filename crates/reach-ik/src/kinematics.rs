//! Named kinematic groups behind the [`IkSolver`] contract.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reach_core::compare::is_unit_quaternion;
use reach_core::error::IkError;
use reach_core::traits::{GroupInfo, IkRequest, IkSolver};
use reach_core::types::JointState;
use reach_urdf::{RobotModel, UrdfError};
use tracing::debug;

use crate::chain::KinematicChain;
use crate::solver::{DlsConfig, DlsSolver, IkTarget, Termination};

/// Which part of the target pose a group must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    /// Position and orientation.
    #[default]
    Pose,
    /// Position only; orientation is ignored.
    Position,
}

/// Restart and convergence settings shared by every group.
#[derive(Debug, Clone)]
pub struct KinematicsConfig {
    pub dls: DlsConfig,
    /// Random restarts after the first attempt fails.
    pub max_restarts: u32,
    /// Seed of the restart sampler.
    pub rng_seed: u64,
    /// Unit-norm tolerance for target orientations.
    pub quaternion_tolerance: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            dls: DlsConfig::default(),
            max_restarts: 8,
            rng_seed: 0,
            quaternion_tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
struct Group {
    chain: KinematicChain,
    mode: TargetMode,
}

impl Group {
    /// Starting configuration: the seed in chain order, or the range midpoint.
    fn initial(&self, seed: Option<&JointState>) -> Result<Vec<f64>, IkError> {
        let Some(seed) = seed else {
            return Ok(self.chain.midpoint());
        };
        let dof = self.chain.dof();
        if seed.len() != dof {
            return Err(IkError::SeedMismatch {
                expected: dof,
                got: seed.len(),
            });
        }
        let by_name: Option<Vec<f64>> = self
            .chain
            .joints()
            .iter()
            .map(|j| seed.position(&j.name))
            .collect();
        Ok(by_name.unwrap_or_else(|| seed.positions.clone()))
    }
}

/// DLS-backed solver over named kinematic groups.
///
/// Each solve starts from the seed (or the joint-range midpoint) and, when
/// that does not converge, restarts from configurations drawn by a
/// `ChaCha8Rng` reseeded per call, so identical requests give identical
/// answers unless the deadline interferes.
#[derive(Debug, Clone)]
pub struct KinematicsSolver {
    groups: BTreeMap<String, Group>,
    solver: DlsSolver,
    max_restarts: u32,
    rng_seed: u64,
    quaternion_tolerance: f64,
}

impl KinematicsSolver {
    pub fn new(config: KinematicsConfig) -> Self {
        Self {
            groups: BTreeMap::new(),
            solver: DlsSolver::new(config.dls),
            max_restarts: config.max_restarts,
            rng_seed: config.rng_seed,
            quaternion_tolerance: config.quaternion_tolerance,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(KinematicsConfig::default())
    }

    /// Register `name` as the chain from the model root to `tip_link`,
    /// matching full poses.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        model: &RobotModel,
        tip_link: &str,
    ) -> Result<&mut Self, UrdfError> {
        self.add_group_with_mode(name, model, tip_link, TargetMode::Pose)
    }

    pub fn add_group_with_mode(
        &mut self,
        name: impl Into<String>,
        model: &RobotModel,
        tip_link: &str,
        mode: TargetMode,
    ) -> Result<&mut Self, UrdfError> {
        let chain = KinematicChain::from_model(model, tip_link)?;
        Ok(self.insert_chain(name, chain, mode))
    }

    pub fn insert_chain(
        &mut self,
        name: impl Into<String>,
        chain: KinematicChain,
        mode: TargetMode,
    ) -> &mut Self {
        let name = name.into();
        debug!(group = %name, dof = chain.dof(), tip = chain.tip_link(), "registered kinematic group");
        self.groups.insert(name, Group { chain, mode });
        self
    }

    /// Registered group names, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn chain(&self, group_name: &str) -> Option<&KinematicChain> {
        self.groups.get(group_name).map(|g| &g.chain)
    }
}

impl Default for KinematicsSolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl IkSolver for KinematicsSolver {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        let group = self
            .groups
            .get(request.group_name)
            .ok_or_else(|| IkError::UnknownGroup(request.group_name.into()))?;

        let pose = &request.pose;
        if !pose.is_finite() {
            return Err(IkError::InvalidGoal("pose has non-finite components".into()));
        }
        if !is_unit_quaternion(&pose.orientation, self.quaternion_tolerance) {
            return Err(IkError::InvalidGoal(format!(
                "orientation {:?} is not a unit quaternion",
                pose.orientation
            )));
        }

        let deadline = Instant::now().checked_add(request.timeout);
        let target = match group.mode {
            TargetMode::Pose => IkTarget::Pose(pose.to_isometry()),
            TargetMode::Position => IkTarget::Position(pose.translation()),
        };

        let mut q = group.initial(request.seed)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.rng_seed);
        for attempt in 0..=self.max_restarts {
            let result = self.solver.solve_until(&group.chain, &target, &q, deadline);
            match result.termination {
                Termination::Converged => {
                    return Ok(JointState::new(
                        group.chain.joint_names(),
                        result.joint_positions,
                    ));
                }
                Termination::Deadline => return Err(IkError::Timeout),
                Termination::MaxIterations | Termination::Singular => {
                    debug!(
                        group = request.group_name,
                        attempt,
                        position_error = result.position_error,
                        orientation_error = result.orientation_error,
                        "IK attempt did not converge"
                    );
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(IkError::Timeout);
            }
            q = group.chain.sample(&mut rng);
        }
        Err(IkError::NoSolution)
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        self.groups.get(group_name).map(|g| GroupInfo {
            joint_names: g.chain.joint_names(),
            limits: g.chain.limits(),
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "KinematicsSolver"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
