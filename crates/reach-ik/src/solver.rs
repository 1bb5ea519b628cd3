//! Damped Least Squares (Levenberg-Marquardt) IK solver.
//!
//! Iteratively moves joint positions toward a target using the geometric
//! Jacobian and the damped pseudoinverse, stopping at convergence, at the
//! iteration cap, or when a wall-clock deadline passes.

use std::time::Instant;

use nalgebra::{DMatrix, DVector, Isometry3, Vector3};

use crate::chain::KinematicChain;

/// What the solver should match.
#[derive(Debug, Clone)]
pub enum IkTarget {
    /// Tip position only (3 constraints).
    Position(Vector3<f64>),
    /// Full tip pose (6 constraints).
    Pose(Isometry3<f64>),
}

impl IkTarget {
    const fn rows(&self) -> usize {
        match self {
            Self::Position(_) => 3,
            Self::Pose(_) => 6,
        }
    }
}

/// Configuration for the DLS solver.
#[derive(Debug, Clone)]
pub struct DlsConfig {
    pub max_iterations: u32,
    /// Position error tolerance (meters).
    pub position_tolerance: f64,
    /// Orientation error tolerance (radians).
    pub angle_tolerance: f64,
    /// Damping factor (lambda).
    pub damping: f64,
    /// Largest joint change per iteration (rad or m).
    pub max_step: f64,
}

impl Default for DlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            position_tolerance: 1e-5,
            angle_tolerance: 1e-4,
            damping: 0.01,
            max_step: 0.3,
        }
    }
}

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    MaxIterations,
    /// Damped normal matrix could not be inverted.
    Singular,
    Deadline,
}

/// Result of one DLS run.
#[derive(Debug, Clone)]
pub struct IkResult {
    /// Final joint positions.
    pub joint_positions: Vec<f64>,
    pub termination: Termination,
    pub iterations: u32,
    /// Final position error (meters).
    pub position_error: f64,
    /// Final orientation error (radians). Zero for position targets.
    pub orientation_error: f64,
}

impl IkResult {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Damped Least Squares IK solver.
#[derive(Debug, Clone, Default)]
pub struct DlsSolver {
    config: DlsConfig,
}

impl DlsSolver {
    pub const fn new(config: DlsConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(DlsConfig::default())
    }

    pub const fn config(&self) -> &DlsConfig {
        &self.config
    }

    /// Solve without a deadline.
    pub fn solve(&self, chain: &KinematicChain, target: &IkTarget, q_init: &[f64]) -> IkResult {
        self.solve_until(chain, target, q_init, None)
    }

    /// Solve from `q_init`, giving up once `deadline` has passed.
    ///
    /// `q_init` is clamped to the joint limits before the first iteration.
    pub fn solve_until(
        &self,
        chain: &KinematicChain,
        target: &IkTarget,
        q_init: &[f64],
        deadline: Option<Instant>,
    ) -> IkResult {
        let mut q = q_init.to_vec();
        q.resize(chain.dof(), 0.0);
        chain.clamp_joints(&mut q);

        let rows = target.rows();
        let damping_sq = self.config.damping * self.config.damping;

        for iteration in 0..self.config.max_iterations {
            let frames = chain.frames(&q);
            let error = compute_error(&frames.tip, target);

            if self.is_converged(&error) {
                return error.into_result(q, Termination::Converged, iteration);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return error.into_result(q, Termination::Deadline, iteration);
            }

            let jacobian = compute_jacobian(chain, &frames, rows);
            let damped = &jacobian * jacobian.transpose() + DMatrix::identity(rows, rows) * damping_sq;
            let Some(damped_inv) = damped.try_inverse() else {
                return error.into_result(q, Termination::Singular, iteration);
            };

            let mut dq = jacobian.transpose() * damped_inv * &error.vector;
            let largest = dq.amax();
            if largest > self.config.max_step {
                dq *= self.config.max_step / largest;
            }
            for (value, step) in q.iter_mut().zip(dq.iter()) {
                *value += step;
            }
            chain.clamp_joints(&mut q);
        }

        let error = compute_error(&chain.forward_kinematics(&q), target);
        let termination = if self.is_converged(&error) {
            Termination::Converged
        } else {
            Termination::MaxIterations
        };
        error.into_result(q, termination, self.config.max_iterations)
    }

    fn is_converged(&self, error: &TargetError) -> bool {
        error.position < self.config.position_tolerance
            && error.orientation < self.config.angle_tolerance
    }
}

struct TargetError {
    position: f64,
    orientation: f64,
    vector: DVector<f64>,
}

impl TargetError {
    fn into_result(self, joint_positions: Vec<f64>, termination: Termination, iterations: u32) -> IkResult {
        IkResult {
            joint_positions,
            termination,
            iterations,
            position_error: self.position,
            orientation_error: self.orientation,
        }
    }
}

/// Error between the current tip pose and the target.
fn compute_error(tip: &Isometry3<f64>, target: &IkTarget) -> TargetError {
    match target {
        IkTarget::Position(goal) => {
            let dp = goal - tip.translation.vector;
            TargetError {
                position: dp.norm(),
                orientation: 0.0,
                vector: DVector::from_column_slice(dp.as_slice()),
            }
        }
        IkTarget::Pose(goal) => {
            let dp = goal.translation.vector - tip.translation.vector;
            // Axis-angle of the rotation still to apply, in the base frame.
            let dr = (goal.rotation * tip.rotation.inverse()).scaled_axis();
            TargetError {
                position: dp.norm(),
                orientation: dr.norm(),
                vector: DVector::from_column_slice(&[dp.x, dp.y, dp.z, dr.x, dr.y, dr.z]),
            }
        }
    }
}

/// Geometric Jacobian: linear rows first, angular rows when `rows == 6`.
fn compute_jacobian(
    chain: &KinematicChain,
    frames: &crate::chain::ChainFrames,
    rows: usize,
) -> DMatrix<f64> {
    let tip = frames.tip.translation.vector;
    let mut jacobian = DMatrix::zeros(rows, chain.dof());

    for (i, joint) in chain.joints().iter().enumerate() {
        let axis = frames.axes[i];
        if joint.is_prismatic {
            jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&axis);
        } else {
            let linear = axis.cross(&(tip - frames.origins[i]));
            jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
            if rows == 6 {
                jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&axis);
            }
        }
    }

    jacobian
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
