use std::time::Duration;

use crate::error::IkError;
use crate::types::{JointState, Pose};

// ---------------------------------------------------------------------------
// IkRequest
// ---------------------------------------------------------------------------

/// One inverse-kinematics query.
#[derive(Debug, Clone, Copy)]
pub struct IkRequest<'a> {
    /// Kinematic group to solve for.
    pub group_name: &'a str,
    /// Target pose of the group's native end-effector frame.
    pub pose: Pose,
    /// Initial configuration; `None` lets the solver pick its default.
    pub seed: Option<&'a JointState>,
    /// Wall-clock budget for this call.
    pub timeout: Duration,
}

impl<'a> IkRequest<'a> {
    pub const fn new(group_name: &'a str, pose: Pose, timeout: Duration) -> Self {
        Self {
            group_name,
            pose,
            seed: None,
            timeout,
        }
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: Option<&'a JointState>) -> Self {
        self.seed = seed;
        self
    }
}

// ---------------------------------------------------------------------------
// GroupInfo
// ---------------------------------------------------------------------------

/// Static description of a kinematic group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    /// Active joints in chain order.
    pub joint_names: Vec<String>,
    /// `(lower, upper)` position limit per joint.
    pub limits: Vec<(f64, f64)>,
}

impl GroupInfo {
    pub fn dof(&self) -> usize {
        self.joint_names.len()
    }
}

// ---------------------------------------------------------------------------
// IkSolver
// ---------------------------------------------------------------------------

/// External inverse-kinematics collaborator.
///
/// Implementations may block for up to `request.timeout` and must be safe to
/// call from several threads at once.
pub trait IkSolver: Send + Sync {
    /// Solve for a joint configuration reaching `request.pose`.
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError>;

    /// Joint names and limits of `group_name`, if the solver knows it.
    fn group_info(&self, group_name: &str) -> Option<GroupInfo>;

    /// Human-readable name for this solver.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: IkSolver + ?Sized> IkSolver for &S {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        (**self).solve(request)
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        (**self).group_info(group_name)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: IkSolver + ?Sized> IkSolver for Box<S> {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        (**self).solve(request)
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        (**self).group_info(group_name)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSolver;

    impl IkSolver for FixedSolver {
        fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
            match request.seed {
                Some(seed) => Ok(seed.clone()),
                None => Err(IkError::NoSolution),
            }
        }

        fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
            (group_name == "arm").then(|| GroupInfo {
                joint_names: vec!["j0".into()],
                limits: vec![(-1.0, 1.0)],
            })
        }
    }

    #[test]
    fn request_builder() {
        let seed = JointState::new(vec!["j0".into()], vec![0.2]);
        let req = IkRequest::new("arm", Pose::IDENTITY, Duration::from_millis(5))
            .with_seed(Some(&seed));
        assert_eq!(req.group_name, "arm");
        assert_eq!(req.seed, Some(&seed));
        assert_eq!(req.timeout, Duration::from_millis(5));
    }

    #[test]
    fn solver_through_box_and_reference() {
        let boxed: Box<dyn IkSolver> = Box::new(FixedSolver);
        let seed = JointState::new(vec!["j0".into()], vec![0.2]);
        let req = IkRequest::new("arm", Pose::IDENTITY, Duration::from_millis(5))
            .with_seed(Some(&seed));
        assert_eq!(boxed.solve(&req).unwrap(), seed);
        assert_eq!((&FixedSolver).group_info("arm").unwrap().dof(), 1);
        assert!(boxed.group_info("leg").is_none());
    }

    #[test]
    fn default_name_is_type_name() {
        assert!(FixedSolver.name().ends_with("FixedSolver"));
    }
}
