//! Deterministic [`IkSolver`] fakes.
//!
//! Every fake answers from the request alone (plus, for the stateful ones, a
//! call counter), so repeated runs over the same workspace give identical
//! results.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use reach_core::compare::distance;
use reach_core::error::IkError;
use reach_core::traits::{GroupInfo, IkRequest, IkSolver};
use reach_core::types::{JointState, Pose};

fn xyz_names() -> Vec<String> {
    vec!["j0".into(), "j1".into(), "j2".into()]
}

// ---------------------------------------------------------------------------
// SphereSolver
// ---------------------------------------------------------------------------

/// Reaches every pose whose position lies inside a ball.
///
/// The returned joint state is the target position itself (`j0 = x`,
/// `j1 = y`, `j2 = z`), so tests can tell which pose a state came from.
pub struct SphereSolver {
    group: String,
    center: [f64; 3],
    radius: f64,
}

impl SphereSolver {
    pub fn new(group: impl Into<String>, center: [f64; 3], radius: f64) -> Self {
        Self {
            group: group.into(),
            center,
            radius,
        }
    }

    /// Group `"arm"` reaching everything within `radius` of the origin.
    pub fn arm(radius: f64) -> Self {
        Self::new("arm", [0.0; 3], radius)
    }

    /// Joint state this solver returns for a reachable `pose`.
    pub fn state_for(pose: &Pose) -> JointState {
        JointState::new(xyz_names(), pose.position.to_vec())
    }
}

impl IkSolver for SphereSolver {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        if request.group_name != self.group {
            return Err(IkError::UnknownGroup(request.group_name.into()));
        }
        if !request.pose.is_finite() {
            return Err(IkError::InvalidGoal("non-finite pose".into()));
        }
        if distance(&request.pose.position, &self.center) <= self.radius + 1e-9 {
            Ok(Self::state_for(&request.pose))
        } else {
            Err(IkError::NoSolution)
        }
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        (group_name == self.group).then(|| GroupInfo {
            joint_names: xyz_names(),
            limits: vec![(-self.radius, self.radius); 3],
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "SphereSolver"
    }
}

// ---------------------------------------------------------------------------
// TimeoutSolver
// ---------------------------------------------------------------------------

/// Always exceeds its deadline.
pub struct TimeoutSolver;

impl IkSolver for TimeoutSolver {
    fn solve(&self, _request: &IkRequest<'_>) -> Result<JointState, IkError> {
        Err(IkError::Timeout)
    }

    fn group_info(&self, _group_name: &str) -> Option<GroupInfo> {
        Some(GroupInfo {
            joint_names: xyz_names(),
            limits: vec![(-1.0, 1.0); 3],
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "TimeoutSolver"
    }
}

// ---------------------------------------------------------------------------
// SeedEchoSolver
// ---------------------------------------------------------------------------

/// Succeeds everywhere, returning the seed it was given.
///
/// Without a seed it returns all zeros. Useful for checking that seeds reach
/// the solver and for producing distinct redundant solutions.
pub struct SeedEchoSolver {
    joint_names: Vec<String>,
    limits: Vec<(f64, f64)>,
}

impl SeedEchoSolver {
    pub fn new(dof: usize) -> Self {
        Self {
            joint_names: (0..dof).map(|i| format!("j{i}")).collect(),
            limits: vec![(-1.0, 1.0); dof],
        }
    }
}

impl IkSolver for SeedEchoSolver {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        match request.seed {
            Some(seed) if seed.len() != self.joint_names.len() => Err(IkError::SeedMismatch {
                expected: self.joint_names.len(),
                got: seed.len(),
            }),
            Some(seed) => Ok(seed.clone()),
            None => Ok(JointState::new(
                self.joint_names.clone(),
                vec![0.0; self.joint_names.len()],
            )),
        }
    }

    fn group_info(&self, _group_name: &str) -> Option<GroupInfo> {
        Some(GroupInfo {
            joint_names: self.joint_names.clone(),
            limits: self.limits.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// CountdownSolver
// ---------------------------------------------------------------------------

/// Fails its first `failures` calls with `NoSolution`, then delegates.
pub struct CountdownSolver<S> {
    inner: S,
    remaining: AtomicUsize,
}

impl<S: IkSolver> CountdownSolver<S> {
    pub const fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(failures),
        }
    }
}

impl<S: IkSolver> IkSolver for CountdownSolver<S> {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        let fail = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            Err(IkError::NoSolution)
        } else {
            self.inner.solve(request)
        }
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        self.inner.group_info(group_name)
    }
}

// ---------------------------------------------------------------------------
// RecordingSolver
// ---------------------------------------------------------------------------

/// Owned copy of an [`IkRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub group_name: String,
    pub pose: Pose,
    pub seed: Option<JointState>,
}

/// Delegates to `inner` and remembers every request, in call order.
pub struct RecordingSolver<S> {
    inner: S,
    log: Mutex<Vec<RecordedRequest>>,
}

impl<S: IkSolver> RecordingSolver<S> {
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or_default()
    }
}

impl<S: IkSolver> IkSolver for RecordingSolver<S> {
    fn solve(&self, request: &IkRequest<'_>) -> Result<JointState, IkError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(RecordedRequest {
                group_name: request.group_name.into(),
                pose: request.pose,
                seed: request.seed.cloned(),
            });
        }
        self.inner.solve(request)
    }

    fn group_info(&self, group_name: &str) -> Option<GroupInfo> {
        self.inner.group_info(group_name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
