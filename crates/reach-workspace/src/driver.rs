//! IK evaluation driver.
//!
//! Turns workspace points into solver requests: strips the tool offset,
//! seeds from the cache when nothing better is given, retries failed points
//! and records the outcome in place.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use reach_core::compare::joint_states_equal;
use reach_core::config::RedundantConfig;
use reach_core::error::IkError;
use reach_core::traits::{GroupInfo, IkRequest, IkSolver};
use reach_core::types::{JointState, Pose, SolveOutcome, SolveResult, Workspace};
use tracing::{debug, trace};

use crate::cache::SeedCache;

/// Pose of the group's native end-effector frame that puts the tool tip at
/// `pose`, i.e. `pose * tool_offset⁻¹`.
///
/// An exactly-identity offset returns `pose` untouched, so solving with no
/// offset never picks up rounding from the round trip through an isometry.
pub fn native_pose(pose: &Pose, tool_offset: &Pose) -> Pose {
    if *tool_offset == Pose::IDENTITY {
        *pose
    } else {
        pose.compose(&tool_offset.inverse())
    }
}

/// Per-call solver front end.
pub struct IkDriver<'a, S: ?Sized> {
    solver: &'a S,
    cache: Option<&'a SeedCache>,
    attempts: u32,
}

impl<'a, S: IkSolver + ?Sized> IkDriver<'a, S> {
    /// Driver with no cache and a single attempt per point.
    pub const fn new(solver: &'a S) -> Self {
        Self {
            solver,
            cache: None,
            attempts: 1,
        }
    }

    #[must_use]
    pub const fn with_cache(mut self, cache: Option<&'a SeedCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Solver calls per point before the last failure is recorded (at least one).
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub const fn solver(&self) -> &'a S {
        self.solver
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Seed the cache holds for the native frame of `pose`.
    pub fn cached_seed(&self, group: &str, native: &Pose) -> Option<&'a JointState> {
        self.cache.and_then(|cache| cache.lookup(group, native))
    }

    /// Solve one pose of the tool tip.
    ///
    /// An explicit `seed` wins over the cache. Failures are retried up to the
    /// configured attempt count, except invalid goals, which cannot improve.
    pub fn solve(
        &self,
        group: &str,
        pose: &Pose,
        tool_offset: &Pose,
        timeout: Duration,
        seed: Option<&JointState>,
    ) -> SolveResult {
        let native = native_pose(pose, tool_offset);
        let seed = seed.or_else(|| self.cached_seed(group, &native));
        let request = IkRequest::new(group, native, timeout).with_seed(seed);

        let mut last = IkError::NoSolution;
        for attempt in 0..self.attempts {
            match self.solver.solve(&request) {
                Ok(state) => return SolveResult::success(state),
                Err(err) => {
                    trace!(group, attempt, error = %err, "ik attempt failed");
                    let give_up = SolveOutcome::from(&err) == SolveOutcome::InvalidGoal;
                    last = err;
                    if give_up {
                        break;
                    }
                }
            }
        }
        debug!(group, position = ?pose.position, error = %last, "point unreachable");
        SolveResult::failure(&last)
    }

    /// Evaluate every point of `workspace` in order, overwriting each result.
    pub fn find_ik_solutions(&self, workspace: &mut Workspace, timeout: Duration) {
        let Workspace {
            group_name,
            tool_frame_offset,
            points,
            ..
        } = workspace;
        for point in points.iter_mut() {
            let pose = *point.pose();
            point.record(self.solve(group_name, &pose, tool_frame_offset, timeout, None));
        }
    }

    /// [`find_ik_solutions`](Self::find_ik_solutions) spread over the rayon
    /// pool. Points are independent, so results match the sequential path
    /// point for point.
    pub fn find_ik_solutions_parallel(&self, workspace: &mut Workspace, timeout: Duration) {
        let Workspace {
            group_name,
            tool_frame_offset,
            points,
            ..
        } = workspace;
        let group: &str = group_name;
        let offset: &Pose = tool_frame_offset;
        points.par_iter_mut().for_each(|point| {
            let pose = *point.pose();
            point.record(self.solve(group, &pose, offset, timeout, None));
        });
    }

    /// Step-by-step evaluation of `workspace`, starting at point 0.
    pub fn evaluate<'w>(
        self,
        workspace: &'w mut Workspace,
        timeout: Duration,
    ) -> Evaluation<'w, 'a, S> {
        Evaluation {
            driver: self,
            workspace,
            timeout,
            next: 0,
        }
    }

    /// Distinct joint configurations reaching `pose`.
    ///
    /// The first call uses the cache seed (or the solver default); later calls
    /// start from configurations drawn uniformly within the group's limits.
    /// Stops once `config.max_solutions` are found, `config.max_attempts`
    /// calls have been made or `timeout` has elapsed. Two states count as
    /// distinct when some joint differs by more than `joint_eps`.
    pub fn redundant_solutions(
        &self,
        group: &str,
        pose: &Pose,
        tool_offset: &Pose,
        timeout: Duration,
        config: &RedundantConfig,
        joint_eps: f64,
    ) -> Vec<JointState> {
        let native = native_pose(pose, tool_offset);
        let start = Instant::now();
        let deadline = start.checked_add(timeout);
        let info = self.solver.group_info(group);
        let mut rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        let mut solutions: Vec<JointState> = Vec::new();

        for attempt in 0..config.max_attempts {
            if solutions.len() >= config.max_solutions {
                break;
            }
            let now = Instant::now();
            if attempt > 0 && deadline.is_some_and(|d| now >= d) {
                break;
            }
            let seed = if attempt == 0 {
                self.cached_seed(group, &native).cloned()
            } else {
                match &info {
                    Some(info) => Some(sample_seed(info, &mut rng)),
                    // Without limits there is nothing to resample from.
                    None => break,
                }
            };
            let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(now));
            let request = IkRequest::new(group, native, remaining).with_seed(seed.as_ref());
            match self.solver.solve(&request) {
                Ok(state) => {
                    if !solutions.iter().any(|s| joint_states_equal(s, &state, joint_eps)) {
                        solutions.push(state);
                    }
                }
                Err(err) => trace!(group, attempt, error = %err, "redundant attempt failed"),
            }
        }
        debug!(
            group,
            found = solutions.len(),
            elapsed = ?start.elapsed(),
            "redundant search finished"
        );
        solutions
    }
}

/// Uniform configuration within `info.limits`.
fn sample_seed(info: &GroupInfo, rng: &mut impl Rng) -> JointState {
    let positions = info
        .limits
        .iter()
        .map(|&(lower, upper)| {
            if upper > lower {
                rng.gen_range(lower..=upper)
            } else {
                lower
            }
        })
        .collect();
    JointState::new(info.joint_names.clone(), positions)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Resumable walk over a workspace.
///
/// Each `next()` evaluates exactly one point and yields its index and
/// outcome. Dropping the iterator stops evaluation between points; the
/// workspace keeps every result recorded so far.
pub struct Evaluation<'w, 'a, S: ?Sized> {
    driver: IkDriver<'a, S>,
    workspace: &'w mut Workspace,
    timeout: Duration,
    next: usize,
}

impl<S: IkSolver + ?Sized> Evaluation<'_, '_, S> {
    /// Index of the next point to evaluate.
    pub const fn position(&self) -> usize {
        self.next
    }

    /// Points left to evaluate.
    pub fn remaining(&self) -> usize {
        self.workspace.len().saturating_sub(self.next)
    }

    /// Continue from `index` instead of the current position.
    #[must_use]
    pub fn resume_at(mut self, index: usize) -> Self {
        self.next = index.min(self.workspace.len());
        self
    }

    pub fn workspace(&self) -> &Workspace {
        self.workspace
    }

    /// Evaluate all remaining points. Returns how many were evaluated.
    pub fn finish(self) -> usize {
        self.count()
    }
}

impl<S: IkSolver + ?Sized> Iterator for Evaluation<'_, '_, S> {
    type Item = (usize, SolveOutcome);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let pose = *self.workspace.points.get(index)?.pose();
        let result = self.driver.solve(
            &self.workspace.group_name,
            &pose,
            &self.workspace.tool_frame_offset,
            self.timeout,
            None,
        );
        let outcome = result.outcome();
        self.workspace.points[index].record(result);
        self.next += 1;
        Some((index, outcome))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use reach_core::config::{CacheOptions, Tolerances};
    use reach_core::types::Bounds;
    use reach_test_utils::{
        CountdownSolver, RecordingSolver, SeedEchoSolver, SphereSolver, TimeoutSolver,
        grid_workspace,
    };

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn evaluated(radius: f64) -> Workspace {
        let mut ws = grid_workspace("arm", [0.0; 3], [0.4, 0.4, 0.0], 0.1);
        IkDriver::new(&SphereSolver::arm(radius)).find_ik_solutions(&mut ws, TIMEOUT);
        ws
    }

    // -- Tool offset --

    #[test]
    fn identity_offset_leaves_pose_untouched() {
        let pose = Pose::new([0.1, 0.2, 0.3], [0.0, 0.0, 0.6, 0.8]);
        assert_eq!(native_pose(&pose, &Pose::IDENTITY), pose);
    }

    #[test]
    fn offset_is_removed_from_target() {
        let pose = Pose::from_position([0.3, 0.0, 0.0]);
        let offset = Pose::from_position([0.0, 0.0, 0.1]);
        let native = native_pose(&pose, &offset);
        assert_relative_eq!(native.position[0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(native.position[2], -0.1, epsilon = 1e-12);
        // Putting the offset back recovers the tool pose.
        let tip = native.compose(&offset);
        assert_relative_eq!(tip.position[2], 0.0, epsilon = 1e-12);
    }

    // -- Single solve --

    #[test]
    fn solve_maps_outcomes() {
        let solver = SphereSolver::arm(0.2);
        let driver = IkDriver::new(&solver);
        let ok = driver.solve("arm", &Pose::from_position([0.1, 0.0, 0.0]), &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(ok.outcome(), SolveOutcome::Success);
        assert_eq!(ok.joint_state().unwrap().positions, vec![0.1, 0.0, 0.0]);

        let far = driver.solve("arm", &Pose::from_position([1.0, 0.0, 0.0]), &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(far.outcome(), SolveOutcome::NoIkSolution);
        assert!(far.joint_state().is_none());

        let other = driver.solve("leg", &Pose::IDENTITY, &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(other.outcome(), SolveOutcome::InvalidGoal);

        let slow = IkDriver::new(&TimeoutSolver).solve("arm", &Pose::IDENTITY, &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(slow.outcome(), SolveOutcome::Timeout);
    }

    #[test]
    fn solver_sees_native_pose() {
        let solver = RecordingSolver::new(SphereSolver::arm(1.0));
        let offset = Pose::from_position([0.0, 0.0, 0.1]);
        IkDriver::new(&solver).solve("arm", &Pose::from_position([0.2, 0.0, 0.0]), &offset, TIMEOUT, None);
        let sent = solver.requests()[0].pose;
        assert_relative_eq!(sent.position[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn cache_seeds_unseeded_requests() {
        let tol = Tolerances::default();
        let mut cache =
            SeedCache::new(CacheOptions::new(Bounds::new([0.0; 3], [0.4; 3]), 0.1), &tol).unwrap();
        let pose = Pose::from_position([0.2, 0.1, 0.0]);
        let stored = JointState::new(vec!["j0".into(), "j1".into(), "j2".into()], vec![0.5; 3]);
        cache.insert("arm", &pose, stored.clone());

        let solver = RecordingSolver::new(SeedEchoSolver::new(3));
        let driver = IkDriver::new(&solver).with_cache(Some(&cache));
        let result = driver.solve("arm", &pose, &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(result.joint_state(), Some(&stored));

        let explicit = JointState::new(stored.names.clone(), vec![-0.5; 3]);
        driver.solve("arm", &pose, &Pose::IDENTITY, TIMEOUT, Some(&explicit));
        let log = solver.requests();
        assert_eq!(log[0].seed.as_ref(), Some(&stored));
        assert_eq!(log[1].seed.as_ref(), Some(&explicit));

        // A pose the cache never saw goes out unseeded.
        driver.solve("arm", &Pose::from_position([3.0, 0.0, 0.0]), &Pose::IDENTITY, TIMEOUT, None);
        assert!(solver.requests()[2].seed.is_none());
    }

    #[test]
    fn attempts_retry_failures() {
        let pose = Pose::from_position([0.1, 0.0, 0.0]);
        let solver = CountdownSolver::new(SphereSolver::arm(1.0), 2);
        let driver = IkDriver::new(&solver).with_attempts(3);
        assert!(driver.solve("arm", &pose, &Pose::IDENTITY, TIMEOUT, None).outcome().is_success());

        let solver = CountdownSolver::new(SphereSolver::arm(1.0), 2);
        let driver = IkDriver::new(&solver).with_attempts(2);
        assert_eq!(
            driver.solve("arm", &pose, &Pose::IDENTITY, TIMEOUT, None).outcome(),
            SolveOutcome::NoIkSolution
        );
        assert_eq!(IkDriver::new(&solver).with_attempts(0).attempts(), 1);
    }

    #[test]
    fn invalid_goals_are_not_retried() {
        let solver = RecordingSolver::new(SphereSolver::arm(1.0));
        let driver = IkDriver::new(&solver).with_attempts(5);
        let bad = Pose::from_position([f64::NAN, 0.0, 0.0]);
        let result = driver.solve("arm", &bad, &Pose::IDENTITY, TIMEOUT, None);
        assert_eq!(result.outcome(), SolveOutcome::InvalidGoal);
        assert_eq!(solver.call_count(), 1);
    }

    // -- Batch --

    #[test]
    fn batch_fills_every_point() {
        let ws = evaluated(0.25);
        assert_eq!(ws.len(), 25);
        assert!(ws.is_fully_evaluated());
        assert_eq!(ws.reachable_count(), 8);
        for point in &ws.points {
            assert_eq!(point.joint_state().is_some(), point.is_reachable());
        }
    }

    #[test]
    fn batch_calls_solver_in_point_order() {
        let solver = RecordingSolver::new(SphereSolver::arm(0.25));
        let mut ws = grid_workspace("arm", [0.0; 3], [0.2, 0.2, 0.0], 0.1);
        IkDriver::new(&solver).find_ik_solutions(&mut ws, TIMEOUT);
        let sent: Vec<Pose> = solver.requests().iter().map(|r| r.pose).collect();
        let expected: Vec<Pose> = ws.points.iter().map(|p| *p.pose()).collect();
        assert_eq!(sent, expected);
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = evaluated(0.3);
        let mut parallel = grid_workspace("arm", [0.0; 3], [0.4, 0.4, 0.0], 0.1);
        IkDriver::new(&SphereSolver::arm(0.3)).find_ik_solutions_parallel(&mut parallel, TIMEOUT);
        assert_eq!(parallel, sequential);
    }

    // -- Evaluation --

    #[test]
    fn evaluation_can_stop_and_resume() {
        let solver = SphereSolver::arm(0.25);
        let mut ws = grid_workspace("arm", [0.0; 3], [0.4, 0.4, 0.0], 0.1);

        let mut run = IkDriver::new(&solver).evaluate(&mut ws, TIMEOUT);
        assert_eq!(run.remaining(), 25);
        let first: Vec<_> = run.by_ref().take(10).collect();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], (0, SolveOutcome::Success));
        assert_eq!(run.position(), 10);
        drop(run);
        assert!(!ws.points[9].is_pending());
        assert!(ws.points[10].is_pending());

        let rest = IkDriver::new(&solver).evaluate(&mut ws, TIMEOUT).resume_at(10).finish();
        assert_eq!(rest, 15);
        assert_eq!(ws, evaluated(0.25));
    }

    #[test]
    fn resume_past_end_is_empty() {
        let solver = SphereSolver::arm(0.25);
        let mut ws = grid_workspace("arm", [0.0; 3], [0.1, 0.0, 0.0], 0.1);
        let mut run = IkDriver::new(&solver).evaluate(&mut ws, TIMEOUT).resume_at(99);
        assert_eq!(run.remaining(), 0);
        assert!(run.next().is_none());
    }

    // -- Redundant solutions --

    #[test]
    fn redundant_collects_distinct_states() {
        let solver = SeedEchoSolver::new(2);
        let config = RedundantConfig {
            max_solutions: 4,
            max_attempts: 100,
            rng_seed: 3,
        };
        let found = IkDriver::new(&solver).redundant_solutions(
            "arm",
            &Pose::IDENTITY,
            &Pose::IDENTITY,
            Duration::from_secs(5),
            &config,
            1e-4,
        );
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].positions, vec![0.0, 0.0]);
        for (i, a) in found.iter().enumerate() {
            for b in &found[i + 1..] {
                assert!(!joint_states_equal(a, b, 1e-4));
            }
        }
    }

    #[test]
    fn redundant_is_reproducible() {
        let solver = SeedEchoSolver::new(3);
        let config = RedundantConfig {
            max_solutions: 5,
            max_attempts: 50,
            rng_seed: 11,
        };
        let run = || {
            IkDriver::new(&solver).redundant_solutions(
                "arm",
                &Pose::IDENTITY,
                &Pose::IDENTITY,
                Duration::from_secs(5),
                &config,
                1e-4,
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn redundant_respects_attempt_cap() {
        // The sphere solver ignores seeds, so only one distinct state exists.
        let solver = RecordingSolver::new(SphereSolver::arm(1.0));
        let config = RedundantConfig {
            max_solutions: 10,
            max_attempts: 7,
            rng_seed: 0,
        };
        let found = IkDriver::new(&solver).redundant_solutions(
            "arm",
            &Pose::from_position([0.2, 0.0, 0.0]),
            &Pose::IDENTITY,
            Duration::from_secs(5),
            &config,
            1e-4,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(solver.call_count(), 7);
    }

    #[test]
    fn redundant_unknown_group_finds_nothing() {
        let solver = RecordingSolver::new(SphereSolver::arm(1.0));
        let found = IkDriver::new(&solver).redundant_solutions(
            "leg",
            &Pose::IDENTITY,
            &Pose::IDENTITY,
            Duration::from_secs(1),
            &RedundantConfig::default(),
            1e-4,
        );
        assert!(found.is_empty());
        assert_eq!(solver.call_count(), 1);
    }
}
