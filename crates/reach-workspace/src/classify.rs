//! Reachability classification and point filters.

use reach_core::compare::{distance, quaternions_equal};
use reach_core::types::{Workspace, WorkspacePoint};

/// Point indices split by reachability. Pending points count as unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub reachable: Vec<usize>,
    pub unreachable: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.reachable.len() + self.unreachable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split every point index of `workspace` into reachable and unreachable,
/// each list ascending.
pub fn classify(workspace: &Workspace) -> Partition {
    let mut partition = Partition::default();
    for (index, point) in workspace.points.iter().enumerate() {
        if point.is_reachable() {
            partition.reachable.push(index);
        } else {
            partition.unreachable.push(index);
        }
    }
    partition
}

/// Copy of `workspace` keeping only reachable points, in their original order.
pub fn filter_reachable(workspace: &Workspace) -> Workspace {
    let mut filtered = workspace.empty_like();
    filtered.points = workspace
        .points
        .iter()
        .filter(|p| p.is_reachable())
        .cloned()
        .collect();
    filtered
}

/// In-place [`filter_reachable`].
pub fn remove_unreachable(workspace: &mut Workspace) {
    workspace.points.retain(WorkspacePoint::is_reachable);
}

/// Indices of points whose orientation matches `orientation` within `eps`
/// per component, `q` and `-q` being the same rotation.
pub fn indices_at_orientation(
    workspace: &Workspace,
    orientation: &[f64; 4],
    eps: f64,
) -> Vec<usize> {
    workspace
        .points
        .iter()
        .enumerate()
        .filter(|(_, p)| quaternions_equal(&p.pose().orientation, orientation, eps))
        .map(|(i, _)| i)
        .collect()
}

/// Points matching `orientation`, see [`indices_at_orientation`].
pub fn points_at_orientation<'w>(
    workspace: &'w Workspace,
    orientation: &[f64; 4],
    eps: f64,
) -> Vec<&'w WorkspacePoint> {
    indices_at_orientation(workspace, orientation, eps)
        .into_iter()
        .map(|i| &workspace.points[i])
        .collect()
}

/// Indices of points whose distance from the workspace origin lies in
/// `[min_radius, max_radius]`.
pub fn indices_within_range(
    workspace: &Workspace,
    min_radius: f64,
    max_radius: f64,
) -> Vec<usize> {
    let center = workspace.origin.position;
    workspace
        .points
        .iter()
        .enumerate()
        .filter(|(_, p)| (min_radius..=max_radius).contains(&distance(&p.pose().position, &center)))
        .map(|(i, _)| i)
        .collect()
}

/// Points within the radius band, see [`indices_within_range`].
pub fn points_within_range(
    workspace: &Workspace,
    min_radius: f64,
    max_radius: f64,
) -> Vec<&WorkspacePoint> {
    indices_within_range(workspace, min_radius, max_radius)
        .into_iter()
        .map(|i| &workspace.points[i])
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use reach_core::error::IkError;
    use reach_core::types::{Bounds, IDENTITY_ORIENTATION, Pose, SolveResult};
    use reach_test_utils::sample_joint_state;

    fn mixed() -> Workspace {
        let mut ws = Workspace::new("arm", Bounds::new([0.0; 3], [0.3, 0.0, 0.0]), 0.1);
        for (i, ok) in [true, false, true, false].into_iter().enumerate() {
            let pose = Pose::from_position([0.1 * i as f64, 0.0, 0.0]);
            let result = if ok {
                SolveResult::success(sample_joint_state())
            } else {
                SolveResult::failure(&IkError::NoSolution)
            };
            ws.points.push(WorkspacePoint::evaluated(pose, result));
        }
        ws
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let mut ws = mixed();
        ws.points.push(WorkspacePoint::pending(Pose::IDENTITY));
        let part = classify(&ws);
        assert_eq!(part.reachable, vec![0, 2]);
        assert_eq!(part.unreachable, vec![1, 3, 4]);
        assert_eq!(part.len(), ws.len());
    }

    #[test]
    fn filter_keeps_order_and_parameters() {
        let ws = mixed();
        let filtered = filter_reachable(&ws);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.points[0], ws.points[0]);
        assert_eq!(filtered.points[1], ws.points[2]);
        assert_eq!(filtered.group_name, ws.group_name);
        assert_eq!(filtered.bounds, ws.bounds);
        assert_eq!(filter_reachable(&filtered), filtered);
    }

    #[test]
    fn remove_unreachable_matches_filter() {
        let mut ws = mixed();
        let expected = filter_reachable(&ws);
        remove_unreachable(&mut ws);
        assert_eq!(ws, expected);
    }

    #[test]
    fn orientation_filter_accepts_negated_quaternion() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let yaw = [0.0, 0.0, half, half];
        let mut ws = mixed();
        ws.points.push(WorkspacePoint::pending(Pose::new([0.0; 3], yaw)));
        let flipped = [0.0, 0.0, -half, -half];
        assert_eq!(indices_at_orientation(&ws, &flipped, 1e-3), vec![4]);
        assert_eq!(indices_at_orientation(&ws, &IDENTITY_ORIENTATION, 1e-3), vec![0, 1, 2, 3]);
        assert_eq!(points_at_orientation(&ws, &[0.0, 0.0, 0.0, -1.0], 1e-3).len(), 4);
    }

    #[test]
    fn orientation_filter_respects_epsilon() {
        let ws = mixed();
        let nudged = [0.0, 0.0, 0.01, 0.99995];
        assert!(indices_at_orientation(&ws, &nudged, 1e-3).is_empty());
        assert_eq!(indices_at_orientation(&ws, &nudged, 2e-2).len(), 4);
    }

    #[test]
    fn range_filter_measures_from_origin() {
        let ws = mixed();
        assert_eq!(indices_within_range(&ws, 0.05, 0.25), vec![1, 2]);
        assert_eq!(points_within_range(&ws, 0.0, 1.0).len(), 4);

        let shifted = ws.clone().with_origin(Pose::from_position([0.3, 0.0, 0.0]));
        assert_eq!(indices_within_range(&shifted, 0.0, 0.15), vec![2, 3]);
    }
}
