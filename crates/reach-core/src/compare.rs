//! Epsilon-parameterized comparisons for poses, quaternions and joint states.
//!
//! Every tolerance is passed in explicitly (usually from
//! [`Tolerances`](crate::config::Tolerances)) so tests can probe the
//! boundaries instead of relying on hidden constants.

use crate::types::JointState;

/// Component-wise quaternion equality within `eps`, treating `q` and `-q`
/// as the same rotation.
pub fn quaternions_equal(a: &[f64; 4], b: &[f64; 4], eps: f64) -> bool {
    let same = a.iter().zip(b).all(|(x, y)| (x - y).abs() <= eps);
    let flipped = a.iter().zip(b).all(|(x, y)| (x + y).abs() <= eps);
    same || flipped
}

/// Component-wise position equality within `eps`.
pub fn positions_equal(a: &[f64; 3], b: &[f64; 3], eps: f64) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= eps)
}

/// Whether `q` has unit norm within `eps`.
pub fn is_unit_quaternion(q: &[f64; 4], eps: f64) -> bool {
    let norm = q.iter().map(|c| c * c).sum::<f64>().sqrt();
    q.iter().all(|c| c.is_finite()) && (norm - 1.0).abs() <= eps
}

/// Rotation angle (radians, in `[0, pi]`) between two orientations.
///
/// Inputs are normalized first; the absolute dot product folds the
/// double cover so `q` and `-q` are at distance zero.
pub fn angular_distance(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let norm_a = a.iter().map(|c| c * c).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return std::f64::consts::PI;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() / (norm_a * norm_b);
    2.0 * dot.abs().min(1.0).acos()
}

/// Euclidean distance between two positions.
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Joint states are equal when they name the same joints in the same order
/// and every position agrees within `eps`.
pub fn joint_states_equal(a: &JointState, b: &JointState, eps: f64) -> bool {
    a.names == b.names
        && a.positions.len() == b.positions.len()
        && a
            .positions
            .iter()
            .zip(&b.positions)
            .all(|(x, y)| (x - y).abs() <= eps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

    #[test]
    fn quaternion_equal_to_itself() {
        assert!(quaternions_equal(&IDENTITY, &IDENTITY, 0.0));
    }

    #[test]
    fn quaternion_double_cover_is_equal() {
        let q = [0.5, 0.5, 0.5, 0.5];
        let neg = [-0.5, -0.5, -0.5, -0.5];
        assert!(quaternions_equal(&q, &neg, 1e-9));
    }

    #[test]
    fn quaternion_epsilon_boundary() {
        let near = [0.0, 0.0, 1e-3, 1.0];
        assert!(quaternions_equal(&IDENTITY, &near, 1e-3));
        assert!(!quaternions_equal(&IDENTITY, &near, 9e-4));
    }

    #[test]
    fn quaternion_mixed_signs_not_equal() {
        let a = [0.5, 0.5, 0.5, 0.5];
        let b = [0.5, -0.5, 0.5, -0.5];
        assert!(!quaternions_equal(&a, &b, 1e-6));
    }

    #[test]
    fn positions_equal_within_epsilon() {
        assert!(positions_equal(&[0.1, 0.2, 0.3], &[0.1, 0.2, 0.3 + 1e-7], 1e-6));
        assert!(!positions_equal(&[0.1, 0.2, 0.3], &[0.1, 0.2, 0.31], 1e-6));
    }

    #[test]
    fn unit_quaternion_check() {
        assert!(is_unit_quaternion(&IDENTITY, 1e-9));
        assert!(!is_unit_quaternion(&[0.0, 0.0, 0.0, 2.0], 1e-3));
        assert!(!is_unit_quaternion(&[f64::NAN, 0.0, 0.0, 1.0], 1e-3));
    }

    #[test]
    fn angular_distance_quarter_turn() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let yaw_90 = [0.0, 0.0, half, half];
        assert_relative_eq!(
            angular_distance(&IDENTITY, &yaw_90),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn angular_distance_ignores_sign() {
        let q = [0.0, 0.0, 0.0, -1.0];
        assert_relative_eq!(angular_distance(&IDENTITY, &q), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn distance_is_euclidean() {
        assert_relative_eq!(distance(&[0.0; 3], &[3.0, 4.0, 0.0]), 5.0);
    }

    #[test]
    fn joint_state_comparison() {
        let a = JointState::new(vec!["a".into(), "b".into()], vec![0.1, 0.2]);
        let b = JointState::new(vec!["a".into(), "b".into()], vec![0.1, 0.20005]);
        let c = JointState::new(vec!["a".into(), "c".into()], vec![0.1, 0.2]);
        assert!(joint_states_equal(&a, &b, 1e-4));
        assert!(!joint_states_equal(&a, &b, 1e-5));
        assert!(!joint_states_equal(&a, &c, 1.0));
    }
}
