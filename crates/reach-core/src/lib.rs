// reach-core: Data model, IK collaborator trait, config, comparisons and errors
// for workspace reachability analysis.

pub mod compare;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub mod prelude {
    pub use crate::compare::{
        angular_distance, distance, is_unit_quaternion, joint_states_equal, positions_equal,
        quaternions_equal,
    };
    pub use crate::config::{
        CacheConfig, CacheOptions, QueryConfig, ReachConfig, RedundantConfig, Tolerances,
    };
    pub use crate::error::{CacheError, ConfigError, ExportError, IkError, ReachError};
    pub use crate::traits::{GroupInfo, IkRequest, IkSolver};
    pub use crate::types::{
        Bounds, IDENTITY_ORIENTATION, JointState, Pose, SolveOutcome, SolveResult, Workspace,
        WorkspacePoint,
    };
}
