//! Kinematic robot model loaded from URDF.
//!
//! Only the parts of a URDF that matter for reachability are kept: the link
//! tree, joint types, origins, axes and position limits. Geometry, inertia
//! and dynamics are dropped at parse time.

pub mod error;
pub mod parser;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::UrdfError;
pub use parser::{parse_file, parse_string};
pub use types::{JointData, JointLimits, JointType, LinkData, Origin, RobotModel};
