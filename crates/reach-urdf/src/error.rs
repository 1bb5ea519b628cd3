//! Failures while loading a robot description or walking its joint tree.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UrdfError {
    #[error("cannot read robot description {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Rejected by the XML/URDF reader.
    #[error("malformed URDF: {0}")]
    Parse(String),

    #[error("unknown link: {0}")]
    MissingLink(String),

    #[error("unknown joint: {0}")]
    MissingJoint(String),

    /// Spherical joints have no single axis to solve over.
    #[error("joint type {0} cannot be used in a kinematic chain")]
    UnsupportedJointType(String),

    /// Every link is some joint's child, so the tree has no base.
    #[error("robot description has no root link")]
    NoRootLink,

    #[error("robot description has several root links: {0:?}")]
    MultipleRootLinks(Vec<String>),

    /// The requested tip is not below the requested base.
    #[error("link {tip} is not reachable from {base} through the joint tree")]
    NotConnected { base: String, tip: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
