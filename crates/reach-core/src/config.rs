use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::positions_equal;
use crate::error::ConfigError;
use crate::types::{
    Bounds, IDENTITY_ORIENTATION, Pose, Workspace, validate_orientations, validate_resolution,
};

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_solver_timeout() -> f64 {
    0.05
}
const fn default_cache_timeout() -> f64 {
    0.1
}
const fn default_attempts() -> u32 {
    1
}
fn default_orientations() -> Vec<[f64; 4]> {
    vec![IDENTITY_ORIENTATION]
}
const fn default_quaternion_tolerance() -> f64 {
    1e-3
}
const fn default_position_tolerance() -> f64 {
    1e-6
}
const fn default_joint_tolerance() -> f64 {
    1e-4
}
const fn default_grid_tolerance() -> f64 {
    1e-9
}
const fn default_max_solutions() -> usize {
    16
}
const fn default_max_attempts() -> usize {
    256
}

fn positive_seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.into(),
            message: format!("{value} must be a positive, representable number of seconds"),
        })
}

// ---------------------------------------------------------------------------
// Tolerances
// ---------------------------------------------------------------------------

/// Every epsilon used by comparisons and grid arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Component-wise quaternion tolerance; also the unit-norm tolerance.
    #[serde(default = "default_quaternion_tolerance")]
    pub quaternion: f64,
    /// Component-wise position tolerance (meters).
    #[serde(default = "default_position_tolerance")]
    pub position: f64,
    /// Per-joint tolerance used to tell configurations apart.
    #[serde(default = "default_joint_tolerance")]
    pub joint: f64,
    /// Slack added before flooring lattice step counts, so a span that is an
    /// exact multiple of the resolution is not lost to rounding.
    #[serde(default = "default_grid_tolerance")]
    pub grid: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            quaternion: default_quaternion_tolerance(),
            position: default_position_tolerance(),
            joint: default_joint_tolerance(),
            grid: default_grid_tolerance(),
        }
    }
}

impl Tolerances {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("tolerances.quaternion", self.quaternion),
            ("tolerances.position", self.position),
            ("tolerances.joint", self.joint),
            ("tolerances.grid", self.grid),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    message: format!("{value} must be finite and >= 0"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QueryConfig
// ---------------------------------------------------------------------------

/// Parameters of one reachability query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub group_name: String,
    #[serde(default)]
    pub origin: Pose,
    pub bounds: Bounds,
    pub position_resolution: f64,
    #[serde(default = "default_orientations")]
    pub orientations: Vec<[f64; 4]>,
    #[serde(default)]
    pub tool_frame_offset: Pose,
    /// Per-solve timeout in seconds.
    #[serde(default = "default_solver_timeout")]
    pub solver_timeout: f64,
    /// Solver attempts per point before the last failure is recorded.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

impl QueryConfig {
    pub fn solver_timeout(&self) -> Result<Duration, ConfigError> {
        positive_seconds("query.solver_timeout", self.solver_timeout)
    }

    /// Build the (still empty) workspace this query describes.
    pub fn to_workspace(&self) -> Workspace {
        Workspace::new(self.group_name.clone(), self.bounds, self.position_resolution)
            .with_origin(self.origin)
            .with_orientations(self.orientations.clone())
            .with_tool_frame_offset(self.tool_frame_offset)
    }

    pub fn validate(&self, tolerances: &Tolerances) -> Result<(), ConfigError> {
        self.to_workspace().validate(tolerances)?;
        self.solver_timeout()?;
        if self.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query.attempts".into(),
                message: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CacheOptions
// ---------------------------------------------------------------------------

/// Parameters a seed cache is generated with.
///
/// Persisted next to the cache entries so a loader can check that a file
/// matches what the current configuration expects before reusing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    #[serde(default)]
    pub origin: Pose,
    pub workspace_bounds: Bounds,
    pub resolution: f64,
    /// Per-solve timeout in seconds used while generating.
    #[serde(default = "default_cache_timeout")]
    pub solver_timeout: f64,
    /// Keep at most this many entries (first found, in grid order).
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Representative orientations; lookups snap to the nearest one.
    #[serde(default = "default_orientations")]
    pub orientations: Vec<[f64; 4]>,
}

impl CacheOptions {
    pub fn new(workspace_bounds: Bounds, resolution: f64) -> Self {
        Self {
            origin: Pose::IDENTITY,
            workspace_bounds,
            resolution,
            solver_timeout: default_cache_timeout(),
            max_entries: None,
            orientations: default_orientations(),
        }
    }

    pub fn solver_timeout(&self) -> Result<Duration, ConfigError> {
        positive_seconds("cache.options.solver_timeout", self.solver_timeout)
    }

    pub fn validate(&self, tolerances: &Tolerances) -> Result<(), ConfigError> {
        validate_resolution(self.resolution)?;
        self.workspace_bounds.validate()?;
        self.workspace_bounds
            .lattice_dims(self.resolution, tolerances.grid)?;
        validate_orientations(&self.orientations, tolerances.quaternion)?;
        self.solver_timeout()?;
        if self.max_entries == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "cache.options.max_entries".into(),
                message: "must be >= 1 when set".into(),
            });
        }
        Ok(())
    }

    /// Whether a cache built with `self` can serve lookups expected to use
    /// `expected`: same origin, bounds, resolution and orientation set.
    ///
    /// Timeout and entry limits only affect how the cache was filled, so they
    /// are not compared.
    pub fn is_compatible_with(&self, expected: &Self, tolerances: &Tolerances) -> bool {
        let eps = tolerances.position;
        (self.resolution - expected.resolution).abs() <= eps
            && positions_equal(&self.origin.position, &expected.origin.position, eps)
            && crate::compare::quaternions_equal(
                &self.origin.orientation,
                &expected.origin.orientation,
                tolerances.quaternion,
            )
            && positions_equal(
                &self.workspace_bounds.min,
                &expected.workspace_bounds.min,
                eps,
            )
            && positions_equal(
                &self.workspace_bounds.max,
                &expected.workspace_bounds.max,
                eps,
            )
            && self.orientations.len() == expected.orientations.len()
            && self
                .orientations
                .iter()
                .zip(&expected.orientations)
                .all(|(a, b)| crate::compare::quaternions_equal(a, b, tolerances.quaternion))
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Seed cache usage and generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Seed IK from the cache during queries.
    #[serde(default)]
    pub use_cache: bool,
    /// Cache file loaded at initialization and written by generation.
    #[serde(default)]
    pub filename: Option<PathBuf>,
    /// Options new caches are generated with and loaded caches must match.
    #[serde(default)]
    pub options: Option<CacheOptions>,
}

// ---------------------------------------------------------------------------
// RedundantConfig
// ---------------------------------------------------------------------------

/// Settings for the multi-solution search at a single pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundantConfig {
    /// Stop after this many distinct configurations.
    #[serde(default = "default_max_solutions")]
    pub max_solutions: usize,
    /// Stop after this many solver calls even if time remains.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Seed for the joint-space restart sampler.
    #[serde(default)]
    pub rng_seed: u64,
}

impl Default for RedundantConfig {
    fn default() -> Self {
        Self {
            max_solutions: default_max_solutions(),
            max_attempts: default_max_attempts(),
            rng_seed: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// ReachConfig
// ---------------------------------------------------------------------------

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachConfig {
    pub query: QueryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tolerances: Tolerances,
    #[serde(default)]
    pub redundant: RedundantConfig,
}

impl ReachConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tolerances.validate()?;
        self.query.validate(&self.tolerances)?;
        if let Some(options) = &self.cache.options {
            options.validate(&self.tolerances)?;
        }
        if self.cache.use_cache && self.cache.filename.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "cache.filename".into(),
                message: "required when use_cache = true".into(),
            });
        }
        if self.redundant.max_solutions == 0 || self.redundant.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "redundant".into(),
                message: "max_solutions and max_attempts must be >= 1".into(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
