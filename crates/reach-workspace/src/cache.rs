//! Seed cache: known-good joint states keyed by discretized pose.
//!
//! Keys are `(group, cell, bucket)`:
//!
//! - `cell` is the nearest node of the cache lattice, computed in the cache
//!   origin's frame as `floor((local - min) / resolution + 0.5)` per axis.
//!   Positions whose node falls outside the lattice have no key.
//! - `bucket` is the index of the nearest entry of `options.orientations` by
//!   angular distance, ties going to the lowest index.
//!
//! Both rules depend only on the pose and the stored options, so repeated
//! lookups of the same pose always hit the same entry.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reach_core::compare::angular_distance;
use reach_core::config::{CacheOptions, Tolerances};
use reach_core::error::{CacheError, ConfigError};
use reach_core::traits::IkSolver;
use reach_core::types::{JointState, Pose, Workspace};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::IkDriver;
use crate::grid;

/// Format version written to and required from cache files.
pub const CACHE_VERSION: u32 = 1;

/// Discretized pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub cell: [i64; 3],
    pub bucket: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    group: String,
    cell: [i64; 3],
    bucket: usize,
    joint_state: JointState,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    options: CacheOptions,
    entries: Vec<CacheEntry>,
}

/// In-memory seed cache.
///
/// Read-only while queries run; regeneration builds a new cache and swaps it
/// in, so a failed generation never leaves a half-written one behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedCache {
    options: CacheOptions,
    dims: [usize; 3],
    entries: BTreeMap<String, BTreeMap<CellKey, JointState>>,
}

impl SeedCache {
    /// Empty cache over the lattice described by `options`.
    pub fn new(options: CacheOptions, tolerances: &Tolerances) -> Result<Self, ConfigError> {
        options.validate(tolerances)?;
        let dims = options
            .workspace_bounds
            .lattice_dims(options.resolution, tolerances.grid)?;
        Ok(Self {
            options,
            dims,
            entries: BTreeMap::new(),
        })
    }

    pub const fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Total entries over all groups.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Groups with at least one entry, sorted.
    pub fn groups(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Whether `max_entries` has been reached.
    pub fn is_full(&self) -> bool {
        self.options.max_entries.is_some_and(|max| self.len() >= max)
    }

    /// Cache key of `pose`, or `None` when it lies off the lattice.
    #[allow(clippy::cast_possible_truncation)]
    pub fn key_for(&self, pose: &Pose) -> Option<CellKey> {
        if !pose.is_finite() {
            return None;
        }
        let local = self.options.origin.inverse().compose(pose);
        let bounds = &self.options.workspace_bounds;
        let mut cell = [0_i64; 3];
        for axis in 0..3 {
            let steps = (local.position[axis] - bounds.min[axis]) / self.options.resolution;
            let node = (steps + 0.5).floor();
            if node < 0.0 || node >= self.dims[axis] as f64 {
                return None;
            }
            cell[axis] = node as i64;
        }
        Some(CellKey {
            cell,
            bucket: self.bucket_for(&local.orientation),
        })
    }

    /// Nearest representative orientation, lowest index on ties.
    pub fn bucket_for(&self, orientation: &[f64; 4]) -> usize {
        let mut best = (0, f64::INFINITY);
        for (index, candidate) in self.options.orientations.iter().enumerate() {
            let d = angular_distance(orientation, candidate);
            if d < best.1 {
                best = (index, d);
            }
        }
        best.0
    }

    /// Store `joint_state` for `pose` unless the pose is off the lattice, the
    /// key is already taken or the cache is full. Returns whether it was stored.
    pub fn insert(&mut self, group: &str, pose: &Pose, joint_state: JointState) -> bool {
        if self.is_full() {
            return false;
        }
        let Some(key) = self.key_for(pose) else {
            return false;
        };
        let slots = self.entries.entry(group.to_string()).or_default();
        if slots.contains_key(&key) {
            return false;
        }
        slots.insert(key, joint_state);
        true
    }

    /// Seed stored for `pose` in `group`. A miss is a normal outcome.
    pub fn lookup(&self, group: &str, pose: &Pose) -> Option<&JointState> {
        let key = self.key_for(pose)?;
        self.entries.get(group)?.get(&key)
    }

    /// Run a full uncached evaluation over the lattice in `options` and keep
    /// every successful joint state.
    ///
    /// Fails with [`CacheError::GenerationFailed`] when no point succeeds.
    pub fn generate<S: IkSolver + ?Sized>(
        solver: &S,
        group: &str,
        timeout: Duration,
        options: CacheOptions,
        tolerances: &Tolerances,
    ) -> Result<Self, CacheError> {
        let mut cache = Self::new(options, tolerances)
            .map_err(|e| CacheError::GenerationFailed(e.to_string()))?;

        let mut workspace = Workspace::new(
            group,
            cache.options.workspace_bounds,
            cache.options.resolution,
        )
        .with_origin(cache.options.origin)
        .with_orientations(cache.options.orientations.clone());
        grid::generate(&mut workspace, tolerances)
            .map_err(|e| CacheError::GenerationFailed(e.to_string()))?;

        info!(group, points = workspace.len(), "generating seed cache");
        IkDriver::new(solver).find_ik_solutions(&mut workspace, timeout);

        for point in &workspace.points {
            if cache.is_full() {
                debug!(max_entries = ?cache.options.max_entries, "seed cache full");
                break;
            }
            if let Some(state) = point.joint_state() {
                cache.insert(group, point.pose(), state.clone());
            }
        }

        if cache.is_empty() {
            return Err(CacheError::GenerationFailed(format!(
                "no reachable points for group {group} out of {}",
                workspace.len()
            )));
        }
        info!(group, entries = cache.len(), "seed cache generated");
        Ok(cache)
    }

    /// Write the cache as JSON.
    ///
    /// Writes a sibling temporary file first and renames it over `path`, so a
    /// failed write leaves any previous file untouched. The temporary file is
    /// removed on every error path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref();
        let file = CacheFile {
            version: CACHE_VERSION,
            options: self.options.clone(),
            entries: self
                .entries
                .iter()
                .flat_map(|(group, slots)| {
                    slots.iter().map(move |(key, state)| CacheEntry {
                        group: group.clone(),
                        cell: key.cell,
                        bucket: key.bucket,
                        joint_state: state.clone(),
                    })
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(path.file_name().unwrap_or_default())
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(io_error(path))?;
        tmp.write_all(&json).map_err(io_error(path))?;
        tmp.as_file().sync_all().map_err(io_error(path))?;
        tmp.persist(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %path.display(), entries = self.len(), "seed cache saved");
        Ok(())
    }

    /// Read a cache file.
    pub fn load(path: impl AsRef<Path>, tolerances: &Tolerances) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(io_error(path))?;
        let file: CacheFile = serde_json::from_slice(&bytes)?;
        if file.version != CACHE_VERSION {
            return Err(CacheError::Incompatible(format!(
                "version {} (expected {CACHE_VERSION})",
                file.version
            )));
        }
        let mut cache = Self::new(file.options, tolerances)
            .map_err(|e| CacheError::Incompatible(e.to_string()))?;
        for entry in file.entries {
            cache.check_entry(&entry)?;
            let key = CellKey {
                cell: entry.cell,
                bucket: entry.bucket,
            };
            cache
                .entries
                .entry(entry.group)
                .or_default()
                .insert(key, entry.joint_state);
        }
        debug!(path = %path.display(), entries = cache.len(), "seed cache loaded");
        Ok(cache)
    }

    /// Reject entries that could never be produced by `key_for` under this
    /// cache's options.
    fn check_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let buckets = self.options.orientations.len();
        if entry.bucket >= buckets {
            return Err(CacheError::Incompatible(format!(
                "entry for group {} has orientation bucket {} but only {buckets} orientations",
                entry.group, entry.bucket
            )));
        }
        let inside = entry
            .cell
            .iter()
            .zip(self.dims)
            .all(|(&c, n)| usize::try_from(c).is_ok_and(|c| c < n));
        if !inside {
            return Err(CacheError::Incompatible(format!(
                "entry for group {} has cell {:?} outside lattice {:?}",
                entry.group, entry.cell, self.dims
            )));
        }
        Ok(())
    }

    /// Read a cache file and require it to match `expected`.
    pub fn load_compatible(
        path: impl AsRef<Path>,
        expected: &CacheOptions,
        tolerances: &Tolerances,
    ) -> Result<Self, CacheError> {
        let cache = Self::load(path, tolerances)?;
        if cache.options.is_compatible_with(expected, tolerances) {
            Ok(cache)
        } else {
            Err(CacheError::Incompatible(
                "origin, bounds, resolution or orientations differ from the configured options"
                    .into(),
            ))
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use reach_core::types::{Bounds, IDENTITY_ORIENTATION};
    use reach_test_utils::{SphereSolver, TimeoutSolver};

    fn options() -> CacheOptions {
        CacheOptions::new(Bounds::new([0.0; 3], [0.4, 0.4, 0.0]), 0.1)
    }

    fn state(v: f64) -> JointState {
        JointState::new(vec!["j0".into()], vec![v])
    }

    fn empty_cache() -> SeedCache {
        SeedCache::new(options(), &Tolerances::default()).unwrap()
    }

    // -- Discretization --

    #[test]
    fn key_rounds_to_nearest_node() {
        let cache = empty_cache();
        let key = cache.key_for(&Pose::from_position([0.14, 0.26, 0.0])).unwrap();
        assert_eq!(key.cell, [1, 3, 0]);
        assert_eq!(key.bucket, 0);
        let exact = cache.key_for(&Pose::from_position([0.3, 0.1, 0.0])).unwrap();
        assert_eq!(exact.cell, [3, 1, 0]);
    }

    #[test]
    fn off_lattice_has_no_key() {
        let cache = empty_cache();
        assert!(cache.key_for(&Pose::from_position([-0.2, 0.0, 0.0])).is_none());
        assert!(cache.key_for(&Pose::from_position([0.5, 0.0, 0.0])).is_none());
        assert!(cache.key_for(&Pose::from_position([0.0, 0.0, 0.2])).is_none());
        assert!(cache.key_for(&Pose::from_position([f64::NAN, 0.0, 0.0])).is_none());
        // Half a cell beyond the edge still rounds onto it.
        assert!(cache.key_for(&Pose::from_position([0.44, 0.0, 0.0])).is_some());
    }

    #[test]
    fn key_uses_cache_origin() {
        let mut opts = options();
        opts.origin = Pose::from_position([1.0, 1.0, 0.0]);
        let cache = SeedCache::new(opts, &Tolerances::default()).unwrap();
        let key = cache.key_for(&Pose::from_position([1.2, 1.1, 0.0])).unwrap();
        assert_eq!(key.cell, [2, 1, 0]);
        assert!(cache.key_for(&Pose::from_position([0.2, 0.1, 0.0])).is_none());
    }

    #[test]
    fn buckets_pick_nearest_orientation() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let mut opts = options();
        opts.orientations = vec![IDENTITY_ORIENTATION, [0.0, 0.0, half, half]];
        let cache = SeedCache::new(opts, &Tolerances::default()).unwrap();
        // 30 degrees of yaw is nearer identity, 60 degrees nearer the 90 degree entry.
        let yaw = |deg: f64| {
            let h = deg.to_radians() / 2.0;
            [0.0, 0.0, h.sin(), h.cos()]
        };
        assert_eq!(cache.bucket_for(&yaw(30.0)), 0);
        assert_eq!(cache.bucket_for(&yaw(60.0)), 1);
        // Sign of the quaternion does not matter.
        assert_eq!(cache.bucket_for(&[0.0, 0.0, -half, -half]), 1);
    }

    #[test]
    fn bucket_ties_go_to_lowest_index() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let mut opts = options();
        opts.orientations = vec![IDENTITY_ORIENTATION, [1.0, 0.0, 0.0, 0.0]];
        let cache = SeedCache::new(opts, &Tolerances::default()).unwrap();
        // 90 degrees about x sits exactly between identity and the half turn.
        assert_eq!(cache.bucket_for(&[half, 0.0, 0.0, half]), 0);
    }

    // -- Insert / lookup --

    #[test]
    fn insert_then_lookup() {
        let mut cache = empty_cache();
        let pose = Pose::from_position([0.2, 0.1, 0.0]);
        assert!(cache.insert("arm", &pose, state(0.5)));
        assert_eq!(cache.lookup("arm", &pose), Some(&state(0.5)));
        // Nearby poses share the cell.
        let near = Pose::from_position([0.21, 0.12, 0.0]);
        assert_eq!(cache.lookup("arm", &near), Some(&state(0.5)));
        assert_eq!(cache.lookup("leg", &pose), None);
        assert_eq!(cache.groups(), vec!["arm"]);
    }

    #[test]
    fn first_insert_wins() {
        let mut cache = empty_cache();
        let pose = Pose::from_position([0.2, 0.1, 0.0]);
        assert!(cache.insert("arm", &pose, state(0.5)));
        assert!(!cache.insert("arm", &pose, state(0.9)));
        assert_eq!(cache.lookup("arm", &pose), Some(&state(0.5)));
    }

    #[test]
    fn max_entries_respected() {
        let mut opts = options();
        opts.max_entries = Some(2);
        let mut cache = SeedCache::new(opts, &Tolerances::default()).unwrap();
        assert!(cache.insert("arm", &Pose::from_position([0.0; 3]), state(0.0)));
        assert!(cache.insert("arm", &Pose::from_position([0.1, 0.0, 0.0]), state(0.1)));
        assert!(cache.is_full());
        assert!(!cache.insert("arm", &Pose::from_position([0.2, 0.0, 0.0]), state(0.2)));
        assert_eq!(cache.len(), 2);
    }

    // -- Generation --

    #[test]
    fn generate_keeps_only_successes() {
        let solver = SphereSolver::arm(0.25);
        let cache = SeedCache::generate(
            &solver,
            "arm",
            Duration::from_millis(10),
            options(),
            &Tolerances::default(),
        )
        .unwrap();
        // Lattice nodes within 0.25 of the origin: (0,0) (1,0) (2,0) (0,1) (1,1) (2,1) (0,2) (1,2).
        assert_eq!(cache.len(), 8);
        let pose = Pose::from_position([0.1, 0.2, 0.0]);
        assert_eq!(
            cache.lookup("arm", &pose).unwrap().positions,
            SphereSolver::state_for(&pose).positions
        );
        assert!(cache.lookup("arm", &Pose::from_position([0.4, 0.4, 0.0])).is_none());
    }

    #[test]
    fn generate_fails_without_successes() {
        let result = SeedCache::generate(
            &TimeoutSolver,
            "arm",
            Duration::from_millis(1),
            options(),
            &Tolerances::default(),
        );
        assert!(matches!(result, Err(CacheError::GenerationFailed(_))));
    }

    #[test]
    fn generate_rejects_bad_options() {
        let mut opts = options();
        opts.resolution = -1.0;
        let result = SeedCache::generate(
            &SphereSolver::arm(1.0),
            "arm",
            Duration::from_millis(1),
            opts,
            &Tolerances::default(),
        );
        assert!(matches!(result, Err(CacheError::GenerationFailed(_))));
    }

    // -- Persistence --

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.reach-cache.json");
        let mut cache = empty_cache();
        cache.insert("arm", &Pose::from_position([0.1, 0.1, 0.0]), state(0.25));
        cache.insert("leg", &Pose::from_position([0.3, 0.0, 0.0]), state(-0.5));
        cache.save(&path).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("arm.reach-cache.json")]);

        let loaded = SeedCache::load(&path, &Tolerances::default()).unwrap();
        assert_eq!(loaded, cache);
    }

    #[test]
    fn failed_save_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        let mut cache = empty_cache();
        cache.insert("arm", &Pose::from_position([0.1, 0.1, 0.0]), state(0.25));

        assert!(matches!(cache.save(&target), Err(CacheError::Io { .. })));
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("occupied")]);
        assert!(matches!(
            cache.save(dir.path().join("missing").join("cache.json")),
            Err(CacheError::Io { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            SeedCache::load("/nonexistent/cache.json", &Tolerances::default()),
            Err(CacheError::Io { .. })
        ));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let body = serde_json::json!({
            "version": 99,
            "options": options(),
            "entries": [],
        });
        fs::write(&path, body.to_string()).unwrap();
        assert!(matches!(
            SeedCache::load(&path, &Tolerances::default()),
            Err(CacheError::Incompatible(_))
        ));
    }

    #[test]
    fn load_rejects_entries_off_the_lattice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let joint_state = state(0.1);
        let bad_entries = [
            serde_json::json!({"group": "arm", "cell": [1, 1, 0], "bucket": 3, "joint_state": joint_state}),
            serde_json::json!({"group": "arm", "cell": [5, 0, 0], "bucket": 0, "joint_state": joint_state}),
            serde_json::json!({"group": "arm", "cell": [0, -1, 0], "bucket": 0, "joint_state": joint_state}),
            serde_json::json!({"group": "arm", "cell": [0, 0, 1], "bucket": 0, "joint_state": joint_state}),
        ];
        for entry in bad_entries {
            let body = serde_json::json!({
                "version": CACHE_VERSION,
                "options": options(),
                "entries": [entry],
            });
            fs::write(&path, body.to_string()).unwrap();
            assert!(
                matches!(
                    SeedCache::load(&path, &Tolerances::default()),
                    Err(CacheError::Incompatible(_))
                ),
                "accepted {entry}"
            );
        }

        let good = serde_json::json!({
            "version": CACHE_VERSION,
            "options": options(),
            "entries": [{"group": "arm", "cell": [4, 4, 0], "bucket": 0, "joint_state": joint_state}],
        });
        fs::write(&path, good.to_string()).unwrap();
        let loaded = SeedCache::load(&path, &Tolerances::default()).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn new_rejects_oversized_lattice() {
        let fine = CacheOptions::new(Bounds::new([0.0; 3], [1.0; 3]), 1e-7);
        assert!(matches!(
            SeedCache::new(fine, &Tolerances::default()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_compatible_checks_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = empty_cache();
        cache.insert("arm", &Pose::from_position([0.1, 0.1, 0.0]), state(0.25));
        cache.save(&path).unwrap();

        let tol = Tolerances::default();
        assert!(SeedCache::load_compatible(&path, &options(), &tol).is_ok());
        let mut other = options();
        other.resolution = 0.05;
        assert!(matches!(
            SeedCache::load_compatible(&path, &other, &tol),
            Err(CacheError::Incompatible(_))
        ));
    }

    #[test]
    fn load_garbage_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SeedCache::load(&path, &Tolerances::default()),
            Err(CacheError::Json(_))
        ));
    }
}
