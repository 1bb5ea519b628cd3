//! The reachability engine: owns the solver handle and the seed cache, and
//! runs queries over workspaces.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reach_core::config::{CacheOptions, ReachConfig, RedundantConfig, Tolerances};
use reach_core::error::{CacheError, ConfigError};
use reach_core::traits::IkSolver;
use reach_core::types::{Bounds, JointState, Pose, SolveResult, Workspace, WorkspacePoint};
use tracing::{debug, info, warn};

use crate::cache::SeedCache;
use crate::classify::remove_unreachable;
use crate::driver::{Evaluation, IkDriver};
use crate::grid;

/// Where the engine stands with respect to its seed cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// `initialize` has not run yet.
    Uninitialized,
    /// A cache is held and, if `use_cache` is set, seeds queries.
    CacheLoaded,
    /// No usable cache; queries solve unseeded.
    CacheAbsent,
}

/// Runtime settings, usually derived from a [`ReachConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub tolerances: Tolerances,
    pub use_cache: bool,
    pub cache_filename: Option<PathBuf>,
    /// Options a loaded cache must match. `None` accepts any file.
    pub cache_options: Option<CacheOptions>,
    pub solver_timeout: Duration,
    pub attempts: u32,
    pub redundant: RedundantConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            use_cache: false,
            cache_filename: None,
            cache_options: None,
            solver_timeout: Duration::from_millis(50),
            attempts: 1,
            redundant: RedundantConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_reach_config(config: &ReachConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tolerances: config.tolerances,
            use_cache: config.cache.use_cache,
            cache_filename: config.cache.filename.clone(),
            cache_options: config.cache.options.clone(),
            solver_timeout: config.query.solver_timeout()?,
            attempts: config.query.attempts,
            redundant: config.redundant,
        })
    }
}

/// Counts from one batch evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub points: usize,
    pub reachable: usize,
    pub elapsed: Duration,
}

impl EvaluationSummary {
    pub const fn unreachable(&self) -> usize {
        self.points - self.reachable
    }

    fn of(workspace: &Workspace, start: Instant) -> Self {
        Self {
            points: workspace.len(),
            reachable: workspace.reachable_count(),
            elapsed: start.elapsed(),
        }
    }
}

/// Owns one solver handle and at most one seed cache.
///
/// Queries take `&self` and only read the cache; [`generate_cache`]
/// takes `&mut self`, so regeneration can never overlap a query.
///
/// [`generate_cache`]: Self::generate_cache
pub struct ReachabilityEngine<S> {
    solver: S,
    config: EngineConfig,
    state: CacheState,
    cache: Option<SeedCache>,
}

impl<S: IkSolver> ReachabilityEngine<S> {
    pub const fn new(solver: S, config: EngineConfig) -> Self {
        Self {
            solver,
            config,
            state: CacheState::Uninitialized,
            cache: None,
        }
    }

    /// Load the configured cache, once.
    ///
    /// A disabled, missing, unreadable or incompatible cache leaves the engine
    /// in [`CacheState::CacheAbsent`]; this never fails. Later calls return
    /// the state reached by the first one.
    pub fn initialize(&mut self) -> CacheState {
        if self.state != CacheState::Uninitialized {
            return self.state;
        }
        self.cache = self.load_cache();
        self.state = if self.cache.is_some() {
            CacheState::CacheLoaded
        } else {
            CacheState::CacheAbsent
        };
        info!(
            solver = self.solver.name(),
            state = ?self.state,
            entries = self.cache.as_ref().map_or(0, SeedCache::len),
            "reachability engine initialized"
        );
        self.state
    }

    fn load_cache(&self) -> Option<SeedCache> {
        if !self.config.use_cache {
            debug!("seed cache disabled");
            return None;
        }
        let Some(path) = &self.config.cache_filename else {
            warn!("use_cache is set but no cache filename is configured");
            return None;
        };
        let tolerances = &self.config.tolerances;
        let loaded = match &self.config.cache_options {
            Some(expected) => SeedCache::load_compatible(path, expected, tolerances),
            None => SeedCache::load(path, tolerances),
        };
        match loaded {
            Ok(cache) => Some(cache),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "seed cache unavailable, solving unseeded");
                None
            }
        }
    }

    pub const fn state(&self) -> CacheState {
        self.state
    }

    pub const fn cache(&self) -> Option<&SeedCache> {
        self.cache.as_ref()
    }

    pub const fn solver(&self) -> &S {
        &self.solver
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ensure_initialized(&self) -> Result<(), ConfigError> {
        if self.state == CacheState::Uninitialized {
            Err(ConfigError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn driver(&self) -> IkDriver<'_, S> {
        let seeding = if self.config.use_cache {
            self.cache.as_ref()
        } else {
            None
        };
        IkDriver::new(&self.solver)
            .with_cache(seeding)
            .with_attempts(self.config.attempts)
    }

    /// Generate the grid of an empty workspace, or validate a filled one.
    fn prepare(&self, workspace: &mut Workspace) -> Result<(), ConfigError> {
        self.ensure_initialized()?;
        if workspace.is_empty() {
            grid::generate(workspace, &self.config.tolerances)
        } else {
            workspace.validate(&self.config.tolerances)
        }
    }

    /// Seed the cache holds for `pose`, if any.
    pub fn lookup_seed(&self, group: &str, pose: &Pose) -> Option<&JointState> {
        self.cache.as_ref()?.lookup(group, pose)
    }

    /// Solve a single tool pose with the engine's timeout and attempts.
    pub fn solve(
        &self,
        group: &str,
        pose: &Pose,
        tool_offset: &Pose,
        seed: Option<&JointState>,
    ) -> Result<SolveResult, ConfigError> {
        self.ensure_initialized()?;
        Ok(self
            .driver()
            .solve(group, pose, tool_offset, self.config.solver_timeout, seed))
    }

    /// Evaluate every point of `workspace`, generating its grid first when it
    /// has no points. Uses the workspace's own tool offset.
    pub fn compute_workspace(
        &self,
        workspace: &mut Workspace,
    ) -> Result<EvaluationSummary, ConfigError> {
        self.prepare(workspace)?;
        let start = Instant::now();
        self.driver()
            .find_ik_solutions(workspace, self.config.solver_timeout);
        let summary = EvaluationSummary::of(workspace, start);
        log_summary(&workspace.group_name, &summary);
        Ok(summary)
    }

    /// [`compute_workspace`](Self::compute_workspace) with `tool_offset`
    /// replacing the workspace's offset.
    pub fn compute_workspace_with_offset(
        &self,
        workspace: &mut Workspace,
        tool_offset: &Pose,
    ) -> Result<EvaluationSummary, ConfigError> {
        workspace.tool_frame_offset = *tool_offset;
        self.compute_workspace(workspace)
    }

    /// [`compute_workspace`](Self::compute_workspace) across the rayon pool.
    pub fn compute_workspace_parallel(
        &self,
        workspace: &mut Workspace,
    ) -> Result<EvaluationSummary, ConfigError> {
        self.prepare(workspace)?;
        let start = Instant::now();
        self.driver()
            .find_ik_solutions_parallel(workspace, self.config.solver_timeout);
        let summary = EvaluationSummary::of(workspace, start);
        log_summary(&workspace.group_name, &summary);
        Ok(summary)
    }

    /// Point-by-point evaluation the caller can stop and resume.
    pub fn evaluate<'w>(
        &self,
        workspace: &'w mut Workspace,
    ) -> Result<Evaluation<'w, '_, S>, ConfigError> {
        self.prepare(workspace)?;
        Ok(self.driver().evaluate(workspace, self.config.solver_timeout))
    }

    /// Compute `workspace`, then drop every unreachable point from it.
    pub fn only_reachable_workspace(
        &self,
        workspace: &mut Workspace,
    ) -> Result<EvaluationSummary, ConfigError> {
        let summary = self.compute_workspace(workspace)?;
        remove_unreachable(workspace);
        Ok(summary)
    }

    /// Workspace of pairwise-distinct joint states that all reach `pose`.
    pub fn compute_redundant_solutions(
        &self,
        group: &str,
        pose: &Pose,
        timeout: Duration,
        tool_offset: &Pose,
    ) -> Result<Workspace, ConfigError> {
        self.ensure_initialized()?;
        let states = self.driver().redundant_solutions(
            group,
            pose,
            tool_offset,
            timeout,
            &self.config.redundant,
            self.config.tolerances.joint,
        );
        // Single position; the resolution only sizes exported markers.
        let mut workspace = Workspace::new(group, Bounds::new(pose.position, pose.position), 0.01)
            .with_orientations(vec![pose.orientation])
            .with_tool_frame_offset(*tool_offset);
        workspace.points = states
            .into_iter()
            .map(|state| WorkspacePoint::evaluated(*pose, SolveResult::success(state)))
            .collect();
        info!(group, solutions = workspace.len(), "redundant solutions computed");
        Ok(workspace)
    }

    /// Build a seed cache for `group`, write it to `destination` and make it
    /// the engine's cache. Returns the number of entries.
    ///
    /// On failure the previous cache, in memory and on disk, is untouched.
    pub fn generate_cache(
        &mut self,
        group: &str,
        timeout: Duration,
        options: CacheOptions,
        destination: impl AsRef<Path>,
    ) -> Result<usize, CacheError> {
        let destination = destination.as_ref();
        let cache =
            SeedCache::generate(&self.solver, group, timeout, options, &self.config.tolerances)?;
        cache.save(destination)?;
        let entries = cache.len();
        self.cache = Some(cache);
        self.state = CacheState::CacheLoaded;
        info!(group, entries, path = %destination.display(), "seed cache written");
        Ok(entries)
    }
}

fn log_summary(group: &str, summary: &EvaluationSummary) {
    info!(
        group,
        points = summary.points,
        reachable = summary.reachable,
        unreachable = summary.unreachable(),
        elapsed = ?summary.elapsed,
        "workspace evaluated"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
