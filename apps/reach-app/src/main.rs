//! Reachability analysis CLI.
//!
//! Subcommands:
//! - `compute`: evaluate the configured pose grid and write the results
//! - `generate-cache`: build and persist a seed cache for the group
//! - `redundant`: list distinct joint solutions reaching one pose
//! - `trajectory`: turn a saved workspace into a joint-space playback
//! - `info`: print crate versions

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use reach_core::config::{CacheOptions, ReachConfig};
use reach_core::error::{CacheError, ConfigError, ExportError, ReachError};
use reach_core::types::{IDENTITY_ORIENTATION, Pose, Workspace, validate_orientations};
use reach_ik::{KinematicsSolver, TargetMode};
use reach_urdf::UrdfError;
use reach_workspace::{
    EngineConfig, EvaluationSummary, ReachabilityEngine, display_trajectory, markers,
    remove_unreachable,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Workspace reachability analysis for URDF arms.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Robot and query inputs shared by the solving subcommands.
#[derive(Args, Debug, Clone)]
struct RobotArgs {
    /// Reachability configuration (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Robot description (URDF).
    #[arg(short, long)]
    urdf: PathBuf,

    /// Link whose pose the query targets.
    #[arg(short, long)]
    tip: String,

    /// Match tip positions only, ignoring orientation.
    #[arg(long)]
    position_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the configured pose grid.
    Compute {
        #[command(flatten)]
        robot: RobotArgs,

        /// Write the evaluated workspace as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write sphere markers for every point as JSON.
        #[arg(short, long)]
        markers: Option<PathBuf>,

        /// Drop unreachable points from the written workspace.
        #[arg(long)]
        only_reachable: bool,

        /// Solve points across all cores.
        #[arg(long)]
        parallel: bool,
    },

    /// Build a seed cache and write it to disk.
    GenerateCache {
        #[command(flatten)]
        robot: RobotArgs,

        /// Cache file; defaults to `cache.filename` from the config.
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// Search for distinct joint solutions at a single pose.
    Redundant {
        #[command(flatten)]
        robot: RobotArgs,

        /// Target position.
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        position: Vec<f64>,

        /// Target orientation quaternion; identity when omitted.
        #[arg(long, num_args = 4, value_names = ["X", "Y", "Z", "W"], allow_negative_numbers = true)]
        orientation: Option<Vec<f64>>,

        /// Search budget in seconds.
        #[arg(long, default_value_t = 1.0)]
        timeout: f64,

        /// Write the solutions as a workspace JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a saved workspace into a display trajectory.
    Trajectory {
        /// Workspace JSON written by `compute`.
        #[arg(short, long)]
        workspace: PathBuf,

        /// Seconds between consecutive trajectory points.
        #[arg(long)]
        dt: f64,

        /// Write the trajectory as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Reach(#[from] ReachError),

    #[error("URDF error: {0}")]
    Urdf(#[from] UrdfError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::Reach(e.into())
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        Self::Reach(e.into())
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        Self::Reach(e.into())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_engine(
    robot: &RobotArgs,
) -> Result<(ReachConfig, ReachabilityEngine<KinematicsSolver>), AppError> {
    let config = ReachConfig::from_file(&robot.config)?;
    let model = reach_urdf::parse_file(&robot.urdf)?;
    let mode = if robot.position_only {
        TargetMode::Position
    } else {
        TargetMode::Pose
    };
    let mut solver = KinematicsSolver::with_defaults();
    solver.add_group_with_mode(config.query.group_name.clone(), &model, &robot.tip, mode)?;

    let mut engine = ReachabilityEngine::new(solver, EngineConfig::from_reach_config(&config)?);
    engine.initialize();
    Ok((config, engine))
}

fn array<const N: usize>(field: &str, values: &[f64]) -> Result<[f64; N], ConfigError> {
    values
        .try_into()
        .map_err(|_| ConfigError::InvalidValue {
            field: field.into(),
            message: format!("expected {N} values, got {}", values.len()),
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "wrote output");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn print_summary(summary: &EvaluationSummary) {
    println!(
        "points={} reachable={} unreachable={} elapsed={:.3}s",
        summary.points,
        summary.reachable,
        summary.unreachable(),
        summary.elapsed.as_secs_f64()
    );
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_compute(
    robot: &RobotArgs,
    output: Option<&Path>,
    markers_path: Option<&Path>,
    only_reachable: bool,
    parallel: bool,
) -> Result<Workspace, AppError> {
    let (config, engine) = build_engine(robot)?;
    let mut workspace = config.query.to_workspace();
    let summary = if parallel {
        engine.compute_workspace_parallel(&mut workspace)?
    } else {
        engine.compute_workspace(&mut workspace)?
    };
    print_summary(&summary);

    if let Some(path) = markers_path {
        write_json(path, &markers(&workspace, &workspace.group_name)?)?;
    }
    if only_reachable {
        remove_unreachable(&mut workspace);
    }
    if let Some(path) = output {
        write_json(path, &workspace)?;
    }
    Ok(workspace)
}

fn run_generate_cache(robot: &RobotArgs, destination: Option<PathBuf>) -> Result<usize, AppError> {
    let (config, mut engine) = build_engine(robot)?;
    let destination = destination
        .or_else(|| config.cache.filename.clone())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "cache.filename".into(),
            message: "no destination given and none configured".into(),
        })?;
    // Without explicit options the cache covers the query grid.
    let options = config.cache.options.clone().unwrap_or_else(|| CacheOptions {
        origin: config.query.origin,
        orientations: config.query.orientations.clone(),
        ..CacheOptions::new(config.query.bounds, config.query.position_resolution)
    });
    let timeout = options.solver_timeout()?;

    let entries = engine.generate_cache(&config.query.group_name, timeout, options, &destination)?;
    println!("entries={entries} path={}", destination.display());
    Ok(entries)
}

fn run_redundant(
    robot: &RobotArgs,
    position: &[f64],
    orientation: Option<&[f64]>,
    timeout: f64,
    output: Option<&Path>,
) -> Result<Workspace, AppError> {
    let timeout = Duration::try_from_secs_f64(timeout)
        .ok()
        .filter(|t| !t.is_zero())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "timeout".into(),
            message: format!("{timeout} must be a positive number of seconds"),
        })?;
    let (config, engine) = build_engine(robot)?;
    let orientation = match orientation {
        Some(values) => array("orientation", values)?,
        None => IDENTITY_ORIENTATION,
    };
    validate_orientations(&[orientation], config.tolerances.quaternion)?;
    let pose = Pose::new(array("position", position)?, orientation);

    let workspace = engine.compute_redundant_solutions(
        &config.query.group_name,
        &pose,
        timeout,
        &config.query.tool_frame_offset,
    )?;
    for (i, state) in workspace.points.iter().filter_map(|p| p.joint_state()).enumerate() {
        let joints: Vec<String> = state.iter().map(|(n, v)| format!("{n}={v:.4}")).collect();
        println!("{i}: {}", joints.join(" "));
    }
    println!("solutions={}", workspace.len());

    if let Some(path) = output {
        write_json(path, &workspace)?;
    }
    Ok(workspace)
}

fn run_trajectory(workspace: &Path, dt: f64, output: Option<&Path>) -> Result<usize, AppError> {
    let workspace: Workspace = read_json(workspace)?;
    let trajectory = display_trajectory(&workspace, dt)?;
    println!(
        "group={} points={} duration={:.3}s",
        trajectory.group_name,
        trajectory.points.len(),
        trajectory.duration()
    );
    if let Some(path) = output {
        write_json(path, &trajectory)?;
    }
    Ok(trajectory.points.len())
}

fn run_info() {
    println!("reach v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  reach-core      {}", env!("CARGO_PKG_VERSION"));
    println!("  reach-urdf      {}", env!("CARGO_PKG_VERSION"));
    println!("  reach-ik        {}", env!("CARGO_PKG_VERSION"));
    println!("  reach-workspace {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("cache format: v{}", reach_workspace::CACHE_VERSION);
    println!("edition: 2024");
}

fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Compute {
            robot,
            output,
            markers,
            only_reachable,
            parallel,
        } => run_compute(
            &robot,
            output.as_deref(),
            markers.as_deref(),
            only_reachable,
            parallel,
        )
        .map(drop),
        Commands::GenerateCache { robot, destination } => {
            run_generate_cache(&robot, destination).map(drop)
        }
        Commands::Redundant {
            robot,
            position,
            orientation,
            timeout,
            output,
        } => run_redundant(
            &robot,
            &position,
            orientation.as_deref(),
            timeout,
            output.as_deref(),
        )
        .map(drop),
        Commands::Trajectory {
            workspace,
            dt,
            output,
        } => run_trajectory(&workspace, dt, output.as_deref()).map(drop),
        Commands::Info => {
            run_info();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use reach_test_utils::PLANAR_ARM_URDF;
    use reach_workspace::SeedCache;

    const CONFIG: &str = r#"
        [query]
        group_name = "arm"
        position_resolution = 0.1
        bounds = { min = [0.2, 0.0, 0.0], max = [0.4, 0.2, 0.0] }
    "#;

    struct Fixture {
        dir: tempfile::TempDir,
        robot: RobotArgs,
    }

    fn fixture(config: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let urdf = dir.path().join("planar.urdf");
        let config_path = dir.path().join("reach.toml");
        std::fs::write(&urdf, PLANAR_ARM_URDF).unwrap();
        std::fs::write(&config_path, config).unwrap();
        let robot = RobotArgs {
            config: config_path,
            urdf,
            tip: "tool".into(),
            position_only: true,
        };
        Fixture { dir, robot }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_redundant_with_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "reach", "redundant", "-c", "r.toml", "-u", "a.urdf", "-t", "tool", "--position",
            "0.3", "-0.2", "0.0",
        ])
        .unwrap();
        match cli.command {
            Commands::Redundant {
                position,
                orientation,
                timeout,
                ..
            } => {
                assert_eq!(position, vec![0.3, -0.2, 0.0]);
                assert!(orientation.is_none());
                assert!((timeout - 1.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected redundant"),
        }
    }

    #[test]
    fn rejects_short_position() {
        let parsed = Cli::try_parse_from([
            "reach", "redundant", "-c", "r.toml", "-u", "a.urdf", "-t", "tool", "--position",
            "0.3",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn compute_writes_workspace_and_markers() {
        let f = fixture(CONFIG);
        let output = f.dir.path().join("ws.json");
        let marker_path = f.dir.path().join("markers.json");

        let ws = run_compute(&f.robot, Some(&output), Some(&marker_path), false, false).unwrap();
        assert_eq!(ws.len(), 9);
        assert_eq!(ws.reachable_count(), 9);

        let saved: Workspace = read_json(&output).unwrap();
        assert_eq!(saved.len(), ws.len());
        assert_eq!(saved.reachable_count(), ws.reachable_count());
        assert_eq!(saved.group_name, "arm");
        let text = std::fs::read_to_string(&marker_path).unwrap();
        assert!(text.contains("\"sphere\""));
    }

    #[test]
    fn compute_then_trajectory() {
        let f = fixture(CONFIG);
        let output = f.dir.path().join("ws.json");
        run_compute(&f.robot, Some(&output), None, true, true).unwrap();

        let traj_path = f.dir.path().join("traj.json");
        let n = run_trajectory(&output, 0.5, Some(&traj_path)).unwrap();
        assert_eq!(n, 9);
        assert!(traj_path.exists());
    }

    #[test]
    fn trajectory_rejects_bad_step() {
        let f = fixture(CONFIG);
        let output = f.dir.path().join("ws.json");
        run_compute(&f.robot, Some(&output), None, false, false).unwrap();
        assert!(matches!(
            run_trajectory(&output, 0.0, None),
            Err(AppError::Reach(ReachError::Export(ExportError::InvalidTimeStep(_))))
        ));
    }

    #[test]
    fn generate_cache_defaults_to_query_grid() {
        let f = fixture(CONFIG);
        let destination = f.dir.path().join("arm.cache.json");
        let entries = run_generate_cache(&f.robot, Some(destination.clone())).unwrap();
        assert_eq!(entries, 9);

        let cache =
            SeedCache::load(&destination, &reach_core::config::Tolerances::default()).unwrap();
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn generate_cache_needs_a_destination() {
        let f = fixture(CONFIG);
        assert!(matches!(
            run_generate_cache(&f.robot, None),
            Err(AppError::Reach(ReachError::Config(ConfigError::InvalidValue { .. })))
        ));
    }

    #[test]
    fn redundant_finds_solutions() {
        let f = fixture(CONFIG);
        let ws = run_redundant(&f.robot, &[0.35, 0.2, 0.0], None, 1.0, None).unwrap();
        assert!(!ws.is_empty());
        assert!(ws.points.iter().all(|p| p.is_reachable()));
    }

    #[test]
    fn redundant_rejects_bad_inputs() {
        let f = fixture(CONFIG);
        assert!(run_redundant(&f.robot, &[0.3, 0.0, 0.0], None, 0.0, None).is_err());
        assert!(
            run_redundant(&f.robot, &[0.3, 0.0, 0.0], Some(&[0.0, 0.0, 0.0, 2.0]), 1.0, None)
                .is_err()
        );
    }

    #[test]
    fn missing_files_surface_as_errors() {
        let f = fixture(CONFIG);
        let robot = RobotArgs {
            urdf: f.dir.path().join("missing.urdf"),
            ..f.robot.clone()
        };
        assert!(matches!(
            run_compute(&robot, None, None, false, false),
            Err(AppError::Urdf(UrdfError::Io { .. }))
        ));
        assert!(matches!(
            run_trajectory(&f.dir.path().join("missing.json"), 0.1, None),
            Err(AppError::Io { .. })
        ));
    }
}
