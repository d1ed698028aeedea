use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;

pub use app::{
    bound_num, collision_slide, point_in_rect, raycast, rect_intersects, AttributeValue,
    Attributes, Camera, Command, ControlMode, Controller, Direction, DrawCommand, EdgePolicy,
    Entity, EntityId, EntityRegistry, FrameClock, FrameClockConfig, InputEvents, RayHit,
    RecordingRenderer, Rect, Renderer, Scene, SceneConfig, SceneError, Segment, SpatialHash,
    StepPlan, Tile, TileKind, TileMap, TilemapError, Vec2, WallEdge, KEYBOARD_DEVICE, PLAYER_ID,
    PLAYER_PRESET,
};
pub use content::{
    compile_entity_defs, DefsCompileError, DefsErrorCode, EntityDef, LevelData, LevelLoadError,
    LevelPack, PresetRecord, SourceLocation,
};

pub const ROOT_ENV_VAR: &str = "TILESCENE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub levels_dir: PathBuf,
    pub defs_dir: PathBuf,
    pub scripts_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets = root.join("assets");
        Self {
            levels_dir: assets.join("levels"),
            defs_dir: assets.join("defs"),
            scripts_dir: assets.join("scripts"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "TILESCENE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/tilescene\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    Ok(AppPaths::from_root(resolve_root()?))
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => root_from_env(Path::new(&value)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_root_upwards(exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn root_from_env(value: &Path) -> Result<PathBuf, StartupError> {
    let root = normalize_path(value);
    if is_repo_marker(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidEnvRoot { path: root })
    }
}

/// Nearest directory at or above `start` that looks like the project root.
fn find_root_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
