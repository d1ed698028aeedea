use std::env;

use tile_engine::{FrameClockConfig, SceneConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const LEVEL_ENV_VAR: &str = "TILESCENE_LEVEL";
pub(crate) const FRAMES_ENV_VAR: &str = "TILESCENE_FRAMES";
pub(crate) const SCRIPT_ENV_VAR: &str = "TILESCENE_SCRIPT";

const DEFAULT_FRAMES: u32 = 240;
const DEFAULT_SCRIPT: &str = "demo_input.json";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GameConfig {
    /// Level to load; `None` picks the first level in the pack.
    pub(crate) level: Option<String>,
    pub(crate) frames: u32,
    pub(crate) script: String,
    pub(crate) scene: SceneConfig,
    pub(crate) clock: FrameClockConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            level: None,
            frames: DEFAULT_FRAMES,
            script: DEFAULT_SCRIPT.to_string(),
            scene: SceneConfig::default(),
            clock: FrameClockConfig::default(),
        }
    }
}

impl GameConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from a variable lookup. Unusable values fall back
    /// to the defaults with a warning.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = non_empty(lookup(LEVEL_ENV_VAR)) {
            config.level = Some(level);
        }
        if let Some(raw) = non_empty(lookup(FRAMES_ENV_VAR)) {
            match raw.parse::<u32>() {
                Ok(frames) if frames > 0 => config.frames = frames,
                _ => warn!(
                    var = FRAMES_ENV_VAR,
                    value = %raw,
                    fallback = DEFAULT_FRAMES,
                    "env_value_invalid"
                ),
            }
        }
        if let Some(script) = non_empty(lookup(SCRIPT_ENV_VAR)) {
            config.script = script;
        }
        config
    }
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    info!("=== Tile Scene Startup ===");
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
