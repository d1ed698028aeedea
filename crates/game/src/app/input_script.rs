use std::fs;
use std::path::Path;

use serde::Deserialize;
use tile_engine::{InputEvents, KEYBOARD_DEVICE};

pub(crate) type ScriptResult<T> = Result<T, String>;

const DEFAULT_FRAME_MS: u64 = 16;

/// Scripted keyboard input for headless runs: each step holds a set of
/// keys for a number of frames. Frames past the end have no input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct InputScript {
    #[serde(default = "default_frame_ms")]
    pub(crate) frame_ms: u64,
    #[serde(default)]
    pub(crate) steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptStep {
    pub(crate) frames: u32,
    #[serde(default)]
    pub(crate) keyboard: Vec<String>,
}

fn default_frame_ms() -> u64 {
    DEFAULT_FRAME_MS
}

impl InputScript {
    pub(crate) fn load(path: &Path) -> ScriptResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|error| format!("read input script '{}': {error}", path.display()))?;
        Self::parse(&raw)
    }

    pub(crate) fn parse(raw: &str) -> ScriptResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        match serde_path_to_error::deserialize::<_, InputScript>(&mut deserializer) {
            Ok(script) => Ok(script),
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    Err(format!("parse input script: {source}"))
                } else {
                    Err(format!("parse input script at {path}: {source}"))
                }
            }
        }
    }

    pub(crate) fn total_frames(&self) -> u64 {
        self.steps.iter().map(|step| u64::from(step.frames)).sum()
    }

    pub(crate) fn events_for_frame(&self, frame: u64) -> InputEvents {
        let mut events = InputEvents::new();
        let mut start = 0u64;
        for step in &self.steps {
            let end = start + u64::from(step.frames);
            if frame < end {
                if !step.keyboard.is_empty() {
                    events.insert(KEYBOARD_DEVICE.to_string(), step.keyboard.clone());
                }
                break;
            }
            start = end;
        }
        events
    }
}
